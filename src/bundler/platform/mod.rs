//! Platform-specific bundling implementations.
//!
//! Every artifact kind is a stateless struct implementing [`PlatformBundler`].
//! The driver picks bundlers from [`registry()`], runs `validate`, then
//! `execute`, and cleans up afterwards.
//!
//! # Supported Package Types
//!
//! | Package type | Bundler | Platform | External tools |
//! |--------------|---------|----------|----------------|
//! | `app-image` | [`app_image::AppImageBundler`] | all | none |
//! | `pkg` | [`macos::MacPkgBundler`] | macOS | codesign, pkgbuild, productbuild |
//! | `mac-app-store` | [`macos::MacAppStoreBundler`] | macOS | codesign, productbuild |
//! | `exe` | [`windows::WinExeBundler`] | Windows | Inno Setup |
//! | `msi` | [`windows::WinMsiBundler`] | Windows | WiX |
//! | `deb` | [`linux::DebBundler`] | Linux | dpkg-deb |
//! | `rpm` | [`linux::RpmBundler`] | Linux | rpmbuild |
//!
//! Bundlers are compiled on every host so that their parameters and
//! validation can be exercised anywhere; [`PlatformBundler::supported`]
//! decides whether they may run.

pub mod app_image;
pub mod checks;
pub mod linux;
pub mod macos;
pub mod windows;

use crate::bundler::{
    error::{Error, Result},
    params::{ParamId, ParamStore},
    utils::process::{ProcessRunner, ToolCommand, ToolOutput, ToolRunner, check_exit},
};
use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

/// Supported package types for bundling.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_package::bundler::PackageType;
///
/// for pkg_type in PackageType::all_for_current_platform() {
///     println!("Creating {} package", pkg_type);
/// }
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum PackageType {
    /// Runnable application image directory.
    AppImage,
    /// macOS flat installer package (.pkg).
    MacPkg,
    /// macOS App Store submission package (.pkg).
    MacAppStore,
    /// Inno Setup installer (.exe).
    WinExe,
    /// Windows Installer package (.msi).
    WinMsi,
    /// Debian package (.deb).
    Deb,
    /// RPM package (.rpm).
    Rpm,
}

impl PackageType {
    /// Every package type, in build order.
    pub const ALL: &'static [PackageType] = &[
        PackageType::AppImage,
        PackageType::MacPkg,
        PackageType::MacAppStore,
        PackageType::WinExe,
        PackageType::WinMsi,
        PackageType::Deb,
        PackageType::Rpm,
    ];

    /// Returns the short name for this package type.
    ///
    /// This is the identifier accepted on the command line.
    pub fn short_name(&self) -> &'static str {
        match self {
            PackageType::AppImage => "app-image",
            PackageType::MacPkg => "pkg",
            PackageType::MacAppStore => "mac-app-store",
            PackageType::WinExe => "exe",
            PackageType::WinMsi => "msi",
            PackageType::Deb => "deb",
            PackageType::Rpm => "rpm",
        }
    }

    /// Returns the priority for bundling order. Lower numbers are bundled first.
    ///
    /// The image needs no external tools, so it goes first and surfaces
    /// assembly problems before any installer tool runs.
    pub fn priority(&self) -> u32 {
        match self {
            PackageType::AppImage => 0,
            PackageType::MacPkg
            | PackageType::WinExe
            | PackageType::WinMsi
            | PackageType::Deb
            | PackageType::Rpm => 1,
            PackageType::MacAppStore => 2,
        }
    }

    /// Platform whose native tools build this package type, if any.
    pub fn native_platform(&self) -> Option<Platform> {
        match self {
            PackageType::AppImage => None,
            PackageType::MacPkg | PackageType::MacAppStore => Some(Platform::MacOs),
            PackageType::WinExe | PackageType::WinMsi => Some(Platform::Windows),
            PackageType::Deb | PackageType::Rpm => Some(Platform::Linux),
        }
    }

    /// Returns all package types available on the current platform.
    ///
    /// - **Linux**: `[AppImage, Deb, Rpm]`
    /// - **macOS**: `[AppImage, MacPkg]`
    /// - **Windows**: `[AppImage, WinExe, WinMsi]`
    /// - **Other**: `[AppImage]`
    ///
    /// The App Store package is never built unless requested.
    pub fn all_for_current_platform() -> Vec<PackageType> {
        Self::all_for(Platform::current())
    }

    /// Default package types for `platform`.
    pub fn all_for(platform: Platform) -> Vec<PackageType> {
        match platform {
            Platform::Linux => vec![PackageType::AppImage, PackageType::Deb, PackageType::Rpm],
            Platform::MacOs => vec![PackageType::AppImage, PackageType::MacPkg],
            Platform::Windows => vec![PackageType::AppImage, PackageType::WinExe, PackageType::WinMsi],
            Platform::Unknown => vec![PackageType::AppImage],
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for PackageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let found = match lowered.as_str() {
            "image" | "app" => Some(PackageType::AppImage),
            other => PackageType::ALL
                .iter()
                .copied()
                .find(|t| t.short_name() == other),
        };
        found.ok_or_else(|| {
            Error::config(
                format!("unknown package type '{s}'"),
                format!(
                    "Use one of: {}",
                    PackageType::ALL
                        .iter()
                        .map(PackageType::short_name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
        })
    }
}

impl Serialize for PackageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.short_name())
    }
}

/// Host operating system family.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Platform {
    /// Linux distributions.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
    /// Anything else.
    Unknown,
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Unknown
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Unknown => "unknown",
        })
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "macos" | "mac" | "osx" | "darwin" => Ok(Platform::MacOs),
            "windows" | "win" => Ok(Platform::Windows),
            other => Err(Error::config(
                format!("unknown platform '{other}'"),
                "Use one of: linux, macos, windows",
            )),
        }
    }
}

/// Stage reached by one artifact build.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PipelineState {
    /// Nothing checked yet.
    Unvalidated,
    /// Preconditions hold.
    Validated,
    /// Application image exists on disk.
    ImageAssembled,
    /// Platform transforms (signing, templates) applied.
    Transformed,
    /// External tool produced the artifact.
    Packaged,
    /// Intermediates removed.
    CleanedUp,
    /// A stage failed.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineState::Unvalidated => "unvalidated",
            PipelineState::Validated => "validated",
            PipelineState::ImageAssembled => "image-assembled",
            PipelineState::Transformed => "transformed",
            PipelineState::Packaged => "packaged",
            PipelineState::CleanedUp => "cleaned-up",
            PipelineState::Failed => "failed",
        })
    }
}

/// Per-build environment handed to bundlers: the target platform, the tool
/// runner and the pipeline state recorder.
pub struct BuildContext {
    platform: Platform,
    runner: Arc<dyn ToolRunner>,
    state: Mutex<PipelineState>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("platform", &self.platform)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    /// Creates a context targeting `platform`.
    pub fn new(platform: Platform, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            platform,
            runner,
            state: Mutex::new(PipelineState::Unvalidated),
        }
    }

    /// Context for the current host with real child processes.
    pub fn host() -> Self {
        Self::new(Platform::current(), Arc::new(ProcessRunner))
    }

    /// Target platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Runs a tool and applies the exit code policy.
    pub async fn exec(&self, command: ToolCommand) -> Result<ToolOutput> {
        log::info!("Running {}", command);
        let output = self.runner.run(&command).await?;
        check_exit(&command, output)
    }

    /// Records that the build reached `state`.
    pub fn advance(&self, state: PipelineState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        log::debug!("Pipeline {} -> {}", *current, state);
        *current = state;
    }

    /// Stage reached so far.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One artifact kind.
///
/// `validate` performs cheap local checks and never creates files;
/// `execute` assembles, transforms and invokes the external tool, returning
/// the produced artifact.
#[async_trait]
pub trait PlatformBundler: Send + Sync {
    /// Stable identifier, equal to the package type's short name.
    fn id(&self) -> &'static str {
        self.package_type().short_name()
    }

    /// Human readable name.
    fn name(&self) -> &'static str;

    /// One-line description.
    fn description(&self) -> &'static str;

    /// Artifact kind produced.
    fn package_type(&self) -> PackageType;

    /// Whether this bundler can run on `platform`.
    fn supported(&self, platform: Platform) -> bool {
        self.package_type()
            .native_platform()
            .is_none_or(|native| native == platform)
    }

    /// Parameters recognized by this bundler.
    fn parameters(&self) -> &'static [ParamId];

    /// Checks preconditions.
    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()>;

    /// Produces the artifact in `output_dir` and returns its path.
    async fn execute(
        &self,
        ctx: &BuildContext,
        store: &mut ParamStore,
        output_dir: &Path,
    ) -> Result<PathBuf>;
}

static REGISTRY: &[&dyn PlatformBundler] = &[
    &app_image::AppImageBundler,
    &macos::MacPkgBundler,
    &macos::MacAppStoreBundler,
    &windows::WinExeBundler,
    &windows::WinMsiBundler,
    &linux::DebBundler,
    &linux::RpmBundler,
];

/// Every known bundler.
pub fn registry() -> &'static [&'static dyn PlatformBundler] {
    REGISTRY
}

/// Bundler producing `package_type`.
pub fn bundler_for(package_type: PackageType) -> Option<&'static dyn PlatformBundler> {
    REGISTRY
        .iter()
        .copied()
        .find(|b| b.package_type() == package_type)
}

/// Fails with an unsupported platform error unless `bundler` runs on the
/// context's platform.
pub fn ensure_supported(bundler: &dyn PlatformBundler, ctx: &BuildContext) -> Result<()> {
    if bundler.supported(ctx.platform()) {
        Ok(())
    } else {
        Err(Error::UnsupportedPlatform {
            package_type: bundler.package_type().to_string(),
            platform: ctx.platform().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_package_type() {
        for package_type in PackageType::ALL {
            let bundler = bundler_for(*package_type).unwrap();
            assert_eq!(bundler.id(), package_type.short_name());
        }
        assert_eq!(registry().len(), PackageType::ALL.len());
    }

    #[test]
    fn test_package_type_parsing() {
        assert_eq!("deb".parse::<PackageType>().unwrap(), PackageType::Deb);
        assert_eq!("APP-IMAGE".parse::<PackageType>().unwrap(), PackageType::AppImage);
        assert_eq!("image".parse::<PackageType>().unwrap(), PackageType::AppImage);
        assert!("dmg".parse::<PackageType>().is_err());
    }

    #[test]
    fn test_support_matrix() {
        let deb = bundler_for(PackageType::Deb).unwrap();
        assert!(deb.supported(Platform::Linux));
        assert!(!deb.supported(Platform::Windows));

        let image = bundler_for(PackageType::AppImage).unwrap();
        assert!(image.supported(Platform::Unknown));
    }

    #[test]
    fn test_context_records_state() {
        let ctx = BuildContext::host();
        assert_eq!(ctx.state(), PipelineState::Unvalidated);
        ctx.advance(PipelineState::Validated);
        assert_eq!(ctx.state(), PipelineState::Validated);
    }
}
