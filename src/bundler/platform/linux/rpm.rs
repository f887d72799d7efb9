//! RPM package (.rpm) bundler.
//!
//! The application image is staged as `rpm.image/opt/<pkg>` and handed to
//! `rpmbuild` as its `_sourcedir`; the generated spec copies it into the
//! build root.

use super::{
    PACKAGE_DEPS, PACKAGE_NAME, RPM_LICENSE_TYPE, desktop_integration, linux_preconditions,
    probe_tool,
};
use crate::bundler::{
    error::{Error, Result},
    image::{self, AppImage, ImageLayout},
    params::{ParamId, ParamStore, standard},
    platform::{BuildContext, PackageType, PipelineState, PlatformBundler, ensure_supported},
    resources::{self, ResourceRequest, Substitutions},
    utils::{fs, process::ToolCommand},
};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

const PACKAGE_NAME_PATTERN: &str = r"^[a-zA-Z0-9\._\+\-]+$";

const PARAMETERS: &[ParamId] = &[
    ParamId::AppName,
    ParamId::MainJar,
    ParamId::MainClass,
    ParamId::Classpath,
    ParamId::Version,
    ParamId::Vendor,
    ParamId::Title,
    ParamId::Description,
    ParamId::Copyright,
    ParamId::Category,
    ParamId::LicenseFile,
    ParamId::Icon,
    ParamId::PredefinedAppImage,
    ParamId::PredefinedRuntimeImage,
    ParamId::SecondaryLaunchers,
    ParamId::FileAssociations,
    ParamId::LinuxPackageName,
    ParamId::LinuxPackageDeps,
    ParamId::LinuxRpmLicenseType,
    ParamId::LinuxMenuGroup,
];

/// Builds an `.rpm` with `rpmbuild`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RpmBundler;

#[async_trait]
impl PlatformBundler for RpmBundler {
    fn name(&self) -> &'static str {
        "RPM Bundler"
    }

    fn description(&self) -> &'static str {
        "RPM package built with rpmbuild"
    }

    fn package_type(&self) -> PackageType {
        PackageType::Rpm
    }

    fn parameters(&self) -> &'static [ParamId] {
        PARAMETERS
    }

    async fn validate(&self, ctx: &BuildContext, store: &mut ParamStore) -> Result<()> {
        ensure_supported(self, ctx)?;
        linux_preconditions(store)?;
        validate_package_name(&store.require(&PACKAGE_NAME)?)?;
        validate_version(&store.require(&standard::VERSION)?)?;
        probe_tool(ctx, "rpmbuild", "rpm-build").await
    }

    async fn execute(
        &self,
        ctx: &BuildContext,
        store: &mut ParamStore,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        image::predefined_image(store)?;

        let package = store.require(&PACKAGE_NAME)?;
        let working = store
            .require(&standard::BUILD_ROOT)?
            .join("linux")
            .join("rpm.image");
        fs::create_dir_all(&working, true).await?;
        store.put(ParamId::WorkingImageDir, working.clone());

        let install_root = format!("/opt/{package}");
        let image =
            image::obtain_at(store, ImageLayout::Linux, &working.join("opt").join(&package)).await?;
        ctx.advance(PipelineState::ImageAssembled);

        let desktop = desktop_integration(store, &image, &package, &install_root).await?;
        let mut subs = spec_substitutions(store, &image, &package, &install_root)?;
        subs.insert("DESKTOP_COMMANDS_INSTALL", Some(desktop.install));
        subs.insert("DESKTOP_COMMANDS_UNINSTALL", Some(desktop.uninstall));

        let spec = working.join(format!("{package}.spec"));
        let request = ResourceRequest::for_store("RPM spec file", store)?
            .public_name(format!("{package}.spec"))
            .default_name("template.spec");
        resources::render_to(&request, &subs, &spec).await?;
        ctx.advance(PipelineState::Transformed);

        let topdir = working.join("rpmbuild");
        fs::create_dir_all(&topdir, false).await?;
        fs::create_dir_all(output_dir, false).await?;
        ctx.exec(
            ToolCommand::new("rpmbuild")
                .arg("-bb")
                .arg(&spec)
                .arg("--define")
                .arg(format!("%_sourcedir {}", working.display()))
                .arg("--define")
                .arg(format!("%_rpmdir {}", output_dir.display()))
                .arg("--define")
                .arg(format!("%_topdir {}", topdir.display())),
        )
        .await?;

        let rpm = fs::newest_file_with_extension(output_dir, "rpm")?.ok_or_else(|| {
            Error::packaging(
                format!("rpmbuild did not produce a package in {}", output_dir.display()),
                "Re-run with --verbose and inspect the generated .spec file",
            )
        })?;
        ctx.advance(PipelineState::Packaged);

        log::info!("✓ Created {}", rpm.display());
        Ok(rpm)
    }
}

fn validate_package_name(name: &str) -> Result<()> {
    let re = Regex::new(PACKAGE_NAME_PATTERN)?;
    if re.is_match(name) {
        return Ok(());
    }
    Err(Error::config(
        format!("invalid RPM package name '{name}'"),
        "Package names use letters, digits and . _ + -; pass --linux-package-name",
    ))
}

fn validate_version(version: &str) -> Result<()> {
    if !version.contains('-') {
        return Ok(());
    }
    Err(Error::config(
        format!("invalid RPM package version '{version}'"),
        "RPM versions cannot contain '-'",
    ))
}

fn spec_substitutions(
    store: &mut ParamStore,
    image: &AppImage,
    package: &str,
    install_root: &str,
) -> Result<Substitutions> {
    let description = store.require(&standard::DESCRIPTION)?;
    let summary = store
        .fetch(&standard::TITLE)?
        .unwrap_or_else(|| description.clone());
    let deps = store.fetch(&PACKAGE_DEPS)?.unwrap_or_default();

    let licenses = store.fetch(&standard::LICENSE_FILE)?.unwrap_or_default();
    let license_file = match licenses.first() {
        Some(license) => {
            let relative = image
                .app_dir()
                .join(license)
                .strip_prefix(&image.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(license));
            format!("%license {install_root}/{}", relative.display())
        }
        None => String::new(),
    };

    let mut subs = Substitutions::new();
    subs.insert("APPLICATION_PACKAGE", Some(package.to_string()));
    subs.insert("APPLICATION_VERSION", Some(store.require(&standard::VERSION)?));
    subs.insert("APPLICATION_VENDOR", Some(store.require(&standard::VENDOR)?));
    subs.insert(
        "APPLICATION_LICENSE_TYPE",
        Some(store.require(&RPM_LICENSE_TYPE)?),
    );
    subs.insert("APPLICATION_LICENSE_FILE", Some(license_file));
    subs.insert("APPLICATION_SUMMARY", Some(summary));
    subs.insert("APPLICATION_DESCRIPTION", Some(description));
    subs.insert("PACKAGE_DEPENDENCIES", Some(requires_line(&deps)));
    Ok(subs)
}

/// `Requires:` line for the spec file, empty without dependencies.
fn requires_line(deps: &str) -> String {
    let deps = deps.trim();
    if deps.is_empty() {
        String::new()
    } else {
        format!("Requires: {deps}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_names() {
        assert!(validate_package_name("Hello_World-2.0").is_ok());
        assert!(validate_package_name("hello world").is_err());
        assert!(validate_package_name("").is_err());
    }

    #[test]
    fn test_versions() {
        assert!(validate_version("1.0.3").is_ok());
        assert!(validate_version("1.0-beta").is_err());
    }

    #[test]
    fn test_requires_line() {
        assert_eq!(requires_line("  "), "");
        assert_eq!(requires_line("glibc, libX11"), "Requires: glibc, libX11");
    }
}
