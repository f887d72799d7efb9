//! Pipeline driver.
//!
//! [`Bundler`] runs one artifact build per requested [`PackageType`]:
//!
//! 1. clone the seed parameter store, so builds never observe each other
//! 2. `validate`, with internal faults reported as configuration errors
//! 3. `execute`, with internal faults reported as packaging errors
//! 4. cleanup: the working image is deleted unless the run is verbose, and a
//!    build root created by the run is removed with it. A predefined image is
//!    only ever copied, so its source directory is never touched.
//!
//! A failing build does not stop the batch; every requested kind gets a
//! [`BuildReport`].
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_package::bundler::{Bundler, PackageType, params::{ParamId, ParamStore}};
//!
//! # async fn example() {
//! let mut store = ParamStore::new();
//! store.put_raw(ParamId::Input, "build/libs");
//! store.put_raw(ParamId::MainJar, "hello.jar");
//!
//! let bundler = Bundler::new("dist");
//! for report in bundler.build_all(&[PackageType::AppImage, PackageType::Deb], &store).await {
//!     match &report.result {
//!         Ok(artifact) => println!("{}: {}", report.package_type, artifact.checksum),
//!         Err(e) => eprintln!("{}: {}", report.package_type, e),
//!     }
//! }
//! # }
//! ```

use crate::bail;
use crate::bundler::{
    BundledArtifact,
    error::{Error, ErrorExt, Result},
    params::{ParamId, ParamStore, standard},
    platform::{self, BuildContext, PackageType, Platform, PipelineState, PlatformBundler},
    utils::{
        fs,
        process::{ProcessRunner, ToolRunner},
    },
};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Outcome of one artifact build.
#[derive(Debug)]
pub struct BuildReport {
    /// Requested kind.
    pub package_type: PackageType,
    /// Name of the bundler that ran, if one was found.
    pub bundler: Option<&'static str>,
    /// Last stage reached; [`PipelineState::Failed`] when the build failed.
    pub state: PipelineState,
    /// The artifact, or why there is none.
    pub result: Result<BundledArtifact>,
    /// Working image kept for inspection.
    pub retained_image: Option<PathBuf>,
    /// Parameter store as the build left it.
    pub params: ParamStore,
}

impl BuildReport {
    /// Whether the build produced an artifact.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs artifact builds against a seed parameter store.
pub struct Bundler {
    output_dir: PathBuf,
    platform: Platform,
    runner: Arc<dyn ToolRunner>,
}

impl fmt::Debug for Bundler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundler")
            .field("output_dir", &self.output_dir)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl Bundler {
    /// Bundler for the current host writing artifacts to `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            platform: Platform::current(),
            runner: Arc::new(ProcessRunner),
        }
    }

    /// Replaces the tool runner.
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Targets `platform` instead of the host.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Artifact directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Target platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Kinds built when none are requested.
    pub fn default_types(&self) -> Vec<PackageType> {
        PackageType::all_for(self.platform)
    }

    /// Builds every kind in `types`, each from its own copy of `seed`, in
    /// [`PackageType::priority`] order.
    pub async fn build_all(&self, types: &[PackageType], seed: &ParamStore) -> Vec<BuildReport> {
        let mut ordered = types.to_vec();
        ordered.sort_by_key(PackageType::priority);

        let mut reports = Vec::with_capacity(ordered.len());
        for package_type in ordered {
            let report = self.build(package_type, seed).await;
            if let Err(e) = &report.result {
                log::warn!("{} build failed, continuing with the remaining kinds: {}", package_type, e);
            }
            reports.push(report);
        }
        reports
    }

    /// Builds one artifact kind.
    pub async fn build(&self, package_type: PackageType, seed: &ParamStore) -> BuildReport {
        let mut store = seed.clone();

        let Some(bundler) = platform::bundler_for(package_type) else {
            return BuildReport {
                package_type,
                bundler: None,
                state: PipelineState::Failed,
                result: Err(Error::config(
                    format!("no bundler is registered for {package_type}"),
                    "Choose another package type",
                )),
                retained_image: None,
                params: store,
            };
        };

        log::info!("Building {} with {}", package_type, bundler.name());
        let ctx = BuildContext::new(self.platform, Arc::clone(&self.runner));
        let outcome = self.run(bundler, &ctx, &mut store).await;
        let retained_image = cleanup(seed, &mut store).await;
        let result = match outcome {
            Ok(path) => artifact(package_type, path).await,
            Err(e) => Err(e),
        };

        let state = match &result {
            Ok(_) => {
                ctx.advance(PipelineState::CleanedUp);
                PipelineState::CleanedUp
            }
            Err(e) => {
                log::error!("{} failed after stage {}: {}", package_type, ctx.state(), e);
                ctx.advance(PipelineState::Failed);
                PipelineState::Failed
            }
        };

        BuildReport {
            package_type,
            bundler: Some(bundler.name()),
            state,
            result,
            retained_image,
            params: store,
        }
    }

    async fn run(
        &self,
        bundler: &dyn PlatformBundler,
        ctx: &BuildContext,
        store: &mut ParamStore,
    ) -> Result<PathBuf> {
        bundler
            .validate(ctx, store)
            .await
            .map_err(Error::into_configuration)?;
        ctx.advance(PipelineState::Validated);
        log::info!("✓ {} preconditions hold", bundler.id());

        bundler
            .execute(ctx, store, &self.output_dir)
            .await
            .map_err(Error::into_packaging)
    }
}

/// Deletes intermediates and returns the working image when it is kept.
///
/// Deletion failures are logged and never fail the build.
async fn cleanup(seed: &ParamStore, store: &mut ParamStore) -> Option<PathBuf> {
    let working = store.peek(&standard::WORKING_IMAGE_DIR);
    let verbose = store.fetch(&standard::VERBOSE).ok().flatten().unwrap_or(false);

    if verbose {
        if let Some(dir) = &working {
            log::info!("Keeping working image {}", dir.display());
        }
        return working;
    }

    if let Some(dir) = &working
        && let Err(e) = fs::remove_dir_all(dir).await
    {
        log::warn!("Could not delete working image {}: {}", dir.display(), e);
    }

    if !seed.contains(ParamId::BuildRoot)
        && let Some(root) = store.peek(&standard::BUILD_ROOT)
        && let Err(e) = fs::remove_dir_all(&root).await
    {
        log::warn!("Could not delete build root {}: {}", root.display(), e);
    }
    None
}

async fn artifact(package_type: PackageType, path: PathBuf) -> Result<BundledArtifact> {
    if !path.exists() {
        return Err(Error::packaging(
            format!("{} disappeared during cleanup", path.display()),
            "Make sure the output directory is not inside the build root",
        ));
    }

    let size = fs::path_size(&path)?;
    let checksum = calculate_sha256(&path).await?;
    log::debug!("{} sha256 {}", path.display(), checksum);
    Ok(BundledArtifact {
        package_type,
        paths: vec![path],
        size,
        checksum,
    })
}

/// SHA-256 of a file, or of a directory tree for image artifacts.
async fn calculate_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let metadata = tokio::fs::metadata(path)
        .await
        .fs_context("reading artifact metadata", path)?;

    if metadata.is_file() {
        let mut file = tokio::fs::File::open(path)
            .await
            .fs_context("opening artifact", path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 8192];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .fs_context("reading artifact", path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    } else if metadata.is_dir() {
        calculate_directory_sha256(path).await
    } else {
        bail!("Path is neither file nor directory: {}", path.display())
    }
}

/// Hashes every file's relative path and content in sorted path order.
async fn calculate_directory_sha256(dir_path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut entries: Vec<_> = walkdir::WalkDir::new(dir_path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    entries.sort_by_key(|e| e.path().to_path_buf());

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    for entry in entries {
        if let Ok(rel_path) = entry.path().strip_prefix(dir_path) {
            hasher.update(rel_path.to_string_lossy().as_bytes());
        }

        let mut file = tokio::fs::File::open(entry.path())
            .await
            .fs_context("opening file for hashing", entry.path())?;
        loop {
            let n = file
                .read(&mut buffer)
                .await
                .fs_context("reading file for hash calculation", entry.path())?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        tokio::fs::write(&file, b"abc").await.unwrap();
        assert_eq!(
            calculate_sha256(&file).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_directory_checksum_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("b")).await.unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"1").await.unwrap();
        tokio::fs::write(dir.path().join("b/c.txt"), b"2").await.unwrap();

        let first = calculate_sha256(dir.path()).await.unwrap();
        let second = calculate_sha256(dir.path()).await.unwrap();
        assert_eq!(first, second);

        tokio::fs::write(dir.path().join("b/c.txt"), b"3").await.unwrap();
        assert_ne!(first, calculate_sha256(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_vanished_artifact_is_packaging_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = artifact(PackageType::Deb, dir.path().join("gone.deb"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::bundler::error::ErrorKind::Packaging);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_image_when_verbose() {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("work");
        std::fs::create_dir_all(&working).unwrap();

        let seed = ParamStore::new();
        let mut store = ParamStore::new();
        store.put(ParamId::WorkingImageDir, working.clone());
        store.put(ParamId::Verbose, true);
        assert_eq!(cleanup(&seed, &mut store).await, Some(working.clone()));
        assert!(working.exists());

        store.put(ParamId::Verbose, false);
        assert_eq!(cleanup(&seed, &mut store).await, None);
        assert!(!working.exists());
    }

    #[tokio::test]
    async fn test_cleanup_deletes_copy_of_predefined_image() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Hello");
        std::fs::create_dir_all(source.join("bin")).unwrap();
        let root = dir.path().join("root");
        let working = root.join("linux/deb.image");
        std::fs::create_dir_all(working.join("hello/opt/hello/bin")).unwrap();

        let seed = ParamStore::new();
        let mut store = ParamStore::new();
        store.put(ParamId::PredefinedAppImage, source.clone());
        store.put(ParamId::BuildRoot, root.clone());
        store.put(ParamId::WorkingImageDir, working.clone());

        assert_eq!(cleanup(&seed, &mut store).await, None);
        assert!(!working.exists());
        assert!(!root.exists());
        assert!(source.join("bin").is_dir());
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected cannot be removed as one.
        let working = dir.path().join("work");
        std::fs::write(&working, b"not a directory").unwrap();

        let mut seed = ParamStore::new();
        seed.put(ParamId::BuildRoot, dir.path().to_path_buf());
        let mut store = seed.clone();
        store.put(ParamId::WorkingImageDir, working.clone());

        assert_eq!(cleanup(&seed, &mut store).await, None);
        assert!(working.is_file());
    }
}
