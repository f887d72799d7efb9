//! Native application packaging.
//!
//! Turns a compiled application (jars, classes, an optional runtime image)
//! into a platform distributable by assembling an application image and
//! driving the platform's own packaging tools.
//!
//! # Parameters
//!
//! Every input is a parameter in a [`params::ParamStore`]. Parameters left
//! unset are computed on first use from other parameters and memoized, so a
//! bundler only ever asks for what it needs:
//!
//! ```no_run
//! use kodegen_bundler_package::bundler::params::{ParamId, ParamStore, standard};
//!
//! # fn example() -> kodegen_bundler_package::bundler::Result<()> {
//! let mut store = ParamStore::new();
//! store.put_raw(ParamId::Input, "build/libs");
//! store.put_raw(ParamId::MainJar, "hello.jar");
//!
//! // Read from the jar manifest, along with the class path.
//! let main_class = store.require(&standard::MAIN_CLASS)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Formats
//!
//! | Platform | Formats | Tools |
//! |----------|---------|-------|
//! | any | application image | none |
//! | Linux | .deb, .rpm | dpkg-deb, rpmbuild |
//! | macOS | .pkg, Mac App Store .pkg | codesign, pkgbuild, productbuild |
//! | Windows | .exe, .msi | Inno Setup, WiX |
//!
//! # Resources
//!
//! Launchers, installer projects and package metadata are generated from
//! templates that can be replaced file by file; see [`resources`].

#![warn(missing_docs)]

mod builder;
pub mod error;
pub mod image;
pub mod params;
pub mod platform;
pub mod resources;
pub mod utils;

pub use builder::{BuildReport, Bundler};
pub use error::{Error, Result};
pub use platform::{PackageType, Platform};

use serde::Serialize;

/// A created installer or image.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_package::bundler::{Bundler, PackageType, params::ParamStore};
///
/// # async fn example(store: ParamStore) -> kodegen_bundler_package::bundler::Result<()> {
/// for report in Bundler::new("dist").build_all(&[PackageType::Deb], &store).await {
///     let artifact = report.result?;
///     println!("Created {}: {} bytes", artifact.package_type, artifact.size);
///     println!("SHA256: {}", artifact.checksum);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct BundledArtifact {
    /// The kind of artifact.
    pub package_type: PackageType,

    /// Files created, the artifact first.
    pub paths: Vec<std::path::PathBuf>,

    /// Size of the artifact in bytes, the whole tree for image directories.
    pub size: u64,

    /// SHA-256 checksum of the artifact.
    pub checksum: String,
}
