//! # Kodegen Bundler Package
//!
//! Native installer packaging for JVM applications.
//!
//! A compiled application (jars, classes and optionally a runtime image) is
//! turned into a runnable application image or a platform installer by
//! driving the platform's own packaging tools:
//!
//! - **Images**: a self-contained directory with launcher, app files and runtime
//! - **Linux**: `.deb` through `dpkg-deb`, `.rpm` through `rpmbuild`
//! - **macOS**: `.pkg` through `pkgbuild`/`productbuild`, signed with `codesign`
//! - **Windows**: `.exe` through Inno Setup, `.msi` through WiX
//!
//! Configuration flows through a lazily resolved, memoizing parameter store
//! ([`bundler::params::ParamStore`]); see [`bundler`] for the library API.
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_package --input build/libs --main-jar hello.jar
//! kodegen_bundler_package -t deb --input build/libs --main-jar hello.jar --dest dist
//! kodegen_bundler_package --params-file package.toml --verbose
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod cli;
pub mod error;

pub use bundler::{BuildReport, BundledArtifact, Bundler, PackageType, Platform};
pub use cli::Args;
pub use error::{CliError, PackagerError, Result};
