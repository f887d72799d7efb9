//! Command line argument parsing and validation.

use clap::Parser;
use std::path::PathBuf;

/// Native installer packaging for JVM applications
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "kodegen_bundler_package",
    version,
    about = "Package a JVM application as a native image or installer",
    long_about = "Package a compiled JVM application as a runnable application image or a \
native installer (.deb, .rpm, .pkg, .exe, .msi) using the platform's own packaging tools.

Usage:
  kodegen_bundler_package --input build/libs --main-jar hello.jar
  kodegen_bundler_package -t deb -t rpm --input build/libs --main-jar hello.jar --dest dist
  kodegen_bundler_package --params-file package.toml --param linux-package-deps=libc6"
)]
pub struct Args {
    /// Package types to build (app-image, pkg, mac-app-store, exe, msi, deb, rpm); defaults to every type of the target platform
    #[arg(short = 't', long = "type", value_name = "TYPE", value_delimiter = ',')]
    pub types: Vec<String>,

    /// Directory holding the application files
    #[arg(short, long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Jar with the entry point, relative to --input
    #[arg(long, value_name = "JAR")]
    pub main_jar: Option<String>,

    /// Fully qualified entry point class
    #[arg(long, value_name = "CLASS")]
    pub main_class: Option<String>,

    /// Application name
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub app_name: Option<String>,

    /// Application version
    #[arg(long = "app-version", value_name = "VERSION")]
    pub app_version: Option<String>,

    /// Vendor name
    #[arg(long, value_name = "VENDOR")]
    pub vendor: Option<String>,

    /// Description
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,

    /// Copyright notice
    #[arg(long, value_name = "TEXT")]
    pub copyright: Option<String>,

    /// Application icon
    #[arg(long, value_name = "FILE")]
    pub icon: Option<PathBuf>,

    /// License file, relative to --input
    #[arg(long, value_name = "FILE")]
    pub license_file: Option<String>,

    /// Directory searched first for overridable resources
    #[arg(long, value_name = "DIR")]
    pub resource_dir: Option<PathBuf>,

    /// Runtime image to embed
    #[arg(long, value_name = "DIR")]
    pub runtime_image: Option<PathBuf>,

    /// Existing application image to package instead of building one
    #[arg(long = "app-image", value_name = "DIR")]
    pub app_image: Option<PathBuf>,

    /// Installation directory
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<String>,

    /// Scratch directory for intermediate files
    #[arg(long, value_name = "DIR")]
    pub build_root: Option<PathBuf>,

    /// Directory the artifacts are written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub dest: PathBuf,

    /// TOML file mapping parameter names to values
    #[arg(long, value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Any parameter as name=value; repeatable
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Properties file describing a file association; repeatable
    #[arg(long = "file-associations", value_name = "FILE")]
    pub file_associations: Vec<PathBuf>,

    /// Additional launcher as name=<properties file>; repeatable
    #[arg(long = "secondary-launcher", value_name = "NAME=FILE")]
    pub secondary_launchers: Vec<String>,

    /// Target platform (linux, macos, windows); defaults to the host
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Keep working images and log debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print the build reports as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if let Some(bad) = self.params.iter().find(|p| !p.contains('=')) {
            return Err(format!("--param expects NAME=VALUE, got '{bad}'"));
        }
        if let Some(bad) = self.secondary_launchers.iter().find(|p| !p.contains('=')) {
            return Err(format!("--secondary-launcher expects NAME=FILE, got '{bad}'"));
        }
        if self.types.iter().any(|t| t.trim().is_empty()) {
            return Err("--type cannot be empty".to_string());
        }
        Ok(())
    }

    /// Log filter implied by the verbosity flags.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_split_on_commas() {
        let args = Args::try_parse_from(["kodegen_bundler_package", "-t", "deb,rpm", "--type", "app-image"]).unwrap();
        assert_eq!(args.types, vec!["deb", "rpm", "app-image"]);
        assert_eq!(args.dest, PathBuf::from("."));
    }

    #[test]
    fn test_param_needs_equals() {
        let args = Args::try_parse_from(["kodegen_bundler_package", "--param", "verbose"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from(["kodegen_bundler_package", "-p", "linux-package-deps=libc6"]).unwrap();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["kodegen_bundler_package", "-q", "-v"]).is_err());
    }
}
