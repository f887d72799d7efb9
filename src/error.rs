//! Error types for the command line front end.
//!
//! Bundler failures carry their own classification and advice (see
//! [`crate::bundler::error`]); this layer adds argument, parameter file and
//! I/O failures and turns all of them into recovery suggestions.

use crate::bundler::error::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for front end operations.
pub type Result<T> = std::result::Result<T, PackagerError>;

/// Main error type of the command line front end.
#[derive(Error, Debug)]
pub enum PackagerError {
    /// Bundler errors
    #[error("{0}")]
    Bundler(#[from] crate::bundler::Error),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Command line usage errors.
#[derive(Error, Debug)]
pub enum CliError {
    /// Argument value that cannot be used
    #[error("Invalid value for {argument}: {reason}")]
    InvalidArgument {
        /// Argument name
        argument: String,
        /// Reason for the error
        reason: String,
    },

    /// Parameter or properties file that cannot be read
    #[error("Cannot read {path}: {reason}")]
    UnreadableFile {
        /// File path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Some requested builds failed
    #[error("{failed} of {total} builds failed")]
    BuildsFailed {
        /// Failed builds
        failed: usize,
        /// Requested builds
        total: usize,
    },
}

impl PackagerError {
    /// Actionable recovery suggestions for this error.
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PackagerError::Bundler(e) => {
                let mut suggestions = vec![e.advice()];
                match e.kind() {
                    ErrorKind::Configuration => suggestions
                        .push("Check the parameters passed on the command line or in --params-file".to_string()),
                    ErrorKind::UnsupportedPlatform => suggestions
                        .push("Pass --type to build only the kinds this host supports".to_string()),
                    ErrorKind::Packaging => suggestions
                        .push("Re-run with --verbose to keep the working image for inspection".to_string()),
                    ErrorKind::Internal => {}
                }
                suggestions
            }
            PackagerError::Cli(CliError::InvalidArgument { argument, .. }) => vec![
                format!("Check the value given for {argument}"),
                "Run with --help to see the accepted values".to_string(),
            ],
            PackagerError::Cli(CliError::UnreadableFile { path, .. }) => {
                vec![format!("Check that {} exists and is readable", path.display())]
            }
            PackagerError::Cli(CliError::BuildsFailed { .. }) => vec![
                "See the per-build errors above".to_string(),
                "Re-run with --verbose to keep working images".to_string(),
            ],
            PackagerError::Toml(_) => {
                vec!["Parameter files map parameter names to strings, booleans, numbers or arrays".to_string()]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
