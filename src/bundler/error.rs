//! Error types for bundler operations.
//!
//! Every failure a packaging run can surface falls into one of three
//! categories, reported through [`Error::kind`]:
//!
//! - **Configuration**: a precondition was violated before any external side
//!   effect happened (missing parameter, value over a platform limit).
//! - **Unsupported platform**: the requested artifact cannot be produced on
//!   this host.
//! - **Packaging**: something failed during assembly, signing or the external
//!   tool invocation. Missing resources are a fatal packaging variant.
//!
//! Anything else is an internal fault. The pipeline driver wraps internal
//! faults into `Config` during validation and `Packaging` during execution,
//! so callers only ever see the closed taxonomy.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_package::bundler::error::{ErrorExt, Result};
//! use std::path::Path;
//!
//! fn read_template(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).fs_context("reading template", path)
//! }
//! ```

use crate::bundler::params::ParamId;
use std::{
    fmt::{self, Display},
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Invalid or missing input; fixable by changing parameters.
    Configuration,
    /// Artifact kind cannot be built on this host.
    UnsupportedPlatform,
    /// Failure during or after image assembly or tool invocation.
    Packaging,
    /// Not yet classified. Wrapped by the pipeline driver.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::UnsupportedPlatform => "unsupported platform",
            ErrorKind::Packaging => "packaging error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(label)
    }
}

/// Errors returned by the bundler.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading template")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Child process could not be spawned or awaited.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to execute
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// Invalid input detected before any external side effect.
    #[error("{message}")]
    Config {
        /// What is wrong
        message: String,
        /// How to fix it
        advice: String,
    },

    /// Requested package type cannot be produced on this host.
    #[error("package type {package_type} not supported on {platform}")]
    UnsupportedPlatform {
        /// The requested package type
        package_type: String,
        /// The current platform
        platform: String,
    },

    /// Failure while assembling or packaging.
    #[error("{message}")]
    Packaging {
        /// What went wrong
        message: String,
        /// How to fix it
        advice: String,
    },

    /// External tool exited with a non-zero status.
    #[error("{command} exited with code {exit_code}")]
    ToolFailed {
        /// Rendered command line
        command: String,
        /// Process exit code
        exit_code: i32,
        /// Combined stdout and stderr
        output: String,
    },

    /// No resolution branch produced the named resource.
    #[error("required {category} resource '{name}' could not be found")]
    ResourceMissing {
        /// Resource name that was requested
        name: String,
        /// Category label used for diagnostics
        category: String,
    },

    /// A raw value could not be converted to the parameter's type.
    #[error("cannot convert value {value:?} for parameter {id}: {reason}")]
    ParamConversion {
        /// Parameter being resolved
        id: ParamId,
        /// Offending raw value
        value: String,
        /// Why conversion failed
        reason: String,
    },

    /// A default computation re-entered itself.
    #[error("cyclic parameter dependency: {}", format_chain(.chain))]
    ParamCycle {
        /// Fetch chain ending in the repeated id
        chain: Vec<ParamId>,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// Jar archive reading error.
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    /// Regular expression error.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// UUID parsing error.
    #[error("{0}")]
    UuidError(#[from] uuid::Error),

    /// Property list writing error.
    #[error("{0}")]
    Plist(#[from] plist::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Build a configuration error.
    pub fn config(message: impl Into<String>, advice: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            advice: advice.into(),
        }
    }

    /// Build a packaging error.
    pub fn packaging(message: impl Into<String>, advice: impl Into<String>) -> Self {
        Error::Packaging {
            message: message.into(),
            advice: advice.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Context(_, inner) => inner.kind(),
            Error::Config { .. } => ErrorKind::Configuration,
            Error::UnsupportedPlatform { .. } => ErrorKind::UnsupportedPlatform,
            Error::Packaging { .. } | Error::ToolFailed { .. } | Error::ResourceMissing { .. } => {
                ErrorKind::Packaging
            }
            _ => ErrorKind::Internal,
        }
    }

    /// Actionable remediation for this error.
    pub fn advice(&self) -> String {
        match self {
            Error::Context(_, inner) => inner.advice(),
            Error::Config { advice, .. } | Error::Packaging { advice, .. } => advice.clone(),
            Error::UnsupportedPlatform { package_type, .. } => {
                format!("Build {package_type} packages on a host that provides its native tools")
            }
            Error::ToolFailed { command, .. } => format!(
                "Inspect the tool output above, then re-run `{command}` manually with --verbose to keep the working image"
            ),
            Error::ResourceMissing { name, .. } => format!(
                "Place a file named {name} in the resource directory or pass an override file"
            ),
            Error::ParamConversion { id, .. } => {
                format!("Check the value passed for --{}", id.as_str())
            }
            Error::ParamCycle { .. } => {
                "Set one of the parameters in the cycle explicitly".to_string()
            }
            Error::Fs { path, .. } => {
                format!("Check that {} exists and is accessible", path.display())
            }
            _ => "Re-run with --verbose for details".to_string(),
        }
    }

    /// Exit code of a failed tool invocation, if this error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::Context(_, inner) => inner.exit_code(),
            Error::ToolFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Captured tool output, if this error carries one.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Error::Context(_, inner) => inner.tool_output(),
            Error::ToolFailed { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Wrap internal faults raised during validation.
    pub(crate) fn into_configuration(self) -> Self {
        match self.kind() {
            ErrorKind::Internal => Error::Config {
                message: self.to_string(),
                advice: self.advice(),
            },
            _ => self,
        }
    }

    /// Wrap internal faults raised during execution.
    pub(crate) fn into_packaging(self) -> Self {
        match self.kind() {
            ErrorKind::Internal => Error::Packaging {
                message: self.to_string(),
                advice: self.advice(),
            },
            _ => self,
        }
    }
}

fn format_chain(chain: &[ParamId]) -> String {
    chain
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with bundler's Error type.
/// Works with both `Result<T, E>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying launcher".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::error::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::error::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::error::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
