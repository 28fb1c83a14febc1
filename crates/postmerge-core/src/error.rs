//! Error handling for postmerge
//!
//! Provides the error taxonomy used while post-processing a setup:
//! - Engine errors (the external post processor reported failure)
//! - Timeout errors (the post processor output never appeared)
//! - Format errors (the output does not follow the expected program layout)
//! - Naming errors (the setup name cannot produce a valid program name)
//!
//! All error types use `thiserror` for ergonomic error handling. Engine, timeout,
//! format and naming errors abort the current setup only; the batch runner records
//! them and moves on to the next setup.

use std::path::PathBuf;
use thiserror::Error;

/// Post processor invocation error
///
/// Raised when the external post processor reports failure. Never retried.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// The post processor ran and reported failure
    #[error("Post processor failed on {operations}: {reason}")]
    Failed {
        /// Comma-separated names of the operations being posted.
        operations: String,
        /// The failure reported by the post processor.
        reason: String,
    },

    /// The post processor could not be started at all
    #[error("Failed to launch post processor '{program}': {reason}")]
    Launch {
        /// The program that was being launched.
        program: String,
        /// The reason the launch failed.
        reason: String,
    },

    /// No post processor is configured
    #[error("No post processor configured")]
    NotConfigured,
}

/// Fragment retrieval timeout
///
/// The post processor returned success but its output file never became visible.
#[derive(Error, Debug, Clone)]
pub enum TimeoutError {
    /// Nothing resembling the expected file was found
    #[error("Post processor output {path:?} for {operations} not found after {attempts} attempts")]
    NotFound {
        /// The expected fragment path.
        path: PathBuf,
        /// Number of open attempts made.
        attempts: u32,
        /// Comma-separated names of the operations being posted.
        operations: String,
    },

    /// A file with the expected name but another extension was found
    #[error(
        "Post processor output {path:?} for {operations} not found after {attempts} attempts; \
         found {found:?} instead, check the output file extension setting"
    )]
    WrongExtension {
        /// The expected fragment path.
        path: PathBuf,
        /// Number of open attempts made.
        attempts: u32,
        /// Comma-separated names of the operations being posted.
        operations: String,
        /// The file that was written instead.
        found: PathBuf,
    },
}

/// Fragment format error
///
/// The post processor output does not have the header/tool/body layout the merger
/// relies on. Reported as an incompatible post processor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    /// The fragment never selects a tool
    #[error("Incompatible post processor: no tool selection found in output for {operations}")]
    MissingToolLine {
        /// Comma-separated names of the operations being posted.
        operations: String,
    },

    /// The fragment is empty
    #[error("Incompatible post processor: empty output for {operations}")]
    Empty {
        /// Comma-separated names of the operations being posted.
        operations: String,
    },
}

/// Output naming error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NamingError {
    /// Numeric program names are required but the setup name has no leading number
    #[error("Setup '{setup}' must start with a program number when numeric names are enabled")]
    MissingProgramNumber {
        /// The offending setup name.
        setup: String,
    },

    /// The setup name yields an empty file name
    #[error("Setup '{setup}' has an empty file name")]
    EmptyName {
        /// The offending setup name.
        setup: String,
    },
}

/// Broad classification of an error, used in batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Post processor failure
    Engine,
    /// Output never appeared
    Timeout,
    /// Incompatible post processor output
    Format,
    /// Bad setup name
    Naming,
    /// File system failure
    Io,
    /// Anything else
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine => write!(f, "Failed"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Format => write!(f, "Incompatible"),
            Self::Naming => write!(f, "Name"),
            Self::Io => write!(f, "I/O"),
            Self::Other => write!(f, "Error"),
        }
    }
}

/// Main error type for postmerge
///
/// A unified error type that can represent any error raised while posting a setup.
#[derive(Error, Debug)]
pub enum Error {
    /// Post processor error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Fragment retrieval timeout
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// Fragment format error
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Output naming error
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Engine(_) => ErrorKind::Engine,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Format(_) => ErrorKind::Format,
            Error::Naming(_) => ErrorKind::Naming,
            Error::Io(_) => ErrorKind::Io,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Check if running the setup again might succeed
    ///
    /// Missing fragments and file system failures qualify; engine and format
    /// failures would repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Io(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Check if this is a format error
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::Format(_))
    }

    /// Check if this is an engine error
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::Engine(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_names_operations() {
        let err = EngineError::Failed {
            operations: "Face1, Adaptive2".to_string(),
            reason: "post returned false".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Post processor failed on Face1, Adaptive2: post returned false"
        );
    }

    #[test]
    fn test_timeout_error_mentions_wrong_extension() {
        let err = TimeoutError::WrongExtension {
            path: PathBuf::from("out/tmp.nc"),
            attempts: 4,
            operations: "Bore1".to_string(),
            found: PathBuf::from("out/tmp.tap"),
        };
        let msg = err.to_string();
        assert!(msg.contains("tmp.tap"));
        assert!(msg.contains("4 attempts"));
    }

    #[test]
    fn test_error_kind_classification() {
        let err: Error = FormatError::MissingToolLine {
            operations: "Face1".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.is_format_error());
        assert!(err.to_string().starts_with("Incompatible post processor"));

        let err: Error = TimeoutError::NotFound {
            path: PathBuf::from("x.nc"),
            attempts: 1,
            operations: "Face1".to_string(),
        }
        .into();
        assert!(err.is_timeout());
        assert!(err.is_retryable());
        assert_eq!(err.kind().to_string(), "Timeout");

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
