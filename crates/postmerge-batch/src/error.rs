//! Error types for the batch crate.

use std::io;
use thiserror::Error;

/// Errors raised while loading a job manifest.
#[derive(Error, Debug)]
pub enum JobError {
    /// The manifest could not be read.
    #[error("Failed to read job manifest {path}: {source}")]
    Read {
        /// The manifest path.
        path: String,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The manifest format is not supported.
    #[error("Unsupported job manifest format: {0}")]
    UnsupportedFormat(String),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for job manifest operations.
pub type JobResult<T> = Result<T, JobError>;
