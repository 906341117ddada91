//! # Error Handling
//!
//! Error taxonomy shared by every ssdbench component.
//!
//! ## Categories
//!
//! 1. **IO**: read/write/open/remove failures from the filesystem or the store
//! 2. **Lookup**: point reads of ids the store does not hold
//! 3. **Lifecycle**: operations on a released store handle
//! 4. **Transform**: compression stream failures
//! 5. **Orchestration**: phase and fan-out wrappers that name where a failure happened

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for ssdbench operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for ssdbench
#[derive(Error, Debug)]
pub enum Error {
    // Filesystem / store errors
    #[error("IO error: {message}")]
    Io { message: String, source: std::io::Error },

    #[error("Record store error: {message}")]
    Store { message: String },

    #[error("Row {id} not found in table {table}")]
    NotFound { table: String, id: i64 },

    #[error("Record store handle closed: {path:?}")]
    Closed { path: PathBuf },

    // Compression errors
    #[error("Compression transform failed: {message}")]
    Transform { message: String },

    // Orchestration errors
    #[error("Phase '{phase}' failed: {source}")]
    Phase {
        phase: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Fan-out member '{member}' failed: {source}")]
    FanOut {
        member: String,
        #[source]
        source: Box<Error>,
    },

    // System errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Wrap an IO error with a description of the operation that failed.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source,
        }
    }

    /// True for failures that belong to the IOError class: raw filesystem
    /// errors and record store engine errors.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io { .. } | Error::Store { .. })
    }

    /// Innermost error, looking through phase and fan-out wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Phase { source, .. } | Error::FanOut { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Name of the failing phase, if this error came out of the driver.
    pub fn phase_name(&self) -> Option<&str> {
        match self {
            Error::Phase { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// Get error code for log correlation
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Io { .. } => "IO_ERROR",
            Error::Store { .. } => "STORE_ERROR",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::Closed { .. } => "HANDLE_CLOSED",
            Error::Transform { .. } => "TRANSFORM_ERROR",
            Error::Phase { .. } => "PHASE_FAILED",
            Error::FanOut { .. } => "FAN_OUT_FAILED",
            Error::Configuration { .. } => "CONFIG_ERROR",
            Error::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Extension trait for attaching context to IO results
pub trait IoResultExt<T> {
    fn with_path(self, action: &str, path: &std::path::Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, action: &str, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| Error::Io {
            message: format!("{} {:?}: {}", action, path, e),
            source: e,
        })
    }
}
