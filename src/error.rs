//! Error types for the textarc library
//!
//! All fallible operations return [`Result`], and the error taxonomy follows
//! the recovery policy of the library: configuration errors fail fast at
//! construction, per-file errors are logged and counted while the operation
//! continues, security errors skip the offending archive entry, and systemic
//! errors abort the whole operation.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the textarc library
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Main error type for all archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration (bad size string, zero workers, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Source directory does not exist
    #[error("Source path does not exist: {0:?}")]
    SourceMissing(PathBuf),

    /// Source path exists but is not a directory
    #[error("Source path is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// Archive path exists but is not a regular file
    #[error("Input path is not a file: {0:?}")]
    NotAFile(PathBuf),

    /// Output location cannot be written
    #[error("Cannot write to output directory: {0:?}")]
    OutputNotWritable(PathBuf),

    /// Archive format name was not recognized
    #[error("Unknown archive format: {0}")]
    UnknownFormat(String),

    /// The archive stream could not be parsed at all
    #[error("Unparseable archive: {0}")]
    Parse(String),

    /// Path traversal or NUL injection detected while restoring an entry
    #[error("Security violation for entry {path:?}: {reason}")]
    Security {
        /// Archive-relative path of the offending entry
        path: String,
        /// What the sanitizer objected to
        reason: String,
    },

    /// Payload for one entry could not be base64-decoded
    #[error("Invalid base64 payload for entry {path:?}")]
    InvalidBase64 {
        /// Archive-relative path of the entry
        path: String,
    },

    /// Text payload for one entry could not be decoded
    #[error("Encoding error for entry {path:?}: {reason}")]
    Encoding {
        /// Archive-relative path of the entry
        path: String,
        /// Description of the decode failure
        reason: String,
    },

    /// Operation was cancelled (e.g. Ctrl-C)
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArchiveError {
    /// Create an invalid-configuration error with a custom message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ArchiveError::InvalidConfiguration(msg.into())
    }

    /// Create a parse error with a custom message
    pub fn parse(msg: impl Into<String>) -> Self {
        ArchiveError::Parse(msg.into())
    }

    /// Create a security error for one archive entry
    pub fn security(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ArchiveError::Security {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ArchiveError::Internal(msg.into())
    }

    /// Check if this error is scoped to a single archive entry
    ///
    /// Entry-scoped errors are logged and counted; the surrounding combine
    /// or split operation keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ArchiveError::Security { .. }
                | ArchiveError::InvalidBase64 { .. }
                | ArchiveError::Encoding { .. }
        )
    }

    /// Check if this error is a security rejection
    pub fn is_security(&self) -> bool {
        matches!(self, ArchiveError::Security { .. })
    }
}
