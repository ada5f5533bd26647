//! Error types for the fileintegrity library
//!
//! Every variant of [`IntegrityError`] is fatal for the run that produced it:
//! it means the store's invariants can no longer be trusted (journal
//! unreadable or unwritable, directory missing, serialization failure, backup
//! failure). Failures that concern a single file while hashing or verifying
//! are not errors at this level; they travel as data inside the worker
//! responses (see [`crate::pool::HashFailure`] and
//! [`crate::pool::VerifyFailure`]).

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the fileintegrity library
pub type Result<T> = std::result::Result<T, IntegrityError>;

/// Main error type for all store operations
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// I/O errors during journal, log or backup operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors while reading a JSON configuration file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Errors while writing a backup archive
    #[error("Backup archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The tracked directory does not exist
    #[error("Directory does not exist: {0:?}")]
    DirectoryNotFound(PathBuf),

    /// The tracked path exists but is not a directory
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// The metadata directory has not been created by an upsert yet
    #[error("Integrity directory missing in {0:?}")]
    MetadataDirMissing(PathBuf),

    /// A journal line could not be parsed
    #[error("Malformed journal record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number inside the journal file
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// A record could not be serialized into the journal format
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Pattern parsing error
    #[error("Invalid ignore pattern: {0}")]
    InvalidPattern(String),

    /// A journal path escapes the directory it belongs to
    #[error("Unsafe relative path: {0}")]
    UnsafeRelativePath(String),

    /// Worker pool failure (thread spawn or panic)
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntegrityError {
    /// Create a serialization error with a custom message
    pub fn serialization(msg: impl Into<String>) -> Self {
        IntegrityError::Serialization(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        IntegrityError::Internal(msg.into())
    }

    /// Check if this error indicates a damaged journal
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            IntegrityError::MalformedRecord { .. } | IntegrityError::UnsafeRelativePath(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            IntegrityError::MetadataDirMissing(path) => {
                format!(
                    "No integrity data found in {:?}. Run 'fileintegrity upsert' on it first.",
                    path
                )
            }
            IntegrityError::MalformedRecord { line, .. } => {
                format!(
                    "The integrity journal is damaged at line {}. Restore it from one of the zip backups next to it.",
                    line
                )
            }
            _ => self.to_string(),
        }
    }
}
