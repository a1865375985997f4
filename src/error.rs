//! Error types for the relinker library
//!
//! Only run-level failures surface as [`RelinkError`]: invalid invocation,
//! unreadable roots, and artifacts that cannot be loaded or persisted. Problems
//! with a single walked file or a single (source, target) pair are logged and
//! counted by the operation that hit them instead of being returned.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the relinker library
pub type Result<T> = std::result::Result<T, RelinkError>;

/// Main error type for all relinker operations
#[derive(Debug, Error)]
pub enum RelinkError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// A directory root handed to a walk does not exist
    #[error("Directory not found: {0:?}")]
    SourceNotFound(PathBuf),

    /// A directory root handed to a walk is not a directory
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// The snapshot file to restore from does not exist
    #[error("Snapshot file not found: {0:?}")]
    SnapshotNotFound(PathBuf),

    /// An artifact (snapshot, report, inode map) could not be written
    #[error("Failed to persist {path:?}: {source}")]
    Persist {
        /// Destination of the artifact
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Exclude pattern parsing error
    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// File identity (device, inode) is not available on this platform
    #[error("File identity is not supported on this platform")]
    UnsupportedPlatform,
}

impl RelinkError {
    /// Create a configuration error with a custom message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        RelinkError::InvalidConfiguration(msg.into())
    }

    /// Wrap an I/O failure that happened while writing an artifact
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RelinkError::Persist {
            path: path.into(),
            source,
        }
    }

    /// Check if this error was caused by how the tool was invoked
    pub fn is_invocation_error(&self) -> bool {
        matches!(
            self,
            RelinkError::SourceNotFound(_)
                | RelinkError::NotADirectory(_)
                | RelinkError::SnapshotNotFound(_)
                | RelinkError::InvalidConfiguration(_)
                | RelinkError::InvalidPattern(_)
        )
    }

    /// Check if this error means an artifact was lost
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, RelinkError::Persist { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            RelinkError::SnapshotNotFound(path) => {
                format!(
                    "Snapshot file {:?} does not exist. Run 'relinker snapshot' first.",
                    path
                )
            }
            RelinkError::SourceNotFound(path) => {
                format!("Directory {:?} does not exist. Check the path and try again.", path)
            }
            RelinkError::Persist { path, source } => {
                format!(
                    "Could not write {:?}: {}. Check free space and permissions of the destination directory.",
                    path, source
                )
            }
            _ => self.to_string(),
        }
    }
}
