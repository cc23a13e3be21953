/*!
Error types for the snapkeep core engine.
*/

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type used throughout the snapkeep core.
pub type Result<T> = std::result::Result<T, SnapkeepError>;

/// Errors that can occur while indexing, creating, or pruning snapshots.
#[derive(Error, Debug)]
pub enum SnapkeepError {
    /// I/O errors during filesystem inspection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot store operation failed
    #[error("Store error during {operation} on {path}: {message}")]
    Store {
        operation: &'static str,
        path: PathBuf,
        message: String,
    },

    /// The given path is not a store-recognized subvolume
    #[error("Not a subvolume: {0}")]
    NotASubvolume(PathBuf),

    /// A subvolume path that cannot carry the naming contract
    #[error("Invalid subvolume path: {0}")]
    InvalidPath(String),

    /// Invalid retention policy parameters
    #[error("Invalid retention policy: {0}")]
    InvalidPolicy(String),
}

impl SnapkeepError {
    /// Create a new store error with operation and path context
    pub fn store<P: AsRef<Path>, S: Into<String>>(
        operation: &'static str,
        path: P,
        message: S,
    ) -> Self {
        Self::Store {
            operation,
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a new invalid path error
    pub fn invalid_path<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Create a new invalid policy error
    pub fn invalid_policy<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPolicy(msg.into())
    }
}
