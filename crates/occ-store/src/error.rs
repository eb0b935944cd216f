//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::resource::{ObjectKey, ResourceVersion};

/// Errors that can occur when using a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No object with this key.
    #[error("{0} not found")]
    NotFound(ObjectKey),

    /// An object with this key already exists.
    #[error("{0} already exists")]
    AlreadyExists(ObjectKey),

    /// The object changed since it was read.
    #[error("conflict on {key}: submitted version {submitted}, stored version {stored}")]
    Conflict {
        /// Object key.
        key: ObjectKey,
        /// Version carried by the rejected write.
        submitted: ResourceVersion,
        /// Version currently stored.
        stored: ResourceVersion,
    },

    /// Failed to read or write the state file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Failed to encode or decode the state file.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if this error is a retryable version conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
