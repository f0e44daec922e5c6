//! Error types for editing-session operations.

use thiserror::Error;

/// Result type for editing-session operations.
pub type EditorResult<T> = Result<T, EditorError>;

/// Errors that can occur while editing a scene.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The session is not in a state that allows the operation
    /// (e.g. export without a base image, drag with nothing selected).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The operation is not valid for the given layer or selection.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A referenced layer does not exist in the scene.
    #[error("Layer not found: {0}")]
    NotFound(String),

    /// A font or image could not be loaded or decoded.
    #[error("Failed to load resource: {0}")]
    ResourceLoad(String),

    /// A snapshot document could not be turned back into a scene.
    #[error("Failed to restore snapshot: {0}")]
    Restore(String),

    /// Snapshot serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred in the persistence slot.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    /// Shorthand for a [`EditorError::NotFound`] naming a layer id.
    pub(crate) fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }
}
