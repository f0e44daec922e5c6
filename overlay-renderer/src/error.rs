//! Renderer error types.

use overlay_core::EditorError;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while exporting, decoding uploads or loading fonts.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The session is not ready for the operation (e.g. no base image).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Resource loading or decoding failed.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Rasterization or encoding failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// An editing-session error surfaced through the renderer.
    #[error(transparent)]
    Editor(#[from] EditorError),
}

impl From<RenderError> for EditorError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::Editor(inner) => inner,
            RenderError::Precondition(msg) => EditorError::Precondition(msg),
            other => EditorError::ResourceLoad(other.to_string()),
        }
    }
}
