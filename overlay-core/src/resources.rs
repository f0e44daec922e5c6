//! Resource resolution seam used while restoring snapshots.
//!
//! A restored scene is only ready once its background bitmap and every font
//! family it references have been resolved. The rendering side supplies a
//! [`ResourceLoader`] that knows how to do that; [`InlineResources`] is the
//! no-network default.

use async_trait::async_trait;

use crate::{EditorError, EditorResult};

/// Resolves fonts and images before a restored scene is reported ready.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Make a font family available for text layout.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::ResourceLoad`] if the family cannot be loaded.
    /// Callers fall back to a default face.
    async fn load_font(&self, family: &str) -> EditorResult<()>;

    /// Resolve (fetch and decode) an image source.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::ResourceLoad`] if the image is unreachable or
    /// cannot be decoded.
    async fn load_image(&self, source: &str) -> EditorResult<()>;
}

/// Loader for sessions without remote resources.
///
/// Every font is treated as installed locally; images only need a non-empty
/// source.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineResources;

#[async_trait]
impl ResourceLoader for InlineResources {
    async fn load_font(&self, _family: &str) -> EditorResult<()> {
        Ok(())
    }

    async fn load_image(&self, source: &str) -> EditorResult<()> {
        if source.trim().is_empty() {
            return Err(EditorError::ResourceLoad("empty image source".to_string()));
        }
        Ok(())
    }
}
