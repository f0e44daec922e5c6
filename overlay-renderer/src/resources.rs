//! [`ResourceLoader`] backed by the remote font catalog and HTTP images.

use std::sync::Arc;

use async_trait::async_trait;
use overlay_core::{EditorError, EditorResult, ResourceLoader};

use crate::fonts::{FontCatalog, FontConfig};
use crate::upload::{decode_data_uri, png_dimensions};

/// Resolves fonts through a [`FontCatalog`] and images from data URIs or
/// HTTP(S).
#[derive(Debug, Clone)]
pub struct RemoteResources {
    client: reqwest::Client,
    fonts: Arc<FontCatalog>,
}

impl RemoteResources {
    /// Create a loader with a fresh catalog.
    #[must_use]
    pub fn new(config: FontConfig) -> Self {
        let client = reqwest::Client::new();
        let fonts = Arc::new(FontCatalog::with_client(client.clone(), config));
        Self { client, fonts }
    }

    /// Create a loader around an existing catalog.
    #[must_use]
    pub fn with_catalog(fonts: Arc<FontCatalog>) -> Self {
        Self {
            client: reqwest::Client::new(),
            fonts,
        }
    }

    /// The font catalog in use.
    #[must_use]
    pub fn fonts(&self) -> &FontCatalog {
        &self.fonts
    }

    async fn fetch(&self, source: &str) -> EditorResult<Vec<u8>> {
        let response = self
            .client
            .get(source)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| EditorError::ResourceLoad(format!("Image request failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EditorError::ResourceLoad(format!("Image download failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ResourceLoader for RemoteResources {
    async fn load_font(&self, family: &str) -> EditorResult<()> {
        self.fonts.load(family).await?;
        Ok(())
    }

    async fn load_image(&self, source: &str) -> EditorResult<()> {
        let bytes = if source.starts_with("data:") {
            decode_data_uri(source)?
        } else if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch(source).await?
        } else {
            return Err(EditorError::ResourceLoad(format!(
                "Unsupported image source: {}",
                source.chars().take(32).collect::<String>()
            )));
        };
        let (width, height) = png_dimensions(&bytes)?;
        tracing::debug!("Resolved {width}x{height} background image");
        Ok(())
    }
}
