//! Remote font catalog and stylesheet loading.
//!
//! The catalog is a list of font families served remotely, fetched once and
//! cached for the lifetime of the [`FontCatalog`]. Families that are not in
//! the catalog are assumed to be installed locally and need no loading.
//!
//! Loading a remote family fetches its stylesheet, then every font file its
//! `@font-face` rules point at. The font bytes stay in the catalog and are
//! handed to the exporter, so exported text uses the same faces.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use crate::error::{RenderError, RenderResult};

/// Default source of the remote font list.
pub const DEFAULT_FONT_LIST_URL: &str =
    "https://raw.githubusercontent.com/google/fonts/main/ofl/metadata/fonts.json";

/// Default base of font stylesheet URLs.
pub const DEFAULT_STYLESHEET_BASE: &str = "https://fonts.googleapis.com/css2";

/// Remote font configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontConfig {
    /// Where to fetch the font family list.
    pub list_url: String,
    /// Base URL of per-family stylesheets.
    pub stylesheet_base: String,
    /// Weights requested per family, `;`-separated.
    pub weights: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            list_url: DEFAULT_FONT_LIST_URL.to_string(),
            stylesheet_base: DEFAULT_STYLESHEET_BASE.to_string(),
            weights: "400;700".to_string(),
        }
    }
}

/// Accepted shapes of the font list document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FontList {
    /// A plain array of family names.
    Names(Vec<String>),
    /// A metadata document with one record per family.
    Metadata {
        font_metadata_list: Vec<FontMetadata>,
    },
}

#[derive(Debug, Deserialize)]
struct FontMetadata {
    name: String,
}

impl FontList {
    fn into_families(self) -> BTreeSet<String> {
        match self {
            Self::Names(names) => names.into_iter().collect(),
            Self::Metadata { font_metadata_list } => {
                font_metadata_list.into_iter().map(|m| m.name).collect()
            }
        }
    }
}

/// How a font family was made available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSource {
    /// Not a remote family; expected to be installed.
    Local,
    /// Stylesheet fetched by this call.
    Remote,
    /// Stylesheet fetched earlier.
    Cached,
}

/// Raw bytes of one font file.
pub type FontData = Arc<Vec<u8>>;

/// Cached remote font list plus the font files of every family loaded.
#[derive(Debug)]
pub struct FontCatalog {
    client: reqwest::Client,
    config: FontConfig,
    families: OnceCell<BTreeSet<String>>,
    faces: Mutex<HashMap<String, Vec<FontData>>>,
}

impl FontCatalog {
    /// Create a catalog with its own HTTP client.
    #[must_use]
    pub fn new(config: FontConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a catalog sharing an HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: FontConfig) -> Self {
        Self {
            client,
            config,
            families: OnceCell::new(),
            faces: Mutex::new(HashMap::new()),
        }
    }

    /// Catalog configuration.
    #[must_use]
    pub fn config(&self) -> &FontConfig {
        &self.config
    }

    /// The remote font families, fetched on first use.
    ///
    /// A failed fetch is logged and yields an empty catalog, so every family
    /// is then treated as local.
    pub async fn families(&self) -> &BTreeSet<String> {
        self.families
            .get_or_init(|| async {
                match self.fetch_families().await {
                    Ok(families) => {
                        tracing::info!("Loaded {} remote font families", families.len());
                        families
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load font list, using local fonts only: {e}");
                        BTreeSet::new()
                    }
                }
            })
            .await
    }

    async fn fetch_families(&self) -> RenderResult<BTreeSet<String>> {
        let response = self
            .client
            .get(&self.config.list_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| RenderError::Resource(format!("Font list request failed: {e}")))?;
        let list: FontList = response
            .json()
            .await
            .map_err(|e| RenderError::Resource(format!("Font list is malformed: {e}")))?;
        Ok(list.into_families())
    }

    /// Stylesheet URL for a family, e.g.
    /// `.../css2?family=Open+Sans:wght@400;700&display=swap`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Resource`] if the configured base is not a URL.
    pub fn stylesheet_url(&self, family: &str) -> RenderResult<Url> {
        let family = family.trim().replace(' ', "+");
        let raw = format!(
            "{}?family={family}:wght@{}&display=swap",
            self.config.stylesheet_base, self.config.weights
        );
        Url::parse(&raw).map_err(|e| RenderError::Resource(format!("Invalid font URL {raw}: {e}")))
    }

    /// Make a family available, fetching its stylesheet and font files once
    /// if it is a remote family.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Resource`] if the stylesheet or any font file
    /// cannot be fetched, or the stylesheet names no font files.
    pub async fn load(&self, family: &str) -> RenderResult<FontSource> {
        if !self.families().await.contains(family) {
            return Ok(FontSource::Local);
        }
        if self.is_loaded(family) {
            return Ok(FontSource::Cached);
        }

        let url = self.stylesheet_url(family)?;
        let css = self
            .fetch(url.clone())
            .await
            .map_err(|e| RenderError::Resource(format!("Font {family} failed to load: {e}")))?
            .text()
            .await
            .map_err(|e| RenderError::Resource(format!("Font {family} failed to load: {e}")))?;

        let sources = font_face_urls(&css, &url);
        if sources.is_empty() {
            return Err(RenderError::Resource(format!(
                "Font {family} stylesheet lists no font files"
            )));
        }

        let mut faces = Vec::with_capacity(sources.len());
        for source in sources {
            let bytes = self
                .fetch(source.clone())
                .await
                .map_err(|e| RenderError::Resource(format!("Font file {source} failed: {e}")))?
                .bytes()
                .await
                .map_err(|e| RenderError::Resource(format!("Font file {source} failed: {e}")))?;
            faces.push(Arc::new(bytes.to_vec()));
        }

        tracing::debug!("Loaded {} font files for {family} from {url}", faces.len());
        self.faces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(family.to_string(), faces);
        Ok(FontSource::Remote)
    }

    async fn fetch(&self, url: Url) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
    }

    /// Whether a family's font files have been fetched.
    #[must_use]
    pub fn is_loaded(&self, family: &str) -> bool {
        self.faces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(family)
    }

    /// Every font file fetched so far, for the exporter's font database.
    #[must_use]
    pub fn font_data(&self) -> Vec<FontData> {
        self.faces
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .flatten()
            .cloned()
            .collect()
    }
}

/// HTTP(S) font file URLs named by `url(...)` in a stylesheet, resolved
/// against the stylesheet's own URL, in order and without duplicates.
fn font_face_urls(css: &str, base: &Url) -> Vec<Url> {
    let mut urls: Vec<Url> = Vec::new();
    let mut rest = css;
    while let Some(start) = rest.find("url(") {
        rest = &rest[start + 4..];
        let Some(end) = rest.find(')') else {
            break;
        };
        let raw = rest[..end].trim().trim_matches(['"', '\'']);
        rest = &rest[end + 1..];
        match base.join(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
            Ok(url) => tracing::debug!("Skipping {} font source", url.scheme()),
            Err(e) => tracing::warn!("Skipping malformed font source {raw}: {e}"),
        }
    }
    urls
}
