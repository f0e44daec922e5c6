//! # Overlay Renderer
//!
//! Everything an editing session needs from the outside world:
//!
//! - decoding PNG uploads into data URIs
//! - a [`ResourceLoader`](overlay_core::ResourceLoader) for remote fonts and images
//! - native-resolution PNG export
//!
//! ## Export pipeline
//!
//! ```text
//! Scene (display space) ──► native_scene ──► SVG ──► usvg/resvg ──► PNG
//!          ▲                   ÷ scale
//!   OriginalImageRef
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod export;
pub mod fonts;
pub mod resources;
pub mod upload;

pub use error::{RenderError, RenderResult};
pub use export::{
    native_scene, scene_to_svg, ExportArtifact, ExportConfig, PngExporter, EXPORT_FILE_NAME,
};
pub use fonts::{
    FontCatalog, FontConfig, FontData, FontSource, DEFAULT_FONT_LIST_URL,
    DEFAULT_STYLESHEET_BASE,
};
pub use resources::RemoteResources;
pub use upload::{decode_data_uri, decode_png, is_png, png_dimensions, to_data_uri, UploadedImage};

/// Overlay renderer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
