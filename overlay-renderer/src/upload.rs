//! Decoding uploaded images and data URIs.
//!
//! Only PNG uploads are accepted. The bytes are checked against the PNG
//! signature before decoding, and the result is carried as a base64 data URI
//! so the background survives snapshot round-trips without external files.

use base64::Engine;
use overlay_core::BaseImage;

use crate::error::{RenderError, RenderResult};

/// The 8-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// A decoded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Native width in pixels.
    pub width: u32,
    /// Native height in pixels.
    pub height: u32,
    /// `data:image/png;base64,...` URI of the original bytes.
    pub data_uri: String,
}

impl From<UploadedImage> for BaseImage {
    fn from(image: UploadedImage) -> Self {
        BaseImage {
            source: image.data_uri,
            width: image.width,
            height: image.height,
        }
    }
}

/// Check whether the bytes start with the PNG signature.
#[must_use]
pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

/// Decode a PNG upload.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the bytes are not a PNG or cannot be
/// decoded.
pub fn decode_png(data: &[u8]) -> RenderResult<UploadedImage> {
    let (width, height) = png_dimensions(data)?;
    tracing::debug!("Decoded {width}x{height} PNG upload ({} bytes)", data.len());
    Ok(UploadedImage {
        width,
        height,
        data_uri: to_data_uri(data),
    })
}

/// Decode a PNG fully and return its size.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the bytes are not a decodable PNG.
pub fn png_dimensions(data: &[u8]) -> RenderResult<(u32, u32)> {
    if !is_png(data) {
        return Err(RenderError::Resource(
            "Unsupported image format: only PNG uploads are accepted".to_string(),
        ));
    }
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(RenderError::Resource("Image has no pixels".to_string()));
    }
    Ok((img.width(), img.height()))
}

/// Encode PNG bytes as a base64 data URI.
#[must_use]
pub fn to_data_uri(data: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// Extract the bytes of a base64 data URI.
///
/// Supports URIs like `data:image/png;base64,iVBORw0KGgo...`.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the URI is not a base64 data URI or
/// the payload is not valid base64.
pub fn decode_data_uri(uri: &str) -> RenderResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;
    let (metadata, encoded) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;
    if !metadata.ends_with(";base64") {
        return Err(RenderError::Resource(
            "Invalid data URI: only base64 payloads are supported".to_string(),
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a solid RGBA image as PNG.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn test_decode_png_reports_native_size() {
        let uploaded = decode_png(&png_bytes(40, 20)).expect("decode");
        assert_eq!((uploaded.width, uploaded.height), (40, 20));
        assert!(uploaded.data_uri.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_non_png_is_rejected() {
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0];
        assert!(matches!(
            decode_png(&jpeg_header),
            Err(RenderError::Resource(_))
        ));
    }

    #[test]
    fn test_truncated_png_is_rejected() {
        let bytes = png_bytes(4, 4);
        assert!(matches!(
            decode_png(&bytes[..20]),
            Err(RenderError::Resource(_))
        ));
    }

    #[test]
    fn test_data_uri_roundtrip() {
        let bytes = png_bytes(2, 2);
        let uri = to_data_uri(&bytes);
        assert_eq!(decode_data_uri(&uri).expect("decode"), bytes);
    }

    #[test]
    fn test_decode_data_uri_errors() {
        assert!(decode_data_uri("https://example.com/a.png").is_err());
        assert!(decode_data_uri("data:image/png;base64").is_err());
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_into_base_image() {
        let base: BaseImage = decode_png(&png_bytes(3, 5)).expect("decode").into();
        assert_eq!((base.width, base.height), (3, 5));
        assert!(base.source.starts_with("data:image/png"));
    }
}
