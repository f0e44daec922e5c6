//! Native-resolution export of a scene to PNG.
//!
//! The on-screen scene is shown at a fitted scale. Export rebuilds it at the
//! uploaded image's native pixel size: every layer is cloned and divided by
//! the display-to-native ratio recorded in [`OriginalImageRef`], the result is
//! written as SVG and rasterized with resvg/tiny-skia.

use std::fmt::Write;

use overlay_core::{FontStyle, Layer, LayerKind, OriginalImageRef, Scene, TextAlign, TextLayer};

use crate::error::{RenderError, RenderResult};
use crate::fonts::FontData;

/// File name used for downloaded exports.
pub const EXPORT_FILE_NAME: &str = "adomate-creation.png";

/// Baseline of the first line, as a fraction of the font size below the top
/// of the text box.
const BASELINE_RATIO: f64 = 0.8;

/// Configuration for scene export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Name the artifact is offered under.
    pub file_name: String,
    /// Load installed system fonts into the rasterizer's font database.
    pub load_system_fonts: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: EXPORT_FILE_NAME.to_string(),
            load_system_fonts: true,
        }
    }
}

/// An encoded export ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Suggested file name.
    pub file_name: String,
    /// PNG bytes.
    pub bytes: Vec<u8>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

/// Rebuild a display-space scene at the native resolution of its image.
///
/// # Errors
///
/// Returns [`RenderError::Precondition`] if no image was uploaded or the
/// recorded scale is not positive.
pub fn native_scene(scene: &Scene, original: Option<&OriginalImageRef>) -> RenderResult<Scene> {
    let original =
        original.ok_or_else(|| RenderError::Precondition("no base image".to_string()))?;
    let ratio = original.scale;
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(RenderError::Precondition(format!(
            "invalid display scale {ratio}"
        )));
    }

    let background = scene.background.clone().map(|mut bg| {
        bg.transform.x /= ratio;
        bg.transform.y /= ratio;
        bg.transform.scale_x /= ratio;
        bg.transform.scale_y /= ratio;
        bg
    });
    let layers = scene
        .layers()
        .iter()
        .cloned()
        .map(|mut layer| {
            layer.rescale_to_native(ratio);
            layer
        })
        .collect();

    Ok(Scene::from_parts(
        f64::from(original.width),
        f64::from(original.height),
        scene.background_color.clone(),
        background,
        layers,
    ))
}

/// Write a scene as an SVG document of exactly its canvas size.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn scene_to_svg(scene: &Scene) -> String {
    let width = scene.width.round().max(1.0) as u32;
    let height = scene.height.round().max(1.0) as u32;

    let mut svg = String::with_capacity(4096);
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&scene.background_color)
    );

    if let Some(bg) = &scene.background {
        let _ = write!(
            svg,
            "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"none\" href=\"{}\"/>",
            bg.transform.x,
            bg.transform.y,
            bg.width * bg.transform.scale_x,
            bg.height * bg.transform.scale_y,
            escape_xml(&bg.source),
        );
    }

    let mut filters = 0;
    for layer in scene.layers() {
        write_layer(&mut svg, layer, &mut filters);
    }

    svg.push_str("</svg>");
    svg
}

/// Write a layer in its parent's coordinate space.
fn write_layer(svg: &mut String, layer: &Layer, filters: &mut usize) {
    if !layer.visible {
        return;
    }
    let t = &layer.transform;
    let (cx, cy) = layer.center();
    let _ = write!(
        svg,
        "<g transform=\"translate({cx} {cy}) rotate({}) translate({} {}) scale({} {})\" opacity=\"{}\">",
        t.rotation,
        -layer.scaled_width() / 2.0,
        -layer.scaled_height() / 2.0,
        t.scale_x,
        t.scale_y,
        layer.opacity,
    );
    match &layer.kind {
        LayerKind::Text(text) => write_text(svg, layer.width, text, filters),
        LayerKind::Group(group) => {
            for child in &group.children {
                write_layer(svg, child, filters);
            }
        }
    }
    svg.push_str("</g>");
}

fn write_text(svg: &mut String, box_width: f64, text: &TextLayer, filters: &mut usize) {
    let style = &text.style;
    let (anchor, x) = match style.text_align {
        TextAlign::Left => ("start", 0.0),
        TextAlign::Center => ("middle", box_width / 2.0),
        TextAlign::Right => ("end", box_width),
    };
    let font_style = match style.font_style {
        FontStyle::Normal => "normal",
        FontStyle::Italic => "italic",
    };

    let mut attrs = String::new();
    let _ = write!(
        attrs,
        " font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" font-style=\"{font_style}\" fill=\"{}\" text-anchor=\"{anchor}\"",
        escape_xml(&style.font_family),
        style.font_size,
        style.font_weight,
        escape_xml(&style.fill),
    );
    if style.letter_spacing.abs() > f64::EPSILON {
        let _ = write!(attrs, " letter-spacing=\"{}\"", style.letter_spacing);
    }
    if let Some(stroke) = &style.stroke {
        let _ = write!(
            attrs,
            " stroke=\"{}\" stroke-width=\"{}\"",
            escape_xml(&stroke.color),
            stroke.width
        );
    }
    if let Some(shadow) = &style.shadow {
        let id = format!("shadow-{filters}");
        *filters += 1;
        let _ = write!(
            svg,
            "<filter id=\"{id}\" x=\"-50%\" y=\"-50%\" width=\"200%\" height=\"200%\"><feDropShadow dx=\"{}\" dy=\"{}\" stdDeviation=\"{}\" flood-color=\"{}\"/></filter>",
            shadow.offset_x,
            shadow.offset_y,
            shadow.blur / 2.0,
            escape_xml(&shadow.color),
        );
        let _ = write!(attrs, " filter=\"url(#{id})\"");
    }

    let line_advance = style.font_size * style.line_height;
    let _ = write!(svg, "<text{attrs}>");
    for (index, line) in text.content.split('\n').enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let baseline = index as f64 * line_advance + style.font_size * BASELINE_RATIO;
        let _ = write!(
            svg,
            "<tspan x=\"{x}\" y=\"{baseline}\">{}</tspan>",
            escape_xml(line)
        );
    }
    svg.push_str("</text>");
}

/// Escape special XML characters.
fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Exports scenes to PNG at native resolution.
#[derive(Clone, Default)]
pub struct PngExporter {
    config: ExportConfig,
    fonts: Vec<FontData>,
}

impl std::fmt::Debug for PngExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PngExporter")
            .field("config", &self.config)
            .field("fonts", &self.fonts.len())
            .finish()
    }
}

impl PngExporter {
    /// Create a new exporter with the given configuration.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            fonts: Vec::new(),
        }
    }

    /// Add font files, e.g. from
    /// [`FontCatalog::font_data`](crate::fonts::FontCatalog::font_data), to
    /// the rasterizer's font database.
    #[must_use]
    pub fn with_font_data(mut self, fonts: impl IntoIterator<Item = FontData>) -> Self {
        self.fonts.extend(fonts);
        self
    }

    /// Create an exporter with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ExportConfig::default())
    }

    /// Export configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Build the native-resolution SVG for a scene.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Precondition`] if no image was uploaded.
    pub fn render_to_svg(
        &self,
        scene: &Scene,
        original: Option<&OriginalImageRef>,
    ) -> RenderResult<String> {
        Ok(scene_to_svg(&native_scene(scene, original)?))
    }

    /// Render a scene to an encoded PNG artifact at native resolution.
    ///
    /// Nothing is produced when the precondition fails.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Precondition`] if no image was uploaded and
    /// [`RenderError::Export`] if rasterization or encoding fails.
    #[cfg(feature = "export")]
    pub fn export(
        &self,
        scene: &Scene,
        original: Option<&OriginalImageRef>,
    ) -> RenderResult<ExportArtifact> {
        let svg = self.render_to_svg(scene, original)?;
        let pixmap = self.rasterize_svg(&svg)?;
        let bytes = pixmap
            .encode_png()
            .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
        tracing::info!(
            "Exported {}x{} PNG ({} bytes) as {}",
            pixmap.width(),
            pixmap.height(),
            bytes.len(),
            self.config.file_name
        );
        Ok(ExportArtifact {
            file_name: self.config.file_name.clone(),
            width: pixmap.width(),
            height: pixmap.height(),
            bytes,
        })
    }

    /// Rasterize an SVG string to a tiny-skia Pixmap.
    #[cfg(feature = "export")]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rasterize_svg(&self, svg: &str) -> RenderResult<tiny_skia::Pixmap> {
        let mut opt = usvg::Options::default();
        let fontdb = opt.fontdb_mut();
        if self.config.load_system_fonts {
            fontdb.load_system_fonts();
        }
        for data in &self.fonts {
            fontdb.load_font_data(data.as_ref().clone());
        }
        if fontdb.is_empty() {
            tracing::warn!("No fonts available to the rasterizer; text layers will not render");
        }
        let tree = usvg::Tree::from_str(svg, &opt)
            .map_err(|e| RenderError::Export(format!("SVG parsing failed: {e}")))?;

        let px_w = tree.size().width().round() as u32;
        let px_h = tree.size().height().round() as u32;

        let mut pixmap = tiny_skia::Pixmap::new(px_w.max(1), px_h.max(1))
            .ok_or_else(|| RenderError::Export("Failed to create pixmap".to_string()))?;

        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        Ok(pixmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_core::{Background, Shadow, Stroke, TextStyle, Transform};

    fn original() -> OriginalImageRef {
        OriginalImageRef {
            width: 2000,
            height: 1000,
            scale: 0.25,
        }
    }

    fn display_scene(layers: Vec<Layer>) -> Scene {
        Scene::from_parts(
            500.0,
            250.0,
            "#f0f0f0".to_string(),
            Some(Background {
                source: "data:image/png;base64,AAAA".to_string(),
                width: 2000.0,
                height: 1000.0,
                transform: Transform {
                    scale_x: 0.25,
                    scale_y: 0.25,
                    ..Transform::default()
                },
            }),
            layers,
        )
    }

    fn text_at(x: f64, y: f64, size: f64) -> Layer {
        Layer::text(
            "Hello",
            TextStyle {
                font_size: size,
                ..TextStyle::default()
            },
        )
        .with_position(x, y)
    }

    #[test]
    fn test_native_scene_requires_base_image() {
        let scene = display_scene(Vec::new());
        assert!(matches!(
            native_scene(&scene, None),
            Err(RenderError::Precondition(_))
        ));
    }

    #[test]
    fn test_native_scene_rejects_zero_scale() {
        let scene = display_scene(Vec::new());
        let broken = OriginalImageRef {
            scale: 0.0,
            ..original()
        };
        assert!(matches!(
            native_scene(&scene, Some(&broken)),
            Err(RenderError::Precondition(_))
        ));
    }

    #[test]
    fn test_native_scene_rescales_text() {
        let scene = display_scene(vec![text_at(100.0, 50.0, 24.0)]);
        let native = native_scene(&scene, Some(&original())).expect("native");

        assert_eq!((native.width, native.height), (2000.0, 1000.0));
        let layer = &native.layers()[0];
        assert!((layer.transform.x - 400.0).abs() < 1e-9);
        assert!((layer.transform.y - 200.0).abs() < 1e-9);
        let text = layer.as_text().expect("text");
        assert!((text.style.font_size - 96.0).abs() < 1e-9);
        assert!((layer.transform.scale_x - 1.0).abs() < f64::EPSILON);

        let bg = native.background.as_ref().expect("background");
        assert!((bg.transform.scale_x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_native_scene_leaves_display_scene_alone() {
        let scene = display_scene(vec![text_at(100.0, 50.0, 24.0)]);
        let before = scene.clone();
        let _ = native_scene(&scene, Some(&original())).expect("native");
        assert_eq!(scene, before);
    }

    #[test]
    fn test_svg_has_native_size_and_background() {
        let scene = display_scene(vec![text_at(100.0, 50.0, 24.0)]);
        let svg = PngExporter::with_defaults()
            .render_to_svg(&scene, Some(&original()))
            .expect("svg");
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("width=\"2000\""));
        assert!(svg.contains("height=\"1000\""));
        assert!(svg.contains("preserveAspectRatio=\"none\""));
        assert!(svg.contains("font-size=\"96\""));
        assert!(svg.contains(">Hello</tspan>"));
    }

    #[test]
    fn test_svg_text_styling() {
        let style = TextStyle {
            text_align: TextAlign::Center,
            font_style: FontStyle::Italic,
            font_weight: 700,
            stroke: Some(Stroke {
                color: "#ffffff".to_string(),
                width: 2.0,
            }),
            shadow: Some(Shadow {
                color: "#000000".to_string(),
                blur: 4.0,
                offset_x: 1.0,
                offset_y: 1.0,
            }),
            ..TextStyle::default()
        };
        let scene = Scene::from_parts(
            200.0,
            100.0,
            "#ffffff".to_string(),
            None,
            vec![Layer::text("one\ntwo", style).with_size(120.0, 80.0)],
        );
        let svg = scene_to_svg(&scene);

        assert!(svg.contains("text-anchor=\"middle\""));
        assert!(svg.contains("<tspan x=\"60\""));
        assert!(svg.contains("font-style=\"italic\""));
        assert!(svg.contains("font-weight=\"700\""));
        assert!(svg.contains("stroke-width=\"2\""));
        assert!(svg.contains("<feDropShadow"));
        assert!(svg.contains("filter=\"url(#shadow-0)\""));
        assert_eq!(svg.matches("<tspan").count(), 2);
    }

    #[test]
    fn test_hidden_layers_are_skipped() {
        let mut hidden = text_at(0.0, 0.0, 20.0);
        hidden.visible = false;
        let scene = Scene::from_parts(100.0, 100.0, "#fff".to_string(), None, vec![hidden]);
        assert!(!scene_to_svg(&scene).contains("<text"));
    }

    #[test]
    fn test_xml_escaping() {
        let layer = Layer::text("A < B & C > D", TextStyle::default());
        let scene = Scene::from_parts(100.0, 100.0, "#fff".to_string(), None, vec![layer]);
        assert!(scene_to_svg(&scene).contains("A &lt; B &amp; C &gt; D"));
    }

    #[test]
    fn test_group_members_are_nested() {
        let group = Layer::group(
            vec![text_at(5.0, 5.0, 10.0), text_at(20.0, 5.0, 10.0)],
            60.0,
            20.0,
        )
        .with_position(30.0, 30.0);
        let scene = Scene::from_parts(100.0, 100.0, "#fff".to_string(), None, vec![group]);
        let svg = scene_to_svg(&scene);
        assert_eq!(svg.matches("<g ").count(), 3);
        assert_eq!(svg.matches("<text").count(), 2);
    }

    #[test]
    fn test_font_data_is_carried() {
        let fonts = [
            std::sync::Arc::new(vec![0_u8; 4]),
            std::sync::Arc::new(vec![1_u8; 4]),
        ];
        let exporter = PngExporter::with_defaults().with_font_data(fonts);
        assert!(format!("{exporter:?}").contains("fonts: 2"));
    }

    #[cfg(feature = "export")]
    #[test]
    fn test_unreadable_font_data_does_not_fail_export() {
        let scene = display_scene(vec![text_at(10.0, 10.0, 12.0)]);
        let artifact = PngExporter::new(ExportConfig {
            load_system_fonts: false,
            ..ExportConfig::default()
        })
        .with_font_data([std::sync::Arc::new(b"not a font".to_vec())])
        .export(&scene, Some(&original()))
        .expect("export");
        assert_eq!((artifact.width, artifact.height), (2000, 1000));
    }

    #[cfg(feature = "export")]
    #[test]
    fn test_export_without_image_produces_nothing() {
        let scene = Scene::new(100.0, 100.0);
        let result = PngExporter::with_defaults().export(&scene, None);
        assert!(matches!(result, Err(RenderError::Precondition(_))));
    }
}
