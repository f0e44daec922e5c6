//! Layers - the addressable visual objects stacked over the background.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a layer.
///
/// Assigned at creation and preserved across snapshot round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Create a new unique layer ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a layer ID from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID.
    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Horizontal alignment of text lines inside the text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    /// Flush left.
    #[default]
    Left,
    /// Centred.
    Center,
    /// Flush right.
    Right,
}

/// Slant of the text face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    /// Upright.
    #[default]
    Normal,
    /// Italic.
    Italic,
}

/// Drop shadow behind text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    /// Shadow colour (CSS colour string).
    pub color: String,
    /// Blur radius in pixels.
    pub blur: f64,
    /// Horizontal offset in pixels.
    pub offset_x: f64,
    /// Vertical offset in pixels.
    pub offset_y: f64,
}

/// Outline drawn around glyphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Stroke colour (CSS colour string).
    pub color: String,
    /// Stroke width in pixels.
    pub width: f64,
}

/// Typographic properties of a text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextStyle {
    /// Font family name.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f64,
    /// Numeric font weight (400 regular, 700 bold).
    pub font_weight: u16,
    /// Upright or italic.
    pub font_style: FontStyle,
    /// Fill colour as hex.
    pub fill: String,
    /// Line alignment.
    pub text_align: TextAlign,
    /// Line height as a multiple of the font size.
    pub line_height: f64,
    /// Extra spacing between characters in pixels.
    pub letter_spacing: f64,
    /// Optional drop shadow; `None` means disabled.
    pub shadow: Option<Shadow>,
    /// Optional glyph outline; `None` means disabled.
    pub stroke: Option<Stroke>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 40.0,
            font_weight: 400,
            font_style: FontStyle::Normal,
            fill: "#000000".to_string(),
            text_align: TextAlign::Left,
            line_height: 1.16,
            letter_spacing: 0.0,
            shadow: None,
            stroke: None,
        }
    }
}

/// Text content plus its style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayer {
    /// The text itself; `\n` separates lines.
    pub content: String,
    /// Typography.
    pub style: TextStyle,
}

/// An ordered set of member layers positioned relative to the group origin.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupLayer {
    /// Members, bottom to top.
    pub children: Vec<Layer>,
}

/// The content of a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// A block of text.
    Text(TextLayer),
    /// A group of other layers.
    Group(GroupLayer),
}

/// Placement of a layer.
///
/// `(x, y)` is the top-left corner of the unrotated, scaled box. Rotation is
/// in degrees, clockwise, about the box centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Left edge in parent coordinates.
    pub x: f64,
    /// Top edge in parent coordinates.
    pub y: f64,
    /// Horizontal scale factor.
    pub scale_x: f64,
    /// Vertical scale factor.
    pub scale_y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
        }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Smallest rectangle containing both.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Rect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

/// A layer with content, placement and interaction flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Stable identifier.
    pub id: LayerId,
    /// Layer content.
    pub kind: LayerKind,
    /// Position, scale and rotation.
    pub transform: Transform,
    /// Unscaled box width.
    pub width: f64,
    /// Unscaled box height.
    pub height: f64,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Locked layers cannot be selected or dragged.
    pub locked: bool,
    /// Whether the layer is drawn.
    pub visible: bool,
}

/// Average glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f64 = 0.6;

impl Layer {
    /// Create a text layer with a box sized from the content.
    ///
    /// The box is an estimate; the rendering side replaces it with measured
    /// metrics through [`Layer::with_size`].
    #[must_use]
    pub fn text(content: impl Into<String>, style: TextStyle) -> Self {
        let content = content.into();
        let (width, height) = estimate_text_box(&content, &style);
        Self::from_kind(
            LayerKind::Text(TextLayer { content, style }),
            width,
            height,
        )
    }

    /// Create a group layer from members already expressed in group-local
    /// coordinates.
    #[must_use]
    pub fn group(children: Vec<Layer>, width: f64, height: f64) -> Self {
        Self::from_kind(LayerKind::Group(GroupLayer { children }), width, height)
    }

    fn from_kind(kind: LayerKind, width: f64, height: f64) -> Self {
        Self {
            id: LayerId::new(),
            kind,
            transform: Transform::default(),
            width,
            height,
            opacity: 1.0,
            locked: false,
            visible: true,
        }
    }

    /// Set the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set the top-left position.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.transform.x = x;
        self.transform.y = y;
        self
    }

    /// Set the unscaled box size.
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the locked flag.
    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Re-estimate the box of a text layer after its content or style
    /// changed. Groups are left alone.
    pub fn refit_text_box(&mut self) {
        if let LayerKind::Text(text) = &self.kind {
            let (width, height) = estimate_text_box(&text.content, &text.style);
            self.width = width;
            self.height = height;
        }
    }

    /// Text content, if this is a text layer.
    #[must_use]
    pub fn as_text(&self) -> Option<&TextLayer> {
        match &self.kind {
            LayerKind::Text(text) => Some(text),
            LayerKind::Group(_) => None,
        }
    }

    /// Mutable text content, if this is a text layer.
    pub fn as_text_mut(&mut self) -> Option<&mut TextLayer> {
        match &mut self.kind {
            LayerKind::Text(text) => Some(text),
            LayerKind::Group(_) => None,
        }
    }

    /// Whether this is a group layer.
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, LayerKind::Group(_))
    }

    /// Short type name used in logs and layer lists.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            LayerKind::Text(_) => "text",
            LayerKind::Group(_) => "group",
        }
    }

    /// Width after scaling.
    #[must_use]
    pub fn scaled_width(&self) -> f64 {
        self.width * self.transform.scale_x
    }

    /// Height after scaling.
    #[must_use]
    pub fn scaled_height(&self) -> f64 {
        self.height * self.transform.scale_y
    }

    /// Centre point in parent coordinates.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            self.transform.x + self.scaled_width() / 2.0,
            self.transform.y + self.scaled_height() / 2.0,
        )
    }

    /// Move the layer so its centre lands on `(cx, cy)`.
    pub fn set_center(&mut self, cx: f64, cy: f64) {
        self.transform.x = cx - self.scaled_width() / 2.0;
        self.transform.y = cy - self.scaled_height() / 2.0;
    }

    /// Axis-aligned bounds of the rotated box in parent coordinates.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let (cx, cy) = self.center();
        let half_w = self.scaled_width() / 2.0;
        let half_h = self.scaled_height() / 2.0;
        let corners = [
            (-half_w, -half_h),
            (half_w, -half_h),
            (half_w, half_h),
            (-half_w, half_h),
        ];
        let (min_x, min_y, max_x, max_y) = corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(dx, dy)| {
                let (rx, ry) = rotate(dx, dy, self.transform.rotation);
                (
                    min_x.min(cx + rx),
                    min_y.min(cy + ry),
                    max_x.max(cx + rx),
                    max_y.max(cy + ry),
                )
            },
        );
        Rect {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    /// Map a point from this layer's local space into parent coordinates.
    #[must_use]
    pub fn local_to_parent(&self, px: f64, py: f64) -> (f64, f64) {
        let t = &self.transform;
        let (cx, cy) = self.center();
        let sx = t.x + px * t.scale_x;
        let sy = t.y + py * t.scale_y;
        let (rx, ry) = rotate(sx - cx, sy - cy, t.rotation);
        (cx + rx, cy + ry)
    }

    /// Collect every font family used by this layer and its members.
    pub fn collect_font_families(&self, out: &mut BTreeSet<String>) {
        match &self.kind {
            LayerKind::Text(text) => {
                out.insert(text.style.font_family.clone());
            }
            LayerKind::Group(group) => {
                for child in &group.children {
                    child.collect_font_families(out);
                }
            }
        }
    }

    /// Visit this layer and all nested members, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Layer)) {
        visit(self);
        if let LayerKind::Group(group) = &self.kind {
            for child in &group.children {
                child.walk(visit);
            }
        }
    }

    /// Convert display-space geometry to native resolution.
    ///
    /// `ratio` is display size over native size. Positions are divided by
    /// it. Text layers get their size-dependent metrics (font size, box,
    /// stroke width, shadow) divided as well, keeping their own scale factors;
    /// groups get their scale factors divided so members follow along.
    pub fn rescale_to_native(&mut self, ratio: f64) {
        self.transform.x /= ratio;
        self.transform.y /= ratio;
        match &mut self.kind {
            LayerKind::Text(text) => {
                self.width /= ratio;
                self.height /= ratio;
                let style = &mut text.style;
                style.font_size /= ratio;
                style.letter_spacing /= ratio;
                if let Some(stroke) = style.stroke.as_mut() {
                    stroke.width /= ratio;
                }
                if let Some(shadow) = style.shadow.as_mut() {
                    shadow.blur /= ratio;
                    shadow.offset_x /= ratio;
                    shadow.offset_y /= ratio;
                }
            }
            LayerKind::Group(_) => {
                self.transform.scale_x /= ratio;
                self.transform.scale_y /= ratio;
            }
        }
    }
}

/// Rotate a vector clockwise (screen coordinates) by `degrees`.
pub(crate) fn rotate(dx: f64, dy: f64, degrees: f64) -> (f64, f64) {
    if degrees == 0.0 {
        return (dx, dy);
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    (dx * cos - dy * sin, dx * sin + dy * cos)
}

#[allow(clippy::cast_precision_loss)]
fn estimate_text_box(content: &str, style: &TextStyle) -> (f64, f64) {
    let lines: Vec<&str> = content.split('\n').collect();
    let longest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    let advance = style.font_size * GLYPH_ADVANCE + style.letter_spacing;
    let width = (longest as f64 * advance).max(style.font_size);
    let height = lines.len() as f64 * style.font_size * style.line_height;
    (width, height)
}
