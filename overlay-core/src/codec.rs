//! Snapshot codec: the portable document form of a scene.
//!
//! The document is versionless JSON with scene-level properties and an
//! `objects` array. Each object is a flat visual-object record (position,
//! scale, angle, style) carrying its stable `id`:
//!
//! ```json
//! {
//!   "width": 500, "height": 250, "background": "#f0f0f0",
//!   "backgroundImage": { "src": "data:image/png;base64,...", ... },
//!   "objects": [
//!     { "type": "i-text", "id": "7d1c...", "left": 100, "top": 50,
//!       "text": "Hello", "fontFamily": "Arial", "fontSize": 24, ... }
//!   ]
//! }
//! ```
//!
//! [`restore`] is asynchronous: it completes only after the background image
//! and every referenced font family have been resolved through a
//! [`ResourceLoader`].

use std::collections::HashSet;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::layer::{GroupLayer, Layer, LayerId, LayerKind, TextLayer, TextStyle, Transform};
use crate::resources::ResourceLoader;
use crate::scene::{Background, Scene};
use crate::{EditorError, EditorResult};

const fn one() -> f64 {
    1.0
}

const fn yes() -> bool {
    true
}

fn default_background() -> String {
    "#f0f0f0".to_string()
}

/// Canonical scene document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    /// Canvas width in display pixels.
    pub width: f64,
    /// Canvas height in display pixels.
    pub height: f64,
    /// Canvas fill colour.
    #[serde(default = "default_background")]
    pub background: String,
    /// Background image, if one was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<BackgroundDocument>,
    /// Layers bottom to top.
    #[serde(default)]
    pub objects: Vec<ObjectDocument>,
}

/// Background image record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundDocument {
    /// Image source URI.
    pub src: String,
    /// Native width.
    pub width: f64,
    /// Native height.
    pub height: f64,
    /// Left edge on the canvas.
    #[serde(default)]
    pub left: f64,
    /// Top edge on the canvas.
    #[serde(default)]
    pub top: f64,
    /// Horizontal fit scale.
    #[serde(default = "one")]
    pub scale_x: f64,
    /// Vertical fit scale.
    #[serde(default = "one")]
    pub scale_y: f64,
}

/// One visual object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDocument {
    /// Stable layer identifier.
    pub id: String,
    /// Left edge in parent coordinates.
    pub left: f64,
    /// Top edge in parent coordinates.
    pub top: f64,
    /// Unscaled width.
    pub width: f64,
    /// Unscaled height.
    pub height: f64,
    /// Horizontal scale.
    #[serde(default = "one")]
    pub scale_x: f64,
    /// Vertical scale.
    #[serde(default = "one")]
    pub scale_y: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub angle: f64,
    /// Opacity in `[0, 1]`.
    #[serde(default = "one")]
    pub opacity: f64,
    /// `false` for locked layers.
    #[serde(default = "yes")]
    pub selectable: bool,
    /// Whether the object is drawn.
    #[serde(default = "yes")]
    pub visible: bool,
    /// Type-specific content.
    #[serde(flatten)]
    pub content: ObjectContent,
}

/// Type-specific part of an object record, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectContent {
    /// Editable text.
    #[serde(rename = "i-text")]
    Text(TextObject),
    /// Group of nested objects.
    #[serde(rename = "group")]
    Group(GroupObject),
}

/// Text record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextObject {
    /// Text content.
    pub text: String,
    /// Flattened typography.
    #[serde(flatten)]
    pub style: TextStyle,
}

/// Group record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupObject {
    /// Members in group-local coordinates, bottom to top.
    pub objects: Vec<ObjectDocument>,
}

impl SceneDocument {
    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> EditorResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Restore`] if the JSON is malformed.
    pub fn from_json(json: &str) -> EditorResult<Self> {
        serde_json::from_str(json).map_err(|e| EditorError::Restore(e.to_string()))
    }
}

/// An immutable, labelled capture of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    label: String,
    document: SceneDocument,
}

impl Snapshot {
    /// Wrap an existing document.
    #[must_use]
    pub fn new(label: impl Into<String>, document: SceneDocument) -> Self {
        Self {
            label: label.into(),
            document,
        }
    }

    /// Human-readable action label, e.g. "Add Text".
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The captured document.
    #[must_use]
    pub fn document(&self) -> &SceneDocument {
        &self.document
    }

    /// Serialize the document (not the label) to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> EditorResult<String> {
        self.document.to_json()
    }
}

/// Capture a scene into a labelled snapshot.
#[must_use]
pub fn capture(scene: &Scene, label: impl Into<String>) -> Snapshot {
    Snapshot::new(label, encode(scene))
}

/// Convert a scene into its document form.
#[must_use]
pub fn encode(scene: &Scene) -> SceneDocument {
    SceneDocument {
        width: scene.width,
        height: scene.height,
        background: scene.background_color.clone(),
        background_image: scene.background.as_ref().map(|bg| BackgroundDocument {
            src: bg.source.clone(),
            width: bg.width,
            height: bg.height,
            left: bg.transform.x,
            top: bg.transform.y,
            scale_x: bg.transform.scale_x,
            scale_y: bg.transform.scale_y,
        }),
        objects: scene.layers().iter().map(encode_layer).collect(),
    }
}

fn encode_layer(layer: &Layer) -> ObjectDocument {
    let content = match &layer.kind {
        LayerKind::Text(text) => ObjectContent::Text(TextObject {
            text: text.content.clone(),
            style: text.style.clone(),
        }),
        LayerKind::Group(group) => ObjectContent::Group(GroupObject {
            objects: group.children.iter().map(encode_layer).collect(),
        }),
    };
    ObjectDocument {
        id: layer.id.to_string(),
        left: layer.transform.x,
        top: layer.transform.y,
        width: layer.width,
        height: layer.height,
        scale_x: layer.transform.scale_x,
        scale_y: layer.transform.scale_y,
        angle: layer.transform.rotation,
        opacity: layer.opacity,
        selectable: !layer.locked,
        visible: layer.visible,
        content,
    }
}

/// Validate a document and build the scene it describes.
///
/// # Errors
///
/// Returns [`EditorError::Restore`] for invalid or duplicate ids,
/// non-finite geometry, out-of-range opacity or non-positive font sizes.
pub fn decode(document: &SceneDocument) -> EditorResult<Scene> {
    check_finite("canvas width", document.width)?;
    check_finite("canvas height", document.height)?;
    if document.width <= 0.0 || document.height <= 0.0 {
        return Err(EditorError::Restore(format!(
            "canvas size must be positive, got {}x{}",
            document.width, document.height
        )));
    }

    let background = match &document.background_image {
        Some(bg) => {
            for (name, value) in [
                ("background width", bg.width),
                ("background height", bg.height),
                ("background left", bg.left),
                ("background top", bg.top),
                ("background scaleX", bg.scale_x),
                ("background scaleY", bg.scale_y),
            ] {
                check_finite(name, value)?;
            }
            Some(Background {
                source: bg.src.clone(),
                width: bg.width,
                height: bg.height,
                transform: Transform {
                    x: bg.left,
                    y: bg.top,
                    scale_x: bg.scale_x,
                    scale_y: bg.scale_y,
                    rotation: 0.0,
                },
            })
        }
        None => None,
    };

    let mut seen = HashSet::new();
    let layers = document
        .objects
        .iter()
        .map(|object| decode_object(object, &mut seen))
        .collect::<EditorResult<Vec<_>>>()?;

    Ok(Scene::from_parts(
        document.width,
        document.height,
        document.background.clone(),
        background,
        layers,
    ))
}

fn decode_object(object: &ObjectDocument, seen: &mut HashSet<LayerId>) -> EditorResult<Layer> {
    let id = LayerId::parse(&object.id)
        .map_err(|e| EditorError::Restore(format!("invalid layer id {:?}: {e}", object.id)))?;
    if !seen.insert(id) {
        return Err(EditorError::Restore(format!("duplicate layer id {id}")));
    }
    for (name, value) in [
        ("left", object.left),
        ("top", object.top),
        ("width", object.width),
        ("height", object.height),
        ("scaleX", object.scale_x),
        ("scaleY", object.scale_y),
        ("angle", object.angle),
    ] {
        check_finite(name, value)?;
    }
    if !(0.0..=1.0).contains(&object.opacity) {
        return Err(EditorError::Restore(format!(
            "opacity {} of layer {id} is outside [0, 1]",
            object.opacity
        )));
    }

    let kind = match &object.content {
        ObjectContent::Text(text) => {
            if !(text.style.font_size.is_finite() && text.style.font_size > 0.0) {
                return Err(EditorError::Restore(format!(
                    "font size {} of layer {id} must be positive",
                    text.style.font_size
                )));
            }
            LayerKind::Text(TextLayer {
                content: text.text.clone(),
                style: text.style.clone(),
            })
        }
        ObjectContent::Group(group) => LayerKind::Group(GroupLayer {
            children: group
                .objects
                .iter()
                .map(|child| decode_object(child, seen))
                .collect::<EditorResult<_>>()?,
        }),
    };

    Ok(Layer {
        id,
        kind,
        transform: Transform {
            x: object.left,
            y: object.top,
            scale_x: object.scale_x,
            scale_y: object.scale_y,
            rotation: object.angle,
        },
        width: object.width,
        height: object.height,
        opacity: object.opacity,
        locked: !object.selectable,
        visible: object.visible,
    })
}

fn check_finite(name: &str, value: f64) -> EditorResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EditorError::Restore(format!("{name} is not finite")))
    }
}

/// A scene rebuilt from a snapshot, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    /// The rebuilt scene.
    pub scene: Scene,
    /// Font families that failed to load and render with a fallback face.
    pub font_fallbacks: Vec<String>,
}

/// Rebuild a scene from a snapshot and wait for its resources.
///
/// Completes only once the background image and all fonts are resolved.
/// Font failures degrade to a fallback face and are reported in
/// [`Restored::font_fallbacks`]; an unloadable background image fails the
/// restore.
///
/// # Errors
///
/// Returns [`EditorError::Restore`] for malformed documents and
/// [`EditorError::ResourceLoad`] if the background image cannot be resolved.
pub async fn restore(snapshot: &Snapshot, loader: &dyn ResourceLoader) -> EditorResult<Restored> {
    let scene = decode(snapshot.document())?;

    if let Some(background) = &scene.background {
        loader.load_image(&background.source).await?;
    }

    let families: Vec<String> = scene.font_families().into_iter().collect();
    let results = join_all(families.iter().map(|family| loader.load_font(family))).await;
    let mut font_fallbacks = Vec::new();
    for (family, result) in families.into_iter().zip(results) {
        if let Err(e) = result {
            tracing::warn!("Font {family:?} unavailable, rendering with fallback: {e}");
            font_fallbacks.push(family);
        }
    }

    tracing::debug!(
        "Restored snapshot {:?} with {} layers",
        snapshot.label(),
        scene.layer_count()
    );
    Ok(Restored {
        scene,
        font_fallbacks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Shadow, TextAlign};
    use crate::resources::InlineResources;

    fn sample_scene() -> Scene {
        let style = TextStyle {
            font_family: "Lobster".to_string(),
            font_size: 32.0,
            text_align: TextAlign::Center,
            shadow: Some(Shadow {
                color: "rgba(0,0,0,0.5)".to_string(),
                blur: 4.0,
                offset_x: 2.0,
                offset_y: 3.0,
            }),
            ..TextStyle::default()
        };
        let title = Layer::text("Title", style).with_position(40.0, 30.0);
        let caption = Layer::text("caption", TextStyle::default()).with_locked(true);
        let group = Layer::group(
            vec![Layer::text("inner", TextStyle::default()).with_position(5.0, 5.0)],
            120.0,
            60.0,
        )
        .with_position(200.0, 100.0);
        Scene::from_parts(
            500.0,
            250.0,
            "#333333".to_string(),
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
            vec![title, caption, group],
        )
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let scene = sample_scene();
        let decoded = decode(&encode(&scene)).expect("decode");
        assert_eq!(decoded, scene);
    }

    #[test]
    fn test_json_roundtrip_preserves_ids() {
        let scene = sample_scene();
        let json = encode(&scene).to_json().expect("json");
        let document = SceneDocument::from_json(&json).expect("parse");
        let decoded = decode(&document).expect("decode");

        let ids: Vec<_> = scene.layers().iter().map(|l| l.id).collect();
        let decoded_ids: Vec<_> = decoded.layers().iter().map(|l| l.id).collect();
        assert_eq!(ids, decoded_ids);
        assert_eq!(decoded, scene);
    }

    #[test]
    fn test_document_shape() {
        let json = encode(&sample_scene()).to_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("value");
        let first = &value["objects"][0];
        assert_eq!(first["type"], "i-text");
        assert_eq!(first["fontFamily"], "Lobster");
        assert_eq!(first["textAlign"], "center");
        assert!(first["id"].is_string());
        assert_eq!(value["objects"][1]["selectable"], false);
        assert_eq!(value["objects"][2]["type"], "group");
    }

    #[test]
    fn test_minimal_fabric_like_object_uses_defaults() {
        let json = r#"{
            "width": 300, "height": 200,
            "objects": [{
                "type": "i-text", "id": "6f1f2c56-8f57-4a43-9d6f-0f9b4f7b2f10",
                "left": 1, "top": 2, "width": 50, "height": 20,
                "text": "hi", "fontSize": 18
            }]
        }"#;
        let scene = decode(&SceneDocument::from_json(json).expect("parse")).expect("decode");
        let layer = &scene.layers()[0];
        assert!((layer.opacity - 1.0).abs() < f64::EPSILON);
        assert!(!layer.locked);
        let text = layer.as_text().expect("text");
        assert_eq!(text.style.font_family, "Arial");
        assert!((text.style.font_size - 18.0).abs() < f64::EPSILON);
        assert_eq!(scene.background_color, "#f0f0f0");
    }

    #[test]
    fn test_decode_rejects_bad_id() {
        let mut document = encode(&sample_scene());
        document.objects[0].id = "nope".to_string();
        assert!(matches!(decode(&document), Err(EditorError::Restore(_))));
    }

    #[test]
    fn test_decode_rejects_duplicate_id() {
        let mut document = encode(&sample_scene());
        document.objects[1].id = document.objects[0].id.clone();
        assert!(matches!(decode(&document), Err(EditorError::Restore(_))));
    }

    #[test]
    fn test_decode_rejects_opacity_out_of_range() {
        let mut document = encode(&sample_scene());
        document.objects[0].opacity = 1.5;
        assert!(matches!(decode(&document), Err(EditorError::Restore(_))));
    }

    #[test]
    fn test_malformed_json_is_restore_error() {
        let result = SceneDocument::from_json("{\"objects\": [");
        assert!(matches!(result, Err(EditorError::Restore(_))));
    }

    #[tokio::test]
    async fn test_restore_with_inline_resources() {
        let scene = sample_scene();
        let restored = restore(&capture(&scene, "Test"), &InlineResources)
            .await
            .expect("restore");
        assert_eq!(restored.scene, scene);
        assert!(restored.font_fallbacks.is_empty());
    }
}
