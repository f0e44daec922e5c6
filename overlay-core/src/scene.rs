//! The editable document: canvas size, background image and layer stack.

use std::collections::BTreeSet;

use crate::layer::{Layer, LayerId, Transform};

/// The uploaded image drawn behind all layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    /// Image source, normally a `data:image/png;base64,...` URI.
    pub source: String,
    /// Native pixel width of the image.
    pub width: f64,
    /// Native pixel height of the image.
    pub height: f64,
    /// Placement on the canvas; the scale fits the image to the canvas.
    pub transform: Transform,
}

/// Native size of the uploaded image and the scale used to fit it on screen.
///
/// Held outside the undoable scene. Without it, export is impossible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginalImageRef {
    /// Native width in pixels.
    pub width: u32,
    /// Native height in pixels.
    pub height: u32,
    /// Display size over native size.
    pub scale: f64,
}

/// Display viewport an upload is fitted into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Container width in display pixels.
    pub width: f64,
    /// Container height in display pixels.
    pub height: f64,
}

impl OriginalImageRef {
    /// Fit an image of the given native size into a viewport, keeping
    /// `padding` pixels free on every side with a uniform scale.
    #[must_use]
    pub fn fit(width: u32, height: u32, viewport: Viewport, padding: f64) -> Self {
        let avail_w = (viewport.width - 2.0 * padding).max(1.0);
        let avail_h = (viewport.height - 2.0 * padding).max(1.0);
        let scale = (avail_w / f64::from(width.max(1))).min(avail_h / f64::from(height.max(1)));
        Self {
            width,
            height,
            scale,
        }
    }

    /// Recover the record from a background placed by an upload, e.g. after
    /// restoring a persisted session. `None` for degenerate backgrounds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_background(background: &Background) -> Option<Self> {
        let scale = background.transform.scale_x;
        if background.width < 1.0 || background.height < 1.0 || scale.is_nan() || scale <= 0.0 {
            return None;
        }
        Some(Self {
            width: background.width.round() as u32,
            height: background.height.round() as u32,
            scale,
        })
    }

    /// Canvas size the image occupies on screen.
    #[must_use]
    pub fn display_size(&self) -> (f64, f64) {
        (
            f64::from(self.width) * self.scale,
            f64::from(self.height) * self.scale,
        )
    }
}

/// A scene: everything that is captured into a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Canvas width in display pixels.
    pub width: f64,
    /// Canvas height in display pixels.
    pub height: f64,
    /// Canvas fill behind the background image.
    pub background_color: String,
    /// Optional background image.
    pub background: Option<Background>,
    /// Layers bottom to top; the last one is drawn on top.
    pub(crate) layers: Vec<Layer>,
}

impl Scene {
    /// Create a new empty scene of the given canvas size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            background_color: "#f0f0f0".to_string(),
            background: None,
            layers: Vec::new(),
        }
    }

    /// Create a scene from parts, e.g. when decoding a snapshot.
    #[must_use]
    pub fn from_parts(
        width: f64,
        height: f64,
        background_color: String,
        background: Option<Background>,
        layers: Vec<Layer>,
    ) -> Self {
        Self {
            width,
            height,
            background_color,
            background,
            layers,
        }
    }

    /// Layers bottom to top.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layers top to bottom (sidebar order).
    pub fn layers_top_to_bottom(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().rev()
    }

    /// Get a top-level layer by ID.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Get a mutable top-level layer by ID.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id == id)
    }

    /// Z-position of a top-level layer (0 = bottom).
    #[must_use]
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id == id)
    }

    /// Find a layer anywhere in the tree, including group members.
    #[must_use]
    pub fn find(&self, id: LayerId) -> Option<&Layer> {
        let mut found = None;
        for layer in &self.layers {
            layer.walk(&mut |l| {
                if found.is_none() && l.id == id {
                    found = Some(l);
                }
            });
        }
        found
    }

    /// Number of top-level layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Check if the scene has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Geometric centre of the canvas.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Every font family referenced by text anywhere in the scene.
    #[must_use]
    pub fn font_families(&self) -> BTreeSet<String> {
        let mut families = BTreeSet::new();
        for layer in &self.layers {
            layer.collect_font_families(&mut families);
        }
        families
    }
}
