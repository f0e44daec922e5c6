//! Drag tracking and snap-to-centre guides.
//!
//! While exactly one layer is dragged, its centre is compared against the
//! canvas centre on each axis. Within the threshold the layer is pinned to
//! the centre line and a guide is shown for that axis. Guides live here, not
//! in the [`Scene`](crate::Scene), so they can never end up in a snapshot.

use serde::{Deserialize, Serialize};

use crate::layer::{Layer, LayerId};
use crate::store::SceneStore;
use crate::{EditorError, EditorResult};

/// Direction of a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Runs top to bottom at a fixed x.
    Vertical,
    /// Runs left to right at a fixed y.
    Horizontal,
}

/// A transient alignment line across the whole canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideLine {
    /// Direction of the line.
    pub orientation: Orientation,
    /// x for vertical lines, y for horizontal lines.
    pub position: f64,
}

/// Guides currently shown, at most one per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapGuides {
    /// Shown when the layer is centred horizontally.
    pub vertical: Option<GuideLine>,
    /// Shown when the layer is centred vertically.
    pub horizontal: Option<GuideLine>,
}

impl SnapGuides {
    /// Check if no guide is shown.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertical.is_none() && self.horizontal.is_none()
    }
}

/// Snap a layer's centre to the canvas centre, axis by axis.
///
/// An axis snaps when the distance is strictly below `threshold`; otherwise
/// the position on that axis is left alone and its guide is hidden.
pub fn snap_to_center(
    layer: &mut Layer,
    canvas_width: f64,
    canvas_height: f64,
    threshold: f64,
) -> SnapGuides {
    let (target_x, target_y) = (canvas_width / 2.0, canvas_height / 2.0);
    let (cx, cy) = layer.center();
    let mut guides = SnapGuides::default();
    let mut center = (cx, cy);

    if (cx - target_x).abs() < threshold {
        center.0 = target_x;
        guides.vertical = Some(GuideLine {
            orientation: Orientation::Vertical,
            position: target_x,
        });
    }
    if (cy - target_y).abs() < threshold {
        center.1 = target_y;
        guides.horizontal = Some(GuideLine {
            orientation: Orientation::Horizontal,
            position: target_y,
        });
    }
    if center != (cx, cy) {
        layer.set_center(center.0, center.1);
    }
    guides
}

#[derive(Debug, Clone)]
struct DragTarget {
    id: LayerId,
    origin: (f64, f64),
}

/// An interactive drag of the current selection.
#[derive(Debug, Clone)]
struct Drag {
    targets: Vec<DragTarget>,
    moved: bool,
}

/// Tracks one pointer drag and the guides it shows.
#[derive(Debug, Clone)]
pub struct SnapController {
    threshold: f64,
    guides: SnapGuides,
    drag: Option<Drag>,
}

impl SnapController {
    /// Create a controller with the given snap distance in display pixels.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            guides: SnapGuides::default(),
            drag: None,
        }
    }

    /// Guides currently shown.
    #[must_use]
    pub fn guides(&self) -> SnapGuides {
        self.guides
    }

    /// Whether a drag is in progress.
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start dragging the current selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] if nothing is selected.
    pub fn begin(&mut self, store: &SceneStore) -> EditorResult<()> {
        let targets = store
            .selection()
            .iter()
            .filter_map(|&id| store.get(id))
            .map(|layer| DragTarget {
                id: layer.id,
                origin: (layer.transform.x, layer.transform.y),
            })
            .collect::<Vec<_>>();
        if targets.is_empty() {
            return Err(EditorError::Precondition("nothing selected".to_string()));
        }
        tracing::debug!("Drag started with {} layer(s)", targets.len());
        self.drag = Some(Drag {
            targets,
            moved: false,
        });
        Ok(())
    }

    /// Move the dragged layers to their start positions offset by
    /// `(dx, dy)`, snapping when a single layer is dragged.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] if no drag is in progress and
    /// [`EditorError::NotFound`] if a dragged layer disappeared.
    pub fn update(&mut self, store: &mut SceneStore, dx: f64, dy: f64) -> EditorResult<()> {
        let drag = self
            .drag
            .as_mut()
            .ok_or_else(|| EditorError::Precondition("no drag in progress".to_string()))?;
        let single = drag.targets.len() == 1;
        let (width, height) = (store.scene().width, store.scene().height);
        let threshold = self.threshold;
        let mut guides = SnapGuides::default();

        for target in &drag.targets {
            let (x, y) = (target.origin.0 + dx, target.origin.1 + dy);
            store.update_layer(target.id, |layer| {
                layer.transform.x = x;
                layer.transform.y = y;
                if single {
                    guides = snap_to_center(layer, width, height, threshold);
                }
            })?;
        }

        drag.moved = drag.targets.iter().any(|target| {
            store.get(target.id).is_some_and(|layer| {
                (layer.transform.x, layer.transform.y) != target.origin
            })
        });
        if guides != self.guides {
            tracing::debug!(
                "Snap guides: vertical={} horizontal={}",
                guides.vertical.is_some(),
                guides.horizontal.is_some()
            );
        }
        self.guides = guides;
        Ok(())
    }

    /// End the drag and remove all guides.
    ///
    /// Returns `true` if any dragged layer ended up somewhere else than where
    /// it started. Calling this without a drag just clears the guides.
    pub fn finish(&mut self) -> bool {
        self.guides = SnapGuides::default();
        self.drag.take().is_some_and(|drag| drag.moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::TextStyle;
    use crate::scene::Scene;

    fn boxed(x: f64, y: f64) -> Layer {
        Layer::text("t", TextStyle::default())
            .with_size(100.0, 40.0)
            .with_position(x, y)
    }

    #[test]
    fn test_snaps_within_threshold_on_both_axes() {
        // centre (248, 252) on a 500x500 canvas
        let mut layer = boxed(198.0, 232.0);
        let guides = snap_to_center(&mut layer, 500.0, 500.0, 5.0);
        assert_eq!(layer.center(), (250.0, 250.0));
        assert!(guides.vertical.is_some());
        assert!(guides.horizontal.is_some());
    }

    #[test]
    fn test_no_snap_at_threshold() {
        // centre x is exactly 5 away
        let mut layer = boxed(205.0, 100.0);
        let guides = snap_to_center(&mut layer, 500.0, 500.0, 5.0);
        assert_eq!((layer.transform.x, layer.transform.y), (205.0, 100.0));
        assert!(guides.is_empty());
    }

    #[test]
    fn test_single_axis_snap() {
        let mut layer = boxed(201.0, 10.0);
        let guides = snap_to_center(&mut layer, 500.0, 500.0, 5.0);
        assert_eq!(layer.transform.x, 200.0);
        assert_eq!(layer.transform.y, 10.0);
        assert_eq!(
            guides.vertical,
            Some(GuideLine {
                orientation: Orientation::Vertical,
                position: 250.0
            })
        );
        assert!(guides.horizontal.is_none());
    }

    #[test]
    fn test_scaled_layer_uses_scaled_center() {
        let mut layer = boxed(0.0, 0.0);
        layer.transform.scale_x = 2.0;
        layer.transform.x = 52.0; // centre x = 52 + 100 = 152
        let guides = snap_to_center(&mut layer, 300.0, 1000.0, 5.0);
        assert_eq!(layer.transform.x, 50.0);
        assert!(guides.vertical.is_some());
    }

    #[test]
    fn test_drag_requires_selection() {
        let store = SceneStore::new(Scene::new(500.0, 500.0));
        let mut snap = SnapController::new(5.0);
        assert!(matches!(
            snap.begin(&store),
            Err(EditorError::Precondition(_))
        ));
    }

    #[test]
    fn test_multi_select_drag_never_snaps() {
        let mut store = SceneStore::new(Scene::new(500.0, 500.0));
        let a = store.add_layer(boxed(0.0, 0.0));
        let b = store.add_layer(boxed(300.0, 300.0));
        store.select(a).expect("select");
        store.add_to_selection(b).expect("select");

        let mut snap = SnapController::new(5.0);
        snap.begin(&store).expect("begin");
        // would put `a`'s centre at (249, 249)
        snap.update(&mut store, 199.0, 229.0).expect("update");
        assert!(snap.guides().is_empty());
        let moved = store.get(a).expect("a");
        assert_eq!((moved.transform.x, moved.transform.y), (199.0, 229.0));
        assert!(snap.finish());
    }

    #[test]
    fn test_finish_clears_guides_and_reports_no_move() {
        let mut store = SceneStore::new(Scene::new(500.0, 500.0));
        let id = store.add_layer(boxed(200.0, 230.0));
        store.select(id).expect("select");

        let mut snap = SnapController::new(5.0);
        snap.begin(&store).expect("begin");
        snap.update(&mut store, 1.0, 1.0).expect("update");
        assert!(!snap.guides().is_empty());
        // snapped straight back onto the start position
        assert!(!snap.finish());
        assert!(snap.guides().is_empty());
        assert!(!snap.is_dragging());
    }
}
