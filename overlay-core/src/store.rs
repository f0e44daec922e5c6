//! Live scene storage with selection and layer-list notifications.
//!
//! [`SceneStore`] owns the in-memory [`Scene`] of one editing session. Its
//! mutations never touch history: committing is the caller's job, which lets
//! continuous edits (slider drags, repeated nudges) collapse into one entry.
//!
//! Every structural mutation (add, remove, reorder, group, ungroup, replace)
//! bumps a revision published on a [`tokio::sync::watch`] channel so layer
//! lists can refresh.

use tokio::sync::watch;

use crate::layer::{Layer, LayerId, LayerKind, Rect, TextLayer};
use crate::scene::{Background, Scene};
use crate::{EditorError, EditorResult};

/// Offset applied to duplicated layers.
pub const DUPLICATE_OFFSET: f64 = 10.0;

/// In-memory scene plus selection state.
#[derive(Debug)]
pub struct SceneStore {
    scene: Scene,
    selection: Vec<LayerId>,
    revision: watch::Sender<u64>,
}

impl SceneStore {
    /// Create a store around an existing scene.
    #[must_use]
    pub fn new(scene: Scene) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            scene,
            selection: Vec::new(),
            revision,
        }
    }

    /// The live scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Subscribe to layer-list changes. The value is a revision counter.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current layer-list revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn touch(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Replace the whole scene (snapshot restore, reset). Clears selection.
    pub fn replace(&mut self, scene: Scene) {
        self.scene = scene;
        self.selection.clear();
        self.touch();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Layers bottom to top.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        self.scene.layers()
    }

    /// Layers top to bottom.
    pub fn layers_top_to_bottom(&self) -> impl Iterator<Item = &Layer> {
        self.scene.layers_top_to_bottom()
    }

    /// Get a top-level layer by ID.
    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.scene.layer(id)
    }

    /// Currently selected layer IDs, in selection order.
    #[must_use]
    pub fn selection(&self) -> &[LayerId] {
        &self.selection
    }

    /// The single selected layer, if exactly one is selected.
    #[must_use]
    pub fn active_layer(&self) -> Option<&Layer> {
        match self.selection.as_slice() {
            [id] => self.scene.layer(*id),
            _ => None,
        }
    }

    fn require(&self, id: LayerId) -> EditorResult<usize> {
        self.scene
            .index_of(id)
            .ok_or_else(|| EditorError::not_found(id))
    }

    // -----------------------------------------------------------------------
    // Layer mutations
    // -----------------------------------------------------------------------

    /// Add a layer on top of the stack.
    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        tracing::debug!("Adding {} layer {id}", layer.type_name());
        self.scene.layers.push(layer);
        self.touch();
        id
    }

    /// Remove a layer.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn remove_layer(&mut self, id: LayerId) -> EditorResult<Layer> {
        let index = self.require(id)?;
        let layer = self.scene.layers.remove(index);
        self.selection.retain(|&sel| sel != id);
        self.touch();
        Ok(layer)
    }

    /// Update a layer using a closure.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn update_layer<F>(&mut self, id: LayerId, f: F) -> EditorResult<()>
    where
        F: FnOnce(&mut Layer),
    {
        let layer = self
            .scene
            .layer_mut(id)
            .ok_or_else(|| EditorError::not_found(id))?;
        f(layer);
        if layer.locked {
            self.selection.retain(|&sel| sel != id);
        }
        Ok(())
    }

    /// Update the text content or style of a text layer. The layer's box is
    /// re-estimated afterwards, keeping its top-left corner.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist and
    /// [`EditorError::InvalidOperation`] if it is not a text layer.
    pub fn update_text<F>(&mut self, id: LayerId, f: F) -> EditorResult<()>
    where
        F: FnOnce(&mut TextLayer),
    {
        let layer = self
            .scene
            .layer_mut(id)
            .ok_or_else(|| EditorError::not_found(id))?;
        let text = layer.as_text_mut().ok_or_else(|| {
            EditorError::InvalidOperation(format!("layer {id} is not a text layer"))
        })?;
        f(text);
        layer.refit_text_box();
        Ok(())
    }

    /// Lock or unlock a layer. Locking drops it from the selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> EditorResult<()> {
        self.update_layer(id, |layer| layer.locked = locked)
    }

    /// Move a layer so its top-left corner is at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn move_layer(&mut self, id: LayerId, x: f64, y: f64) -> EditorResult<()> {
        self.update_layer(id, |layer| {
            layer.transform.x = x;
            layer.transform.y = y;
        })
    }

    /// Shift every selected layer by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] if nothing is selected.
    pub fn nudge(&mut self, dx: f64, dy: f64) -> EditorResult<()> {
        if self.selection.is_empty() {
            return Err(EditorError::Precondition("nothing selected".to_string()));
        }
        for id in self.selection.clone() {
            self.update_layer(id, |layer| {
                layer.transform.x += dx;
                layer.transform.y += dy;
            })?;
        }
        Ok(())
    }

    /// Copy a layer (with fresh IDs throughout) directly above the original,
    /// offset by [`DUPLICATE_OFFSET`]. The copy becomes the selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn duplicate(&mut self, id: LayerId) -> EditorResult<LayerId> {
        let index = self.require(id)?;
        let mut copy = self.scene.layers[index].clone();
        reassign_ids(&mut copy);
        copy.transform.x += DUPLICATE_OFFSET;
        copy.transform.y += DUPLICATE_OFFSET;
        copy.locked = false;
        let copy_id = copy.id;
        self.scene.layers.insert(index + 1, copy);
        self.selection = vec![copy_id];
        self.touch();
        Ok(copy_id)
    }

    // -----------------------------------------------------------------------
    // Z-order
    // -----------------------------------------------------------------------

    /// Move a layer to the top of the stack.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn to_front(&mut self, id: LayerId) -> EditorResult<()> {
        let index = self.require(id)?;
        let layer = self.scene.layers.remove(index);
        self.scene.layers.push(layer);
        self.touch();
        Ok(())
    }

    /// Move a layer to the bottom of the stack.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn to_back(&mut self, id: LayerId) -> EditorResult<()> {
        let index = self.require(id)?;
        let layer = self.scene.layers.remove(index);
        self.scene.layers.insert(0, layer);
        self.touch();
        Ok(())
    }

    /// Swap a layer with its upper neighbour. No-op for the topmost layer.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn raise(&mut self, id: LayerId) -> EditorResult<()> {
        let index = self.require(id)?;
        if index + 1 < self.scene.layers.len() {
            self.scene.layers.swap(index, index + 1);
            self.touch();
        }
        Ok(())
    }

    /// Swap a layer with its lower neighbour. No-op for the bottom layer.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn lower(&mut self, id: LayerId) -> EditorResult<()> {
        let index = self.require(id)?;
        if index > 0 {
            self.scene.layers.swap(index, index - 1);
            self.touch();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Make a layer the only selected layer.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist and
    /// [`EditorError::Precondition`] if it is locked.
    pub fn select(&mut self, id: LayerId) -> EditorResult<()> {
        self.check_selectable(id)?;
        self.selection = vec![id];
        Ok(())
    }

    /// Add a layer to the current selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist and
    /// [`EditorError::Precondition`] if it is locked.
    pub fn add_to_selection(&mut self, id: LayerId) -> EditorResult<()> {
        self.check_selectable(id)?;
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
        Ok(())
    }

    /// Clear the selection.
    pub fn deselect_all(&mut self) {
        self.selection.clear();
    }

    fn check_selectable(&self, id: LayerId) -> EditorResult<()> {
        let layer = self
            .scene
            .layer(id)
            .ok_or_else(|| EditorError::not_found(id))?;
        if layer.locked {
            return Err(EditorError::Precondition(format!("layer {id} is locked")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Grouping
    // -----------------------------------------------------------------------

    /// Group the selected layers into a new group layer.
    ///
    /// The group is placed at the z-position of its topmost member and
    /// becomes the selection. Members keep their absolute positions.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidOperation`] if fewer than two layers are
    /// selected.
    pub fn group_selection(&mut self) -> EditorResult<LayerId> {
        if self.selection.len() < 2 {
            return Err(EditorError::InvalidOperation(format!(
                "grouping needs at least 2 selected layers, got {}",
                self.selection.len()
            )));
        }

        let mut indices: Vec<usize> = self
            .selection
            .iter()
            .map(|&id| self.require(id))
            .collect::<EditorResult<_>>()?;
        indices.sort_unstable();
        let top_index = indices[indices.len() - 1];

        let bounds = indices
            .iter()
            .map(|&i| self.scene.layers[i].bounds())
            .reduce(|acc, r| acc.union(&r))
            .unwrap_or(Rect {
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 0.0,
            });

        // Remove from the top down so lower indices stay valid.
        let mut members: Vec<Layer> = indices
            .iter()
            .rev()
            .map(|&i| self.scene.layers.remove(i))
            .collect();
        members.reverse();
        for member in &mut members {
            member.transform.x -= bounds.x;
            member.transform.y -= bounds.y;
        }

        let group = Layer::group(members, bounds.width, bounds.height)
            .with_position(bounds.x, bounds.y);
        let group_id = group.id;
        let insert_at = top_index + 1 - indices.len();
        self.scene.layers.insert(insert_at, group);
        self.selection = vec![group_id];
        self.touch();
        tracing::debug!("Grouped {} layers into {group_id}", indices.len());
        Ok(group_id)
    }

    /// Dissolve a group, putting its members back on the canvas at their
    /// absolute positions. The members become the selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist and
    /// [`EditorError::InvalidOperation`] if it is not a group.
    pub fn ungroup(&mut self, id: LayerId) -> EditorResult<Vec<LayerId>> {
        let index = self.require(id)?;
        if !self.scene.layers[index].is_group() {
            return Err(EditorError::InvalidOperation(format!(
                "layer {id} is not a group"
            )));
        }
        let mut group = self.scene.layers.remove(index);
        let children = match &mut group.kind {
            LayerKind::Group(inner) => std::mem::take(&mut inner.children),
            LayerKind::Text(_) => Vec::new(),
        };

        let mut ids = Vec::with_capacity(children.len());
        for (offset, mut member) in children.into_iter().enumerate() {
            let (local_cx, local_cy) = member.center();
            let (cx, cy) = group.local_to_parent(local_cx, local_cy);
            member.transform.scale_x *= group.transform.scale_x;
            member.transform.scale_y *= group.transform.scale_y;
            member.transform.rotation += group.transform.rotation;
            member.set_center(cx, cy);
            member.opacity *= group.opacity;
            ids.push(member.id);
            self.scene.layers.insert(index + offset, member);
        }
        self.selection.clone_from(&ids);
        self.touch();
        tracing::debug!("Ungrouped {id} into {} layers", ids.len());
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Canvas
    // -----------------------------------------------------------------------

    /// Set the canvas size and background image together.
    pub fn set_canvas(&mut self, width: f64, height: f64, background: Option<Background>) {
        self.scene.width = width;
        self.scene.height = height;
        self.scene.background = background;
    }

    /// Set the canvas fill colour.
    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.scene.background_color = color.into();
    }
}

fn reassign_ids(layer: &mut Layer) {
    layer.id = LayerId::new();
    if let LayerKind::Group(group) = &mut layer.kind {
        for child in &mut group.children {
            reassign_ids(child);
        }
    }
}
