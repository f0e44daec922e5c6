//! The editing session: one scene, its history and its interaction state.
//!
//! [`Session`] owns the [`SceneStore`], the [`History`], the snap controller
//! and the [`OriginalImageRef`]. Plain store mutations never commit; the
//! session methods that map to a user action (add text, delete, upload,
//! finish a drag, ...) commit exactly once with a descriptive label.
//!
//! History operations take `&mut self` and await the snapshot restore before
//! touching the stacks, so a failed restore rolls back cleanly. Sessions that
//! are driven from several tasks go through a [`SessionHandle`], whose
//! mutex queues callers in FIFO order.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::{self, capture, SceneDocument, Snapshot};
use crate::config::EditorConfig;
use crate::history::{History, HistoryEntry};
use crate::layer::{Layer, LayerId};
use crate::persistence::SnapshotSlot;
use crate::resources::ResourceLoader;
use crate::scene::{Background, OriginalImageRef, Scene, Viewport};
use crate::snap::{SnapController, SnapGuides};
use crate::store::SceneStore;
use crate::{EditorError, EditorResult};

const INITIAL_STATE: &str = "Initial State";
const RESTORE_SESSION: &str = "Restore Session";
const RESET_CANVAS: &str = "Reset Canvas";

/// Arrow-key nudge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeDirection {
    /// Towards smaller y.
    Up,
    /// Towards larger y.
    Down,
    /// Towards smaller x.
    Left,
    /// Towards larger x.
    Right,
}

/// A decoded image ready to become the canvas background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImage {
    /// Image source, usually a PNG data URI.
    pub source: String,
    /// Native width in pixels.
    pub width: u32,
    /// Native height in pixels.
    pub height: u32,
}

/// An editing session.
pub struct Session {
    config: EditorConfig,
    store: SceneStore,
    history: History,
    original: Option<OriginalImageRef>,
    snap: SnapController,
    font_fallbacks: Vec<String>,
    loader: Arc<dyn ResourceLoader>,
    slot: Arc<dyn SnapshotSlot>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("layers", &self.store.layers().len())
            .field("history", &self.history.len())
            .field("original", &self.original)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session, restoring the document held in `slot` if there is one.
    ///
    /// A persisted document becomes the single initial history entry. A
    /// document that cannot be read or restored is logged and discarded, and
    /// the session starts fresh.
    pub async fn open(
        config: EditorConfig,
        loader: Arc<dyn ResourceLoader>,
        slot: Arc<dyn SnapshotSlot>,
    ) -> Self {
        let persisted = match slot.read() {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Failed to read persisted session: {e}");
                None
            }
        };

        let mut restored = None;
        if let Some(json) = persisted {
            let attempt = match SceneDocument::from_json(&json) {
                Ok(document) => {
                    let snapshot = Snapshot::new(RESTORE_SESSION, document);
                    codec::restore(&snapshot, loader.as_ref())
                        .await
                        .map(|r| (snapshot, r))
                }
                Err(e) => Err(e),
            };
            match attempt {
                Ok(pair) => restored = Some(pair),
                Err(e) => tracing::warn!("Discarding corrupt persisted session: {e}"),
            }
        }

        let (snapshot, scene, font_fallbacks) = match restored {
            Some((snapshot, r)) => (snapshot, r.scene, r.font_fallbacks),
            None => {
                let scene = fresh_scene(&config);
                (capture(&scene, INITIAL_STATE), scene, Vec::new())
            }
        };

        tracing::info!(
            "Session opened with {} layers ({:?})",
            scene.layer_count(),
            snapshot.label()
        );
        let mut session = Self {
            history: History::new(snapshot, config.history_limit),
            snap: SnapController::new(config.snap_threshold),
            store: SceneStore::new(scene),
            original: None,
            font_fallbacks,
            config,
            loader,
            slot,
        };
        session.sync_original();
        session
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The live scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        self.store.scene()
    }

    /// The scene store.
    #[must_use]
    pub fn store(&self) -> &SceneStore {
        &self.store
    }

    /// Mutable access to the scene store. Changes made here are not
    /// committed until [`Session::commit`] is called.
    pub fn store_mut(&mut self) -> &mut SceneStore {
        &mut self.store
    }

    /// The history stacks.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Rows for a history panel.
    #[must_use]
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history.entries()
    }

    /// Native size and display scale of the uploaded image.
    #[must_use]
    pub fn original_image(&self) -> Option<OriginalImageRef> {
        self.original
    }

    /// Snap guides currently shown.
    #[must_use]
    pub fn guides(&self) -> SnapGuides {
        self.snap.guides()
    }

    /// Font families that fell back to a default face in the last restore.
    #[must_use]
    pub fn font_fallbacks(&self) -> &[String] {
        &self.font_fallbacks
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Capture the live scene as a new history entry and persist it.
    pub fn commit(&mut self, label: impl Into<String>) {
        let snapshot = capture(self.store.scene(), label);
        self.history.push(snapshot);
        self.persist_current();
    }

    /// Step back one entry. Returns `false` if there was nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns the restore error if the target snapshot cannot be restored;
    /// the history and scene are left unchanged.
    pub async fn undo(&mut self) -> EditorResult<bool> {
        let Some(target) = self.history.undo_target().cloned() else {
            return Ok(false);
        };
        self.restore_into(&target).await?;
        self.history.apply_undo();
        self.persist_current();
        tracing::debug!(
            "Undo to {:?} (past={}, future={})",
            target.label(),
            self.history.past_len(),
            self.history.future_len()
        );
        Ok(true)
    }

    /// Step forward one entry. Returns `false` if there was nothing to redo.
    ///
    /// # Errors
    ///
    /// Returns the restore error if the target snapshot cannot be restored;
    /// the history and scene are left unchanged.
    pub async fn redo(&mut self) -> EditorResult<bool> {
        let Some(target) = self.history.redo_target().cloned() else {
            return Ok(false);
        };
        self.restore_into(&target).await?;
        self.history.apply_redo();
        self.persist_current();
        tracing::debug!(
            "Redo to {:?} (past={}, future={})",
            target.label(),
            self.history.past_len(),
            self.history.future_len()
        );
        Ok(true)
    }

    /// Make the entry at `index` of the combined timeline current with a
    /// single restore. Returns `false` if it already is.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::InvalidOperation`] for an out-of-range index
    /// and the restore error if the target cannot be restored; in both cases
    /// the history and scene are left unchanged.
    pub async fn jump_to(&mut self, index: usize) -> EditorResult<bool> {
        if index == self.history.current_index() {
            return Ok(false);
        }
        let target = self.history.get(index).cloned().ok_or_else(|| {
            EditorError::InvalidOperation(format!(
                "history index {index} out of range (len {})",
                self.history.len()
            ))
        })?;
        self.restore_into(&target).await?;
        self.history.apply_jump(index);
        self.persist_current();
        tracing::debug!("Jumped to history entry {index} ({:?})", target.label());
        Ok(true)
    }

    async fn restore_into(&mut self, snapshot: &Snapshot) -> EditorResult<()> {
        let restored = codec::restore(snapshot, self.loader.as_ref())
            .await
            .map_err(|e| {
                tracing::warn!("Restore of {:?} failed: {e}", snapshot.label());
                e
            })?;
        self.snap.finish();
        self.store.replace(restored.scene);
        self.font_fallbacks = restored.font_fallbacks;
        self.sync_original();
        Ok(())
    }

    fn sync_original(&mut self) {
        self.original = self
            .store
            .scene()
            .background
            .as_ref()
            .and_then(OriginalImageRef::from_background);
    }

    fn persist_current(&self) {
        let json = match self.history.current().to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize snapshot for persistence: {e}");
                return;
            }
        };
        if let Err(e) = self.slot.write(&json) {
            tracing::warn!("Failed to persist snapshot: {e}");
        }
    }

    /// Start a continuous edit (slider drag, held arrow key). Mutations made
    /// through the returned guard are committed once, when it is finished or
    /// dropped, and only if the scene actually changed.
    pub fn begin_edit(&mut self, label: impl Into<String>) -> ContinuousEdit<'_> {
        let before = codec::encode(self.store.scene());
        ContinuousEdit {
            session: self,
            label: label.into(),
            before,
            closed: false,
        }
    }

    // -----------------------------------------------------------------------
    // Canvas lifecycle
    // -----------------------------------------------------------------------

    /// Clear everything back to an empty default canvas.
    ///
    /// Drops the background and [`OriginalImageRef`], empties the persistence
    /// slot and restarts history from a single "Reset Canvas" entry, which is
    /// persisted.
    pub fn reset(&mut self) {
        self.snap.finish();
        self.store.replace(fresh_scene(&self.config));
        self.original = None;
        self.font_fallbacks.clear();
        if let Err(e) = self.slot.clear() {
            tracing::warn!("Failed to clear persisted session: {e}");
        }
        self.history
            .reset(capture(self.store.scene(), RESET_CANVAS));
        self.persist_current();
        tracing::info!("Canvas reset");
    }

    /// Make a decoded image the canvas background, fitted into `viewport`.
    ///
    /// The canvas takes the fitted display size; existing layers stay where
    /// they are. Commits "Upload Image".
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::ResourceLoad`] for an empty image or a source
    /// the loader rejects. The session is left untouched.
    pub async fn upload_image(
        &mut self,
        image: BaseImage,
        viewport: Viewport,
    ) -> EditorResult<OriginalImageRef> {
        if image.width == 0 || image.height == 0 {
            return Err(EditorError::ResourceLoad(format!(
                "image has no pixels ({}x{})",
                image.width, image.height
            )));
        }
        self.loader.load_image(&image.source).await?;

        let original = OriginalImageRef::fit(
            image.width,
            image.height,
            viewport,
            self.config.viewport_padding,
        );
        let (width, height) = original.display_size();
        let background = Background {
            source: image.source,
            width: f64::from(image.width),
            height: f64::from(image.height),
            transform: crate::layer::Transform {
                scale_x: original.scale,
                scale_y: original.scale,
                ..crate::layer::Transform::default()
            },
        };
        self.store.set_canvas(width, height, Some(background));
        self.original = Some(original);
        self.commit("Upload Image");
        tracing::info!(
            "Uploaded {}x{} image, displayed at {width}x{height} (scale {})",
            image.width,
            image.height,
            original.scale
        );
        Ok(original)
    }

    /// Set the canvas fill colour. Commits "Change Background".
    pub fn set_background_color(&mut self, color: impl Into<String>) {
        self.store.set_background_color(color);
        self.commit("Change Background");
    }

    // -----------------------------------------------------------------------
    // Layer actions
    // -----------------------------------------------------------------------

    /// Add a placeholder text layer centred on the canvas and select it.
    /// Commits "Add Text".
    pub fn add_text(&mut self) -> LayerId {
        let mut layer = Layer::text(
            self.config.text_placeholder.clone(),
            self.config.text_style.clone(),
        );
        let (cx, cy) = self.store.scene().center();
        layer.set_center(cx, cy);
        let id = self.store.add_layer(layer);
        // a fresh layer is never locked
        let _ = self.store.select(id);
        self.commit("Add Text");
        id
    }

    /// Replace the content of a text layer and refit its box around its
    /// current centre. Commits "Edit Text".
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] or [`EditorError::InvalidOperation`]
    /// as [`SceneStore::update_text`] does.
    pub fn set_text(&mut self, id: LayerId, content: impl Into<String>) -> EditorResult<()> {
        let content = content.into();
        let (cx, cy) = self
            .store
            .get(id)
            .map(Layer::center)
            .ok_or_else(|| EditorError::not_found(id))?;
        self.store.update_text(id, |text| text.content = content)?;
        self.store.update_layer(id, |layer| layer.set_center(cx, cy))?;
        self.commit("Edit Text");
        Ok(())
    }

    /// Delete every selected layer. Commits "Delete Layer".
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] if nothing is selected.
    pub fn delete_selected(&mut self) -> EditorResult<usize> {
        let selection = self.store.selection().to_vec();
        if selection.is_empty() {
            return Err(EditorError::Precondition("nothing selected".to_string()));
        }
        for id in &selection {
            self.store.remove_layer(*id)?;
        }
        self.commit("Delete Layer");
        Ok(selection.len())
    }

    /// Duplicate the active layer. Commits "Duplicate Layer".
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] unless exactly one layer is
    /// selected.
    pub fn duplicate_selected(&mut self) -> EditorResult<LayerId> {
        let id = self
            .store
            .active_layer()
            .map(|layer| layer.id)
            .ok_or_else(|| EditorError::Precondition("no active layer".to_string()))?;
        let copy = self.store.duplicate(id)?;
        self.commit("Duplicate Layer");
        Ok(copy)
    }

    /// Nudge the selection by the configured step, or the coarse step.
    ///
    /// Does not commit; repeated nudges belong inside [`Session::begin_edit`].
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] if nothing is selected.
    pub fn nudge(&mut self, direction: NudgeDirection, coarse: bool) -> EditorResult<()> {
        let step = if coarse {
            self.config.nudge_step_coarse
        } else {
            self.config.nudge_step
        };
        let (dx, dy) = match direction {
            NudgeDirection::Up => (0.0, -step),
            NudgeDirection::Down => (0.0, step),
            NudgeDirection::Left => (-step, 0.0),
            NudgeDirection::Right => (step, 0.0),
        };
        self.store.nudge(dx, dy)
    }

    /// Group the selection. Commits "Group".
    ///
    /// # Errors
    ///
    /// See [`SceneStore::group_selection`].
    pub fn group_selected(&mut self) -> EditorResult<LayerId> {
        let id = self.store.group_selection()?;
        self.commit("Group");
        Ok(id)
    }

    /// Dissolve a group. Commits "Ungroup".
    ///
    /// # Errors
    ///
    /// See [`SceneStore::ungroup`].
    pub fn ungroup(&mut self, id: LayerId) -> EditorResult<Vec<LayerId>> {
        let members = self.store.ungroup(id)?;
        self.commit("Ungroup");
        Ok(members)
    }

    /// Move a layer one step up. Commits "Reorder Layer" if it moved.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn raise(&mut self, id: LayerId) -> EditorResult<()> {
        self.reorder(id, SceneStore::raise)
    }

    /// Move a layer one step down. Commits "Reorder Layer" if it moved.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn lower(&mut self, id: LayerId) -> EditorResult<()> {
        self.reorder(id, SceneStore::lower)
    }

    /// Move a layer to the top. Commits "Reorder Layer" if it moved.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn to_front(&mut self, id: LayerId) -> EditorResult<()> {
        self.reorder(id, SceneStore::to_front)
    }

    /// Move a layer to the bottom. Commits "Reorder Layer" if it moved.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn to_back(&mut self, id: LayerId) -> EditorResult<()> {
        self.reorder(id, SceneStore::to_back)
    }

    fn reorder(
        &mut self,
        id: LayerId,
        op: fn(&mut SceneStore, LayerId) -> EditorResult<()>,
    ) -> EditorResult<()> {
        let before = self.store.scene().index_of(id);
        op(&mut self.store, id)?;
        if self.store.scene().index_of(id) != before {
            self.commit("Reorder Layer");
        }
        Ok(())
    }

    /// Lock or unlock a layer. Commits "Lock Layer" or "Unlock Layer".
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::NotFound`] if the layer does not exist.
    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> EditorResult<()> {
        self.store.set_locked(id, locked)?;
        self.commit(if locked { "Lock Layer" } else { "Unlock Layer" });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pointer drag
    // -----------------------------------------------------------------------

    /// Start dragging the selection.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] if nothing is selected.
    pub fn begin_drag(&mut self) -> EditorResult<()> {
        self.snap.begin(&self.store)
    }

    /// Move the dragged layers by `(dx, dy)` from where the drag started.
    /// A single dragged layer snaps to the canvas centre.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Precondition`] if no drag is in progress.
    pub fn drag_to(&mut self, dx: f64, dy: f64) -> EditorResult<()> {
        self.snap.update(&mut self.store, dx, dy)
    }

    /// Pointer released: remove both guides and commit one "Move" entry if
    /// the drag changed anything. Returns whether a commit was made.
    pub fn end_drag(&mut self) -> bool {
        let moved = self.snap.finish();
        if moved {
            self.commit("Move");
        }
        moved
    }
}

fn fresh_scene(config: &EditorConfig) -> Scene {
    let mut scene = Scene::new(config.default_width, config.default_height);
    scene.background_color.clone_from(&config.background_color);
    scene
}

/// Scoped continuous edit; see [`Session::begin_edit`].
///
/// Dereferences to the [`SceneStore`] so edits read like plain store calls.
pub struct ContinuousEdit<'a> {
    session: &'a mut Session,
    label: String,
    before: SceneDocument,
    closed: bool,
}

impl ContinuousEdit<'_> {
    /// End the edit now. Returns `true` if a history entry was committed.
    pub fn finish(mut self) -> bool {
        self.close()
    }

    fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        if codec::encode(self.session.store.scene()) == self.before {
            tracing::debug!("Continuous edit {:?} made no change", self.label);
            return false;
        }
        let label = std::mem::take(&mut self.label);
        self.session.commit(label);
        true
    }
}

impl Deref for ContinuousEdit<'_> {
    type Target = SceneStore;

    fn deref(&self) -> &SceneStore {
        &self.session.store
    }
}

impl DerefMut for ContinuousEdit<'_> {
    fn deref_mut(&mut self) -> &mut SceneStore {
        &mut self.session.store
    }
}

impl Drop for ContinuousEdit<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Shared, queue-serialized access to a [`Session`].
///
/// Every operation locks a `tokio` mutex, which hands out access in FIFO
/// order, so a second history operation waits for the first restore to
/// finish.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<tokio::sync::Mutex<Session>>,
}

impl SessionHandle {
    /// Wrap a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(session)),
        }
    }

    /// Wait for exclusive access to the session.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Session> {
        self.inner.lock().await
    }

    /// Queued [`Session::undo`].
    ///
    /// # Errors
    ///
    /// See [`Session::undo`].
    pub async fn undo(&self) -> EditorResult<bool> {
        self.inner.lock().await.undo().await
    }

    /// Queued [`Session::redo`].
    ///
    /// # Errors
    ///
    /// See [`Session::redo`].
    pub async fn redo(&self) -> EditorResult<bool> {
        self.inner.lock().await.redo().await
    }

    /// Queued [`Session::jump_to`].
    ///
    /// # Errors
    ///
    /// See [`Session::jump_to`].
    pub async fn jump_to(&self, index: usize) -> EditorResult<bool> {
        self.inner.lock().await.jump_to(index).await
    }

    /// Queued [`Session::commit`].
    pub async fn commit(&self, label: impl Into<String>) {
        self.inner.lock().await.commit(label);
    }
}
