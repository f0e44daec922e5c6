//! # Overlay Core
//!
//! Editing-session core for composing text over an uploaded image.
//! No rendering and no network: those live behind the [`ResourceLoader`]
//! seam and in `overlay-renderer`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   Session                   │
//! ├─────────────────────────────────────────────┤
//! │  Scene Store     │  History                 │
//! │  - Layers        │  - past / future stacks  │
//! │  - Selection     │  - 20-entry window       │
//! │  - Grouping      │  - rollback on failure   │
//! ├─────────────────────────────────────────────┤
//! │  Snapshot Codec  │  Snap Controller         │
//! │  - JSON document │  - centre guides         │
//! │  - async restore │  - drag tracking         │
//! ├─────────────────────────────────────────────┤
//! │  Persistence slot (memory / file)           │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod layer;
pub mod persistence;
pub mod resources;
pub mod scene;
pub mod session;
pub mod snap;
pub mod store;

pub use codec::{capture, decode, encode, restore, Restored, SceneDocument, Snapshot};
pub use config::{EditorConfig, DEFAULT_STORAGE_KEY, MAX_HISTORY_STEPS, SNAP_THRESHOLD};
pub use error::{EditorError, EditorResult};
pub use history::{History, HistoryEntry};
pub use layer::{
    FontStyle, GroupLayer, Layer, LayerId, LayerKind, Rect, Shadow, Stroke, TextAlign, TextLayer,
    TextStyle, Transform,
};
pub use persistence::{FileSlot, MemorySlot, SnapshotSlot};
pub use resources::{InlineResources, ResourceLoader};
pub use scene::{Background, OriginalImageRef, Scene, Viewport};
pub use session::{BaseImage, ContinuousEdit, NudgeDirection, Session, SessionHandle};
pub use snap::{snap_to_center, GuideLine, Orientation, SnapController, SnapGuides};
pub use store::SceneStore;

/// Overlay core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
