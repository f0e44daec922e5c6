//! Editor configuration.

use serde::{Deserialize, Serialize};

use crate::layer::TextStyle;

/// Default number of snapshots kept in the undo window.
pub const MAX_HISTORY_STEPS: usize = 20;

/// Default snap distance in display pixels.
pub const SNAP_THRESHOLD: f64 = 5.0;

/// Default persistence key for the latest snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "adomate-canvas-state";

/// Configuration for an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of snapshots kept in `past`.
    pub history_limit: usize,
    /// Snap-to-centre distance in display pixels.
    pub snap_threshold: f64,
    /// Padding kept free on every side when fitting an upload to the viewport.
    pub viewport_padding: f64,
    /// Canvas width before any image is uploaded.
    pub default_width: f64,
    /// Canvas height before any image is uploaded.
    pub default_height: f64,
    /// Canvas background colour as hex.
    pub background_color: String,
    /// Key of the persistence slot.
    pub storage_key: String,
    /// Nudge distance for a plain arrow key.
    pub nudge_step: f64,
    /// Nudge distance with the coarse modifier held.
    pub nudge_step_coarse: f64,
    /// Style applied to newly added text layers.
    pub text_style: TextStyle,
    /// Content of newly added text layers.
    pub text_placeholder: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: MAX_HISTORY_STEPS,
            snap_threshold: SNAP_THRESHOLD,
            viewport_padding: 20.0,
            default_width: 500.0,
            default_height: 500.0,
            background_color: "#f0f0f0".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            nudge_step: 1.0,
            nudge_step_coarse: 10.0,
            text_style: TextStyle::default(),
            text_placeholder: "Type Something...".to_string(),
        }
    }
}

impl EditorConfig {
    /// Parse a configuration from JSON, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> crate::EditorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
