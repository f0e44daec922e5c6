//! Persistence slot for the latest snapshot document.
//!
//! One named key-value entry holds the serialized document of the newest
//! history state. Writes are last-writer-wins; there is no locking or merging
//! across sessions.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::EditorResult;

/// A single named slot holding a serialized snapshot document.
pub trait SnapshotSlot: Send + Sync {
    /// Read the stored document, `None` if the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn read(&self) -> EditorResult<Option<String>>;

    /// Overwrite the slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn write(&self, document: &str) -> EditorResult<()>;

    /// Empty the slot. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be modified.
    fn clear(&self) -> EditorResult<()>;
}

/// In-memory slot, for tests and sessions that should not outlive the process.
#[derive(Debug, Default)]
pub struct MemorySlot {
    value: RwLock<Option<String>>,
}

impl MemorySlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot that already holds a document.
    #[must_use]
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(document.into())),
        }
    }
}

impl SnapshotSlot for MemorySlot {
    fn read(&self) -> EditorResult<Option<String>> {
        let value = self
            .value
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(value.clone())
    }

    fn write(&self, document: &str) -> EditorResult<()> {
        let mut value = self
            .value
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *value = Some(document.to_string());
        Ok(())
    }

    fn clear(&self) -> EditorResult<()> {
        let mut value = self
            .value
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *value = None;
        Ok(())
    }
}

/// Slot backed by `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    /// Create a slot for `key` inside `dir`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> EditorResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(format!("{}.json", sanitize_key(key))),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSlot for FileSlot {
    fn read(&self) -> EditorResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, document: &str) -> EditorResult<()> {
        std::fs::write(&self.path, document)?;
        Ok(())
    }

    fn clear(&self) -> EditorResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Replace any character that is not alphanumeric, `-` or `_` with `_`.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
