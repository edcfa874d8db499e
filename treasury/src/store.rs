//! Treasury snapshots on disk
//!
//! The whole aggregate is written as pretty JSON. Loading re-checks the
//! accounting invariants so a hand-edited or truncated file is refused rather
//! than governed.

use std::path::{Path, PathBuf};

use crate::error::{Result, TreasuryError};
use crate::treasury::Treasury;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store `treasury.json` inside `data_dir`
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join("treasury.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the snapshot, or `None` if none has been written yet
    pub fn load(&self) -> Result<Option<Treasury>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            TreasuryError::StorageError(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let treasury: Treasury = serde_json::from_str(&data)
            .map_err(|e| TreasuryError::SerializationError(e.to_string()))?;
        treasury.verify_invariants()?;

        log::debug!("Loaded treasury {} from {}", treasury.wallet_id(), self.path.display());
        Ok(Some(treasury))
    }

    /// Write the snapshot, replacing any previous one
    pub fn save(&self, treasury: &Treasury) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TreasuryError::StorageError(e.to_string()))?;
            }
        }

        let json = serde_json::to_string_pretty(treasury)
            .map_err(|e| TreasuryError::SerializationError(e.to_string()))?;

        // replace atomically
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| {
            TreasuryError::StorageError(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            TreasuryError::StorageError(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        log::debug!("Saved treasury {} to {}", treasury.wallet_id(), self.path.display());
        Ok(())
    }
}
