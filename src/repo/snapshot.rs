use std::path::{Path, PathBuf};

use super::{read_optional, write_atomic, StoreError};
use crate::domain::ChargeSnapshot;

pub const DEFAULT_SNAPSHOT_PATH: &str = "./data/current_state.json";

/// Writes the per-cycle state snapshot consumed by the status API.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, snapshot: &ChargeSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &json)
    }

    /// Latest snapshot, or `None` before the first cycle has written one.
    pub fn read(&self) -> Result<Option<ChargeSnapshot>, StoreError> {
        read_optional(&self.path)?
            .map(|contents| {
                serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    path: self.path.clone(),
                    source,
                })
            })
            .transpose()
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_PATH)
    }
}
