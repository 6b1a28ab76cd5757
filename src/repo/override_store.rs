use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{read_optional, write_atomic, StoreError};
use crate::domain::ForceChargeOverride;

/// Default path for the override record.
pub const DEFAULT_OVERRIDE_PATH: &str = "./data/force_charge.json";

/// Read-through store for the force-charge override.
///
/// The record may be rewritten by another actor between cycles, so callers
/// load it fresh every time instead of caching it. Partial changes go through
/// [`set_request_time`](OverrideStore::set_request_time) and
/// [`toggle_force_charge`](OverrideStore::toggle_force_charge), which reload
/// the stored record and touch only their own fields.
#[cfg_attr(test, mockall::automock)]
pub trait OverrideStore: Send + Sync {
    /// Returns the default record if none has been stored yet.
    fn load(&self) -> Result<ForceChargeOverride, StoreError>;
    fn save(&self, record: &ForceChargeOverride) -> Result<(), StoreError>;

    /// Stamp or clear `request_time`, leaving every other field as stored.
    fn set_request_time(
        &self,
        request_time: Option<DateTime<Utc>>,
    ) -> Result<ForceChargeOverride, StoreError>;

    /// Apply a remote toggle of the manual flag to the stored record.
    fn toggle_force_charge(
        &self,
        force_charge: bool,
        now: DateTime<Utc>,
    ) -> Result<ForceChargeOverride, StoreError>;
}

#[derive(Debug)]
pub struct JsonOverrideStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonOverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<ForceChargeOverride, StoreError> {
        let Some(contents) = read_optional(&self.path)? else {
            debug!(path = %self.path.display(), "no override record, using defaults");
            return Ok(ForceChargeOverride::default());
        };

        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, record: &ForceChargeOverride) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&self.path, json.as_bytes())?;
        info!(
            path = %self.path.display(),
            force_charge = record.force_charge,
            forcing = record.request_time.is_some(),
            "saved override record"
        );
        Ok(())
    }

    fn modify(
        &self,
        change: impl FnOnce(&mut ForceChargeOverride),
    ) -> Result<ForceChargeOverride, StoreError> {
        let _guard = self.write_lock.lock();
        let mut record = self.read()?;
        change(&mut record);
        self.write(&record)?;
        Ok(record)
    }
}

impl Default for JsonOverrideStore {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDE_PATH)
    }
}

impl OverrideStore for JsonOverrideStore {
    fn load(&self) -> Result<ForceChargeOverride, StoreError> {
        self.read()
    }

    fn save(&self, record: &ForceChargeOverride) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        self.write(record)
    }

    fn set_request_time(
        &self,
        request_time: Option<DateTime<Utc>>,
    ) -> Result<ForceChargeOverride, StoreError> {
        self.modify(|record| record.request_time = request_time)
    }

    fn toggle_force_charge(
        &self,
        force_charge: bool,
        now: DateTime<Utc>,
    ) -> Result<ForceChargeOverride, StoreError> {
        self.modify(|record| record.toggle(force_charge, now))
    }
}
