use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Manual override and low-charge thresholds, persisted between cycles.
///
/// Any field missing from the stored record takes its default, so a partial
/// record written by a remote toggle still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceChargeOverride {
    /// Set while a forced or low-solar charge cycle is in progress.
    pub request_time: Option<DateTime<Utc>>,
    /// Charge immediately regardless of solar surplus.
    pub force_charge: bool,
    /// Vehicle charge (%) below which charging starts regardless of surplus.
    pub min_vehicle_charge: f64,
    /// Vehicle charge (%) at which a forced cycle ends.
    pub force_charge_level: f64,
    pub force_charge_amps: u32,
    /// Average spare capacity (W) needed to start a solar-only charge.
    pub min_spare_capacity: f64,
}

impl Default for ForceChargeOverride {
    fn default() -> Self {
        Self {
            request_time: None,
            force_charge: false,
            min_vehicle_charge: 50.0,
            force_charge_level: 70.0,
            force_charge_amps: 5,
            min_spare_capacity: 1250.0,
        }
    }
}

impl ForceChargeOverride {
    pub fn is_forcing_charge(&self, vehicle_charge_pct: f64) -> bool {
        self.request_time.is_some() && vehicle_charge_pct < self.force_charge_level
    }

    /// Apply a remote toggle of the manual flag.
    ///
    /// Enabling stamps `request_time`; disabling clears it.
    pub fn toggle(&mut self, force_charge: bool, now: DateTime<Utc>) {
        self.force_charge = force_charge;
        self.request_time = force_charge.then_some(now);
    }
}
