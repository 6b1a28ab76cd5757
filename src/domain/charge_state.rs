use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::history::{SpareCapacityHistory, SpareCapacitySample, DEFAULT_HISTORY_CAPACITY};

/// Charging state as reported by the vehicle.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ChargeState {
    #[default]
    Disconnected,
    Stopped,
    Charging,
    Complete,
}

/// Conversion constants from spare power to charge current.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargingParams {
    /// Amps added to the request per kW of average spare capacity.
    pub amps_per_kw: f64,
    /// Hardware limit of the charger.
    pub max_amps: u32,
    pub history_count: usize,
}

impl Default for ChargingParams {
    fn default() -> Self {
        Self {
            amps_per_kw: 5.0,
            max_amps: 10,
            history_count: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Live telemetry for the site and vehicle plus the derived charging metrics.
///
/// Telemetry fields are written by the gateway refresh calls; every derived
/// metric is recomputed on demand from the current fields and the history.
#[derive(Debug, Clone)]
pub struct ChargeStateModel {
    /// Household consumption in W.
    pub current_load: f64,
    /// Solar generation in W.
    pub current_generation: f64,
    pub charge_state: ChargeState,
    /// Amps currently requested by the vehicle.
    pub charge_current_request: u32,
    pub vehicle_charge_pct: f64,
    /// Storage battery state of charge.
    pub battery_charge_pct: f64,
    pub port_open: bool,
    pub updated_at: Option<DateTime<Utc>>,
    params: ChargingParams,
    history: SpareCapacityHistory,
}

impl ChargeStateModel {
    pub fn new(params: ChargingParams) -> Self {
        Self {
            current_load: 0.0,
            current_generation: 0.0,
            charge_state: ChargeState::Disconnected,
            charge_current_request: 0,
            vehicle_charge_pct: 0.0,
            battery_charge_pct: 0.0,
            port_open: false,
            updated_at: None,
            params,
            history: SpareCapacityHistory::with_capacity(params.history_count),
        }
    }

    pub fn history(&self) -> &SpareCapacityHistory {
        &self.history
    }

    /// Instantaneous generation minus load; negative while drawing from the grid.
    pub fn spare_capacity(&self) -> f64 {
        self.current_generation - self.current_load
    }

    pub fn avg_spare_capacity(&self) -> f64 {
        self.history.average()
    }

    /// Current the vehicle could draw from the averaged surplus alone.
    ///
    /// Clamped to `0..=max_amps`; a deficit large enough to push the result
    /// below zero yields 0 A.
    pub fn possible_charge_current(&self) -> u32 {
        let delta = (self.avg_spare_capacity() / 1000.0 * self.params.amps_per_kw).floor();
        let amps = self.charge_current_request as f64 + delta;
        amps.clamp(0.0, self.params.max_amps as f64) as u32
    }

    pub fn is_charge_change(&self) -> bool {
        self.possible_charge_current() != self.charge_current_request
    }

    /// Push the current spare capacity into the moving-average window.
    pub fn record_spare_capacity(&mut self, timestamp: DateTime<Utc>) {
        let value = self.spare_capacity();
        self.history.record(timestamp, value);
        self.updated_at = Some(timestamp);
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ChargeSnapshot {
        ChargeSnapshot {
            last_updated: now,
            charge_state: self.charge_state,
            current_load: self.current_load,
            current_generation: self.current_generation,
            spare_capacity: self.spare_capacity(),
            avg_spare_capacity: self.avg_spare_capacity(),
            possible_charge_current: self.possible_charge_current(),
            charge_current_request: self.charge_current_request,
            vehicle_charge: self.vehicle_charge_pct,
            battery_charge: self.battery_charge_pct,
            port_open: self.port_open,
            spare_capacity_history: self.history.iter().copied().collect(),
        }
    }

    pub fn data_row(&self, now: DateTime<Utc>) -> DataRow {
        DataRow {
            timestamp: now.format(TIME_FORMAT).to_string(),
            charge_state: self.charge_state,
            current_load: self.current_load,
            current_generation: self.current_generation,
            spare_capacity: self.spare_capacity(),
            charge_current_request: self.charge_current_request,
            vehicle_charge: self.vehicle_charge_pct,
            battery_charge: self.battery_charge_pct,
        }
    }
}

impl Default for ChargeStateModel {
    fn default() -> Self {
        Self::new(ChargingParams::default())
    }
}

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl fmt::Display for ChargeStateModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = self
            .updated_at
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<19} | {:<20} | {:<16} | {:<15} | {:<20} | {:<25} | {:<20} | {:<14} | {:<16} |",
            when,
            format!("State: {}", self.charge_state),
            format!("Load: {:.2} kW", self.current_load / 1000.0),
            format!("Gen: {:.2} kW", self.current_generation / 1000.0),
            format!("Spare Cap.: {:.2} kW", self.spare_capacity() / 1000.0),
            format!("Avg. Spare Cap.: {:.2} kW", self.avg_spare_capacity() / 1000.0),
            format!("Charge Rate: {} Amps", self.charge_current_request),
            format!("Vehicle: {:.0}%", self.vehicle_charge_pct),
            format!("Storage: {:.0}%", self.battery_charge_pct),
        )
    }
}

/// Serialized view of the model written to the snapshot file every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeSnapshot {
    pub last_updated: DateTime<Utc>,
    pub charge_state: ChargeState,
    pub current_load: f64,
    pub current_generation: f64,
    pub spare_capacity: f64,
    pub avg_spare_capacity: f64,
    pub possible_charge_current: u32,
    pub charge_current_request: u32,
    pub vehicle_charge: f64,
    pub battery_charge: f64,
    pub port_open: bool,
    pub spare_capacity_history: Vec<SpareCapacitySample>,
}

/// One line of the CSV data log.
#[derive(Debug, Clone, Serialize)]
pub struct DataRow {
    pub timestamp: String,
    pub charge_state: ChargeState,
    pub current_load: f64,
    pub current_generation: f64,
    pub spare_capacity: f64,
    pub charge_current_request: u32,
    pub vehicle_charge: f64,
    pub battery_charge: f64,
}
