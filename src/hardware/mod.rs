//! Telemetry and command gateways for the vehicle and the energy site.

pub mod factory;
pub mod http;
pub mod simulated;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use tracing::warn;

use crate::domain::{ChargeState, ChargeStateModel, CommandOutcome, VehicleCommand};

pub use factory::{GatewayFactory, GatewayMode};
pub use http::HttpGateway;
pub use simulated::{SimulatedGateway, SimulatedSiteConfig};

/// Gateway-specific errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not connect to {target} after {attempts} attempt(s): {message}")]
    Connectivity {
        target: &'static str,
        attempts: u32,
        message: String,
    },
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("Unexpected response from {target}: {message}")]
    InvalidResponse {
        target: &'static str,
        message: String,
    },
}

impl GatewayError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, GatewayError::Connectivity { .. })
    }
}

/// Capability interface for the vehicle / energy-site API.
#[async_trait]
pub trait VehicleGateway: Send + Sync {
    /// Establish or refresh authorization. Idempotent.
    async fn connect(&self) -> Result<(), GatewayError>;

    /// `Ok` with `success == false` means the vehicle rejected the command.
    async fn send_command(&self, command: VehicleCommand) -> Result<CommandOutcome, GatewayError>;

    async fn refresh_vehicle_state(&self, model: &mut ChargeStateModel) -> Result<(), GatewayError>;

    /// Also pushes a new spare-capacity sample stamped `now`.
    async fn refresh_battery_state(
        &self,
        model: &mut ChargeStateModel,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError>;
}

/// Vehicle fields read by a refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleReading {
    pub charge_state: ChargeState,
    pub charge_current_request: u32,
    pub vehicle_charge_pct: f64,
    pub port_open: bool,
}

impl VehicleReading {
    pub fn apply(&self, model: &mut ChargeStateModel) {
        model.charge_state = self.charge_state;
        model.charge_current_request = self.charge_current_request;
        model.vehicle_charge_pct = self.vehicle_charge_pct;
        model.port_open = self.port_open;
    }
}

/// Site power flows and storage level read by a refresh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteReading {
    pub load_w: f64,
    pub generation_w: f64,
    pub battery_charge_pct: f64,
}

impl SiteReading {
    pub fn apply(&self, model: &mut ChargeStateModel, now: DateTime<Utc>) {
        model.current_load = self.load_w;
        model.current_generation = self.generation_w;
        model.battery_charge_pct = self.battery_charge_pct;
        model.record_spare_capacity(now);
    }
}

/// Run `op` up to `attempts` times, returning the last error as a connectivity failure.
pub(crate) async fn with_attempts<T, F, Fut>(
    target: &'static str,
    attempts: u32,
    mut op: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let attempts = attempts.max(1);
    let mut last = String::new();
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(GatewayError::Unauthorized(msg)) => return Err(GatewayError::Unauthorized(msg)),
            Err(e) => {
                warn!(target_device = target, attempt, error = %e, "gateway request failed");
                last = e.to_string();
            }
        }
    }
    Err(GatewayError::Connectivity {
        target,
        attempts,
        message: last,
    })
}
