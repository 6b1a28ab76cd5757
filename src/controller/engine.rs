//! # Charge Decision Engine
//!
//! Turns the current [`ChargeStateModel`] and the freshly loaded
//! [`ForceChargeOverride`] into vehicle commands, once per cycle.
//!
//! Evaluation order:
//! 1. A completed charge with the port latched closed gets `OpenChargePort`
//!    and nothing else.
//! 2. Enough averaged surplus, a vehicle below its minimum charge, or the
//!    manual flag starts a stopped vehicle. A start without solar surplus
//!    stamps the override's `request_time`.
//! 3. While charging, a deficit that leaves less than the minimum viable
//!    current stops the charge and opens the port, unless a forced cycle is
//!    still below its target level. Otherwise the current is re-throttled to
//!    what the surplus supports.
//!
//! Every command goes through the [`CommandThrottle`]; only the port
//! release that follows a stop bypasses it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::throttle::CommandThrottle;
use crate::domain::{ChargeState, ChargeStateModel, ForceChargeOverride, VehicleCommand};
use crate::hardware::{GatewayError, VehicleGateway};
use crate::logging::{EventLogger, LoggerFanout, Severity};
use crate::repo::{OverrideStore, StoreError};

/// Default minimum viable charge current in amps.
pub const DEFAULT_MIN_CHARGE_AMPS: u32 = 5;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{command} failed: {source}")]
    Command {
        command: VehicleCommand,
        source: GatewayError,
    },
    #[error("override record unusable, skipping decision: {0}")]
    Override(#[source] StoreError),
}

/// What happened to one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Suppressed,
    Rejected,
    Accepted,
}

/// Commands sent and dropped during one cycle, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub dispatched: Vec<VehicleCommand>,
    pub suppressed: Vec<VehicleCommand>,
}

pub struct DecisionEngine {
    gateway: Arc<dyn VehicleGateway>,
    store: Arc<dyn OverrideStore>,
    throttle: CommandThrottle,
    loggers: LoggerFanout,
    min_charge_amps: u32,
}

impl DecisionEngine {
    pub fn new(
        gateway: Arc<dyn VehicleGateway>,
        store: Arc<dyn OverrideStore>,
        throttle: CommandThrottle,
    ) -> Self {
        Self {
            gateway,
            store,
            throttle,
            loggers: LoggerFanout::new(),
            min_charge_amps: DEFAULT_MIN_CHARGE_AMPS,
        }
    }

    pub fn with_min_charge_amps(mut self, amps: u32) -> Self {
        self.min_charge_amps = amps;
        self
    }

    pub fn attach_logger(&mut self, logger: Arc<dyn EventLogger>) {
        self.loggers.attach(logger);
    }

    pub fn log(&self, message: &str, severity: Severity) {
        self.loggers.log(message, severity);
    }

    pub fn throttle(&self) -> &CommandThrottle {
        &self.throttle
    }

    /// Run one decision pass against `model`.
    ///
    /// A gateway failure while sending ends the pass early; the throttle has
    /// already been advanced for the failed attempt.
    pub async fn run_cycle(
        &mut self,
        model: &mut ChargeStateModel,
        now: DateTime<Utc>,
    ) -> Result<CycleReport, EngineError> {
        let mut ovr = self.load_override()?;
        let mut report = CycleReport::default();

        if model.charge_state == ChargeState::Complete && !model.port_open {
            self.dispatch(VehicleCommand::OpenChargePort, false, model, now, &mut report)
                .await?;
            return Ok(report);
        }

        let solar_surplus = model.avg_spare_capacity() > ovr.min_spare_capacity;
        let below_min_charge = model.vehicle_charge_pct < ovr.min_vehicle_charge;
        if (solar_surplus || below_min_charge || ovr.force_charge)
            && model.charge_state == ChargeState::Stopped
        {
            let sent = self
                .dispatch(VehicleCommand::StartCharge, false, model, now, &mut report)
                .await?;
            if sent == Dispatch::Accepted && !solar_surplus {
                info!(
                    vehicle_charge_pct = model.vehicle_charge_pct,
                    target_pct = ovr.force_charge_level,
                    "forced charge cycle started"
                );
                ovr.request_time = Some(now);
                self.persist_request_time(Some(now));
            }
        }

        if model.charge_state == ChargeState::Charging {
            if self.should_stop(model, &ovr) {
                self.stop_charging(model, &mut ovr, now, &mut report).await?;
                return Ok(report);
            }

            if model.is_charge_change() {
                let new_amps = if model.vehicle_charge_pct < ovr.min_vehicle_charge {
                    ovr.force_charge_amps
                } else {
                    model.possible_charge_current()
                };
                if new_amps > 0 {
                    self.dispatch(
                        VehicleCommand::SetChargingAmps(new_amps),
                        false,
                        model,
                        now,
                        &mut report,
                    )
                    .await?;
                }
            }
        }

        Ok(report)
    }

    fn should_stop(&self, model: &ChargeStateModel, ovr: &ForceChargeOverride) -> bool {
        model.avg_spare_capacity() < 0.0
            && model.possible_charge_current() < self.min_charge_amps
            && !ovr.is_forcing_charge(model.vehicle_charge_pct)
    }

    async fn stop_charging(
        &mut self,
        model: &mut ChargeStateModel,
        ovr: &mut ForceChargeOverride,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<(), EngineError> {
        let stopped = self
            .dispatch(VehicleCommand::StopCharge, false, model, now, report)
            .await?;
        if stopped != Dispatch::Accepted {
            return Ok(());
        }

        // The stop itself advanced the throttle.
        self.dispatch(VehicleCommand::OpenChargePort, true, model, now, report)
            .await?;

        if ovr.request_time.take().is_some() {
            info!("forced charge cycle finished");
            self.persist_request_time(None);
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        command: VehicleCommand,
        force: bool,
        model: &mut ChargeStateModel,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> Result<Dispatch, EngineError> {
        if !self.throttle.allow(now, force) {
            debug!(
                command = command.wire_name(),
                secs_since_last = ?self.throttle.secs_since_last_command(now),
                "command suppressed by throttle"
            );
            report.suppressed.push(command);
            return Ok(Dispatch::Suppressed);
        }

        let result = self.gateway.send_command(command).await;
        self.throttle.record(now);
        report.dispatched.push(command);

        let outcome = result.map_err(|source| EngineError::Command { command, source })?;
        if !outcome.success {
            self.log(
                &format!("{command} rejected: {}", outcome.message),
                Severity::Error,
            );
            return Ok(Dispatch::Rejected);
        }

        self.log(&command.to_string(), Severity::Success);
        if let Err(e) = self.gateway.refresh_vehicle_state(model).await {
            self.log(
                &format!("Vehicle refresh after {} failed: {e}", command.wire_name()),
                Severity::Error,
            );
        }
        Ok(Dispatch::Accepted)
    }

    /// Missing record means defaults; an unreadable file means defaults for
    /// this cycle; a corrupt record skips the cycle.
    fn load_override(&self) -> Result<ForceChargeOverride, EngineError> {
        match self.store.load() {
            Ok(record) => Ok(record),
            Err(e @ StoreError::Corrupt { .. }) => Err(EngineError::Override(e)),
            Err(e) => {
                self.log(
                    &format!("Could not read override record, using defaults this cycle: {e}"),
                    Severity::Error,
                );
                Ok(ForceChargeOverride::default())
            }
        }
    }

    /// Only `request_time` is written; the rest of the stored record may have
    /// changed since the cycle loaded it.
    fn persist_request_time(&self, request_time: Option<DateTime<Utc>>) {
        if let Err(e) = self.store.set_request_time(request_time) {
            self.log(
                &format!("Could not save override record: {e}"),
                Severity::Error,
            );
        }
    }
}
