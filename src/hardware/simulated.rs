//! # Simulated Site
//!
//! A household with rooftop solar, a storage battery and one plugged-in
//! vehicle. Generation follows a half-sine daylight curve between
//! `sunrise_hour` and `sunset_hour` (UTC); household load is a base load plus
//! uniform noise plus whatever the vehicle is drawing.

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tokio::sync::Mutex;

use super::{GatewayError, SiteReading, VehicleGateway, VehicleReading};
use crate::domain::{ChargeState, ChargeStateModel, CommandOutcome, VehicleCommand};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedSiteConfig {
    pub peak_generation_w: f64,
    pub base_load_w: f64,
    pub load_noise_w: f64,
    pub sunrise_hour: f64,
    pub sunset_hour: f64,
    pub vehicle_battery_kwh: f64,
    /// Vehicle stops charging at this level and reports `Complete`.
    pub vehicle_charge_limit_pct: f64,
    pub initial_vehicle_pct: f64,
    pub storage_pct: f64,
    pub charger_voltage_v: f64,
    pub charger_max_amps: u32,
    pub seed: u64,
}

impl Default for SimulatedSiteConfig {
    fn default() -> Self {
        Self {
            peak_generation_w: 6000.0,
            base_load_w: 600.0,
            load_noise_w: 250.0,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
            vehicle_battery_kwh: 75.0,
            vehicle_charge_limit_pct: 90.0,
            initial_vehicle_pct: 55.0,
            storage_pct: 80.0,
            charger_voltage_v: 230.0,
            charger_max_amps: 32,
            seed: 42,
        }
    }
}

#[derive(Debug)]
struct SimState {
    charge_state: ChargeState,
    charge_current_request: u32,
    vehicle_pct: f64,
    port_open: bool,
    last_step: Option<DateTime<Utc>>,
    rng: StdRng,
}

/// Simulated vehicle gateway for development and testing
#[derive(Debug)]
pub struct SimulatedGateway {
    config: SimulatedSiteConfig,
    state: Mutex<SimState>,
}

impl SimulatedGateway {
    pub fn new(config: SimulatedSiteConfig) -> Self {
        let state = SimState {
            charge_state: ChargeState::Stopped,
            charge_current_request: 0,
            vehicle_pct: config.initial_vehicle_pct,
            port_open: false,
            last_step: None,
            rng: StdRng::seed_from_u64(config.seed),
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Generation in W for the given time of day.
    pub fn generation_at(&self, now: DateTime<Utc>) -> f64 {
        let hour = now.hour() as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0;
        let day_len = self.config.sunset_hour - self.config.sunrise_hour;
        if day_len <= 0.0 || hour <= self.config.sunrise_hour || hour >= self.config.sunset_hour {
            return 0.0;
        }
        let phase = (hour - self.config.sunrise_hour) / day_len;
        self.config.peak_generation_w * (PI * phase).sin()
    }

    fn vehicle_draw_w(&self, st: &SimState) -> f64 {
        if st.charge_state == ChargeState::Charging {
            st.charge_current_request as f64 * self.config.charger_voltage_v
        } else {
            0.0
        }
    }

    /// Advance the vehicle's state of charge up to `now`.
    fn step_vehicle(&self, st: &mut SimState, now: DateTime<Utc>) {
        let elapsed_h = st
            .last_step
            .map(|prev| (now - prev).num_milliseconds().max(0) as f64 / 3_600_000.0)
            .unwrap_or(0.0);
        st.last_step = Some(now);

        if st.charge_state != ChargeState::Charging || self.config.vehicle_battery_kwh <= 0.0 {
            return;
        }

        let energy_kwh = self.vehicle_draw_w(st) / 1000.0 * elapsed_h;
        st.vehicle_pct =
            (st.vehicle_pct + energy_kwh / self.config.vehicle_battery_kwh * 100.0).min(100.0);

        if st.vehicle_pct >= self.config.vehicle_charge_limit_pct {
            st.charge_state = ChargeState::Complete;
            st.port_open = false;
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(SimulatedSiteConfig::default())
    }
}

#[async_trait]
impl VehicleGateway for SimulatedGateway {
    async fn connect(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn send_command(&self, command: VehicleCommand) -> Result<CommandOutcome, GatewayError> {
        let mut st = self.state.lock().await;
        let outcome = match command {
            VehicleCommand::StartCharge => match st.charge_state {
                ChargeState::Stopped => {
                    st.charge_state = ChargeState::Charging;
                    st.port_open = false;
                    if st.charge_current_request == 0 {
                        st.charge_current_request = 5;
                    }
                    CommandOutcome::accepted()
                }
                ChargeState::Charging => CommandOutcome::rejected("is_charging"),
                ChargeState::Complete => CommandOutcome::rejected("complete"),
                ChargeState::Disconnected => CommandOutcome::rejected("disconnected"),
            },
            VehicleCommand::StopCharge => {
                if st.charge_state == ChargeState::Charging {
                    st.charge_state = ChargeState::Stopped;
                    CommandOutcome::accepted()
                } else {
                    CommandOutcome::rejected("not_charging")
                }
            }
            VehicleCommand::SetChargingAmps(amps) => {
                st.charge_current_request = amps.min(self.config.charger_max_amps);
                CommandOutcome::accepted()
            }
            VehicleCommand::OpenChargePort => {
                st.port_open = true;
                CommandOutcome::accepted()
            }
        };
        Ok(outcome)
    }

    async fn refresh_vehicle_state(&self, model: &mut ChargeStateModel) -> Result<(), GatewayError> {
        let st = self.state.lock().await;
        VehicleReading {
            charge_state: st.charge_state,
            charge_current_request: st.charge_current_request,
            vehicle_charge_pct: st.vehicle_pct,
            port_open: st.port_open,
        }
        .apply(model);
        Ok(())
    }

    async fn refresh_battery_state(
        &self,
        model: &mut ChargeStateModel,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let mut st = self.state.lock().await;
        self.step_vehicle(&mut st, now);

        let noise = if self.config.load_noise_w > 0.0 {
            st.rng
                .gen_range(-self.config.load_noise_w..=self.config.load_noise_w)
        } else {
            0.0
        };
        let load_w = (self.config.base_load_w + noise).max(0.0) + self.vehicle_draw_w(&st);

        SiteReading {
            load_w,
            generation_w: self.generation_at(now),
            battery_charge_pct: self.config.storage_pct,
        }
        .apply(model, now);
        Ok(())
    }
}
