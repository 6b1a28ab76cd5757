use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::{with_attempts, GatewayError, SiteReading, VehicleGateway, VehicleReading};
use crate::domain::{ChargeState, ChargeStateModel, CommandOutcome, VehicleCommand};

const VEHICLE: &str = "car";
const SITE: &str = "battery";

/// REST client for a vehicle / energy-site owner API.
///
/// Authentication is a pre-issued bearer token; there is no login flow.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    token: String,
    vehicle_id: String,
    site_id: String,
    request_attempts: u32,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        vehicle_id: impl Into<String>,
        site_id: impl Into<String>,
        request_attempts: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("solar-charge-optimizer/", env!("CARGO_PKG_VERSION"))),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            vehicle_id: vehicle_id.into(),
            site_id: site_id.into(),
            request_attempts,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        target: &'static str,
        path: &str,
    ) -> Result<T, GatewayError> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport(target, e))?;
        decode(target, resp).await
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        target: &'static str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, GatewayError> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(target, e))?;
        decode(target, resp).await
    }

    async fn wake_up(&self) -> Result<(), GatewayError> {
        let path = format!("/api/1/vehicles/{}/wake_up", self.vehicle_id);
        let _: serde_json::Value = self.post_json(VEHICLE, &path, &serde_json::json!({})).await?;
        Ok(())
    }

    async fn fetch_vehicle(&self) -> Result<VehicleReading, GatewayError> {
        self.connect().await?;
        self.wake_up().await?;
        let path = format!("/api/1/vehicles/{}/vehicle_data", self.vehicle_id);
        let data: Envelope<VehicleData> = self.get_json(VEHICLE, &path).await?;
        let cs = data.response.charge_state;

        let charge_state = ChargeState::from_str(&cs.charging_state).unwrap_or_else(|_| {
            warn!(state = %cs.charging_state, "unrecognised charging state, treating as disconnected");
            ChargeState::Disconnected
        });
        Ok(VehicleReading {
            charge_state,
            charge_current_request: cs.charge_current_request,
            vehicle_charge_pct: cs.battery_level,
            port_open: cs.charge_port_door_open,
        })
    }

    async fn fetch_site(&self) -> Result<SiteReading, GatewayError> {
        self.connect().await?;
        let path = format!("/api/1/energy_sites/{}/live_status", self.site_id);
        let data: Envelope<LiveStatus> = self.get_json(SITE, &path).await?;
        let live = data.response;

        let battery_charge_pct = if live.total_pack_energy > 0.0 {
            live.energy_left / live.total_pack_energy * 100.0
        } else {
            0.0
        };
        Ok(SiteReading {
            load_w: live.load_power,
            generation_w: live.solar_power,
            battery_charge_pct,
        })
    }
}

#[async_trait]
impl VehicleGateway for HttpGateway {
    async fn connect(&self) -> Result<(), GatewayError> {
        if self.token.trim().is_empty() {
            return Err(GatewayError::Unauthorized(
                "no API token configured (set SCO__GATEWAY__TOKEN)".to_string(),
            ));
        }
        Ok(())
    }

    async fn send_command(&self, command: VehicleCommand) -> Result<CommandOutcome, GatewayError> {
        self.connect().await?;
        self.wake_up().await?;

        let path = format!(
            "/api/1/vehicles/{}/command/{}",
            self.vehicle_id,
            command.wire_name().to_ascii_lowercase()
        );
        debug!(command = command.wire_name(), "sending vehicle command");
        match self
            .post_json::<Envelope<CommandResult>>(VEHICLE, &path, &command.params())
            .await
        {
            Ok(env) if env.response.result => Ok(CommandOutcome::accepted()),
            Ok(env) => Ok(CommandOutcome::rejected(env.response.reason)),
            Err(GatewayError::InvalidResponse { message, .. }) => {
                Ok(CommandOutcome::rejected(message))
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_vehicle_state(&self, model: &mut ChargeStateModel) -> Result<(), GatewayError> {
        let reading = with_attempts(VEHICLE, self.request_attempts, || self.fetch_vehicle()).await?;
        reading.apply(model);
        Ok(())
    }

    async fn refresh_battery_state(
        &self,
        model: &mut ChargeStateModel,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let reading = with_attempts(SITE, self.request_attempts, || self.fetch_site()).await?;
        reading.apply(model, now);
        Ok(())
    }
}

fn transport(target: &'static str, e: reqwest::Error) -> GatewayError {
    GatewayError::Connectivity {
        target,
        attempts: 1,
        message: e.to_string(),
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(
    target: &'static str,
    resp: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(GatewayError::Unauthorized(format!("{target} API returned 401")));
    }
    let body = resp.text().await.map_err(|e| transport(target, e))?;
    if !status.is_success() {
        return Err(GatewayError::InvalidResponse {
            target,
            message: format!("HTTP {status}: {body}"),
        });
    }
    serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse {
        target,
        message: format!("JSON parse failed: {e}"),
    })
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct VehicleData {
    charge_state: RawChargeState,
}

#[derive(Debug, Deserialize)]
struct RawChargeState {
    charging_state: String,
    charge_current_request: u32,
    battery_level: f64,
    charge_port_door_open: bool,
}

#[derive(Debug, Deserialize)]
struct LiveStatus {
    load_power: f64,
    solar_power: f64,
    energy_left: f64,
    total_pack_energy: f64,
}

#[derive(Debug, Deserialize)]
struct CommandResult {
    result: bool,
    #[serde(default)]
    reason: String,
}
