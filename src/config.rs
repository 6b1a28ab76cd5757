use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::domain::ChargingParams;
use crate::hardware::{GatewayMode, SimulatedSiteConfig};
use crate::repo::{override_store::DEFAULT_OVERRIDE_PATH, snapshot::DEFAULT_SNAPSHOT_PATH};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "SCO__";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    pub charging: ChargingConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 5000,
            request_timeout_secs: 10,
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Sleep between cycles.
    pub tick_seconds: u64,
    /// Minimum time between two vehicle commands.
    pub command_interval_seconds: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 10,
            command_interval_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ChargingConfig {
    #[validate(range(min = 0.1, max = 100.0))]
    pub amps_per_kw: f64,
    #[validate(range(min = 1, max = 80))]
    pub max_amps: u32,
    /// Lowest current worth charging at; below this a deficit stops the charge.
    #[validate(range(min = 1, max = 80))]
    pub min_charge_amps: u32,
    #[validate(range(min = 1, max = 10000))]
    pub history_count: usize,
}

impl Default for ChargingConfig {
    fn default() -> Self {
        let params = ChargingParams::default();
        Self {
            amps_per_kw: params.amps_per_kw,
            max_amps: params.max_amps,
            min_charge_amps: 5,
            history_count: params.history_count,
        }
    }
}

impl ChargingConfig {
    pub fn params(&self) -> ChargingParams {
        ChargingParams {
            amps_per_kw: self.amps_per_kw,
            max_amps: self.max_amps,
            history_count: self.history_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub override_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            override_path: PathBuf::from(DEFAULT_OVERRIDE_PATH),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    pub base_url: String,
    pub token: String,
    pub vehicle_id: String,
    pub site_id: String,
    pub request_attempts: u32,
    pub http_timeout_seconds: u64,
    pub simulation: SimulatedSiteConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::default(),
            base_url: "https://owner-api.example.invalid".to_string(),
            token: String::new(),
            vehicle_id: "0".to_string(),
            site_id: "0".to_string(),
            request_attempts: 2,
            http_timeout_seconds: 10,
            simulation: SimulatedSiteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit console logs as JSON lines.
    pub json: bool,
    pub log_file: Option<PathBuf>,
    /// ERROR messages go here instead of `log_file` when set.
    pub error_file: Option<PathBuf>,
    /// CSV telemetry log, one row per cycle.
    pub data_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            log_file: Some(PathBuf::from("./data/log.txt")),
            error_file: Some(PathBuf::from("./data/errors.txt")),
            data_file: Some(PathBuf::from(crate::logging::data::DEFAULT_DATA_LOG_PATH)),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Layer the TOML file (if present) under `SCO__`-prefixed environment variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let cfg: Config = figment.extract().context("invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.charging
            .validate()
            .context("invalid [charging] configuration")?;
        anyhow::ensure!(
            self.charging.min_charge_amps <= self.charging.max_amps,
            "charging.min_charge_amps ({}) exceeds charging.max_amps ({})",
            self.charging.min_charge_amps,
            self.charging.max_amps
        );
        anyhow::ensure!(
            self.controller.tick_seconds > 0,
            "controller.tick_seconds must be positive"
        );
        Ok(())
    }
}
