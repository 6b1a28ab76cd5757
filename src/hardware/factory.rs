use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{HttpGateway, SimulatedGateway, VehicleGateway};
use crate::config::GatewayConfig;

/// Which gateway implementation drives the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GatewayMode {
    /// In-process simulated site for development and testing
    Simulated,
    /// Vehicle / energy-site REST API
    Http,
}

impl Default for GatewayMode {
    fn default() -> Self {
        if cfg!(feature = "sim") {
            GatewayMode::Simulated
        } else {
            GatewayMode::Http
        }
    }
}

/// Factory for creating gateway instances
pub struct GatewayFactory {
    config: GatewayConfig,
}

impl GatewayFactory {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn create(&self) -> Result<Arc<dyn VehicleGateway>> {
        match self.config.mode {
            GatewayMode::Simulated => {
                tracing::info!(seed = self.config.simulation.seed, "using simulated site");
                Ok(Arc::new(SimulatedGateway::new(self.config.simulation.clone())))
            }
            GatewayMode::Http => {
                tracing::info!(base_url = %self.config.base_url, "using HTTP vehicle gateway");
                let gateway = HttpGateway::new(
                    self.config.base_url.clone(),
                    self.config.token.clone(),
                    self.config.vehicle_id.clone(),
                    self.config.site_id.clone(),
                    self.config.request_attempts,
                    Duration::from_secs(self.config.http_timeout_seconds),
                )?;
                Ok(Arc::new(gateway))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(GatewayMode::from_str("http").unwrap(), GatewayMode::Http);
        assert_eq!(GatewayMode::Simulated.to_string(), "simulated");
    }

    #[test]
    fn test_creates_simulated_gateway() {
        let factory = GatewayFactory::new(GatewayConfig {
            mode: GatewayMode::Simulated,
            ..Default::default()
        });
        assert!(factory.create().is_ok());
    }
}
