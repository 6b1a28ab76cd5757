pub mod engine;
pub mod throttle;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::ChargeStateModel;
use crate::hardware::{GatewayFactory, VehicleGateway};
use crate::logging::{CsvDataLogger, EventLogger, FileLogger, Severity, TracingLogger};
use crate::repo::{JsonOverrideStore, OverrideStore, SnapshotWriter};

pub use engine::{CycleReport, DecisionEngine, Dispatch, EngineError};
pub use throttle::CommandThrottle;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<ChargeController>,
    pub overrides: Arc<dyn OverrideStore>,
    pub snapshots: SnapshotWriter,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let gateway = GatewayFactory::new(cfg.gateway.clone()).create()?;
        gateway
            .connect()
            .await
            .context("vehicle gateway authorization failed")?;

        let overrides: Arc<dyn OverrideStore> =
            Arc::new(JsonOverrideStore::new(cfg.storage.override_path.clone()));
        Ok(Self::with_parts(cfg, gateway, overrides))
    }

    /// Wire the controller from an already connected gateway and store.
    pub fn with_parts(
        cfg: Config,
        gateway: Arc<dyn VehicleGateway>,
        overrides: Arc<dyn OverrideStore>,
    ) -> Self {
        let snapshots = SnapshotWriter::new(cfg.storage.snapshot_path.clone());

        let mut engine = DecisionEngine::new(
            gateway.clone(),
            overrides.clone(),
            CommandThrottle::from_secs(cfg.controller.command_interval_seconds),
        )
        .with_min_charge_amps(cfg.charging.min_charge_amps);
        engine.attach_logger(Arc::new(TracingLogger));
        if let Some(path) = &cfg.logging.log_file {
            let logger: Arc<dyn EventLogger> =
                Arc::new(FileLogger::new(path.clone(), cfg.logging.error_file.clone()));
            engine.attach_logger(logger);
        }

        let controller = Arc::new(ChargeController {
            gateway,
            engine: Mutex::new(engine),
            model: RwLock::new(ChargeStateModel::new(cfg.charging.params())),
            snapshots: snapshots.clone(),
            data_logger: cfg.logging.data_file.clone().map(CsvDataLogger::new),
        });

        Self {
            cfg,
            controller,
            overrides,
            snapshots,
        }
    }
}

pub fn spawn_controller_tasks(state: AppState, cfg: Config) -> JoinHandle<()> {
    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.run(cfg.controller.tick_seconds).await;
        warn!("controller loop stopped");
    })
}

/// Periodic refresh / decide / record loop around the [`DecisionEngine`].
pub struct ChargeController {
    gateway: Arc<dyn VehicleGateway>,
    engine: Mutex<DecisionEngine>,
    model: RwLock<ChargeStateModel>,
    snapshots: SnapshotWriter,
    data_logger: Option<CsvDataLogger>,
}

impl ChargeController {
    pub async fn run(&self, tick_seconds: u64) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(tick_seconds.max(1)));
        loop {
            interval.tick().await;
            self.tick(Utc::now()).await;
        }
    }

    /// One full cycle. Failures are logged and never end the loop.
    pub async fn tick(&self, now: DateTime<Utc>) -> Option<CycleReport> {
        let mut engine = self.engine.lock().await;
        let mut model = self.model.write().await;

        if let Err(e) = self.gateway.refresh_vehicle_state(&mut model).await {
            engine.log(&format!("Vehicle refresh failed: {e}"), Severity::Error);
        }
        if let Err(e) = self.gateway.refresh_battery_state(&mut model, now).await {
            engine.log(&format!("Site refresh failed: {e}"), Severity::Error);
        }

        if let Err(e) = self.snapshots.write(&model.snapshot(now)) {
            engine.log(&format!("Could not write state snapshot: {e}"), Severity::Error);
        }

        info!(
            charge_state = %model.charge_state,
            avg_spare_w = model.avg_spare_capacity(),
            possible_amps = model.possible_charge_current(),
            "{}",
            *model
        );

        let report = match engine.run_cycle(&mut model, now).await {
            Ok(report) => Some(report),
            Err(e) => {
                engine.log(&format!("Decision cycle aborted: {e}"), Severity::Error);
                None
            }
        };

        if let Some(data_logger) = &self.data_logger {
            if let Err(e) = data_logger.log(&model.data_row(now)) {
                warn!(error = %e, path = %data_logger.path().display(), "data log write failed");
            }
        }

        report
    }

    pub async fn get_current_state(&self) -> ChargeStateModel {
        self.model.read().await.clone()
    }
}
