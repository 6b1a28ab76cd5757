use anyhow::Result;
use config::Config;
use solar_charge_optimizer::{api, config, controller, telemetry};
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    init_tracing(cfg.logging.json);

    let app_state = controller::AppState::new(cfg.clone()).await?;

    info!(
        gateway = %cfg.gateway.mode,
        tick_seconds = cfg.controller.tick_seconds,
        command_interval_seconds = cfg.controller.command_interval_seconds,
        "starting Solar Charge Optimizer"
    );

    let controller_task = controller::spawn_controller_tasks(app_state.clone(), cfg.clone());

    if cfg.server.enabled {
        let addr = cfg.server.socket_addr()?;
        if cfg.server.host == "0.0.0.0" {
            warn!("status API binding to 0.0.0.0 - it will be reachable from the network");
        }
        info!(%addr, "serving status API");

        let app = api::router(app_state, &cfg);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(telemetry::shutdown_signal())
            .await?;
    } else {
        telemetry::shutdown_signal().await;
    }

    controller_task.abort();
    warn!("shutdown complete");
    Ok(())
}
