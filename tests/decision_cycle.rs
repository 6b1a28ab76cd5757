//! End-to-end decision cycles against a scripted gateway and a file-backed
//! override store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

use solar_charge_optimizer::controller::{CommandThrottle, DecisionEngine};
use solar_charge_optimizer::domain::{
    ChargeState, ChargeStateModel, CommandOutcome, ForceChargeOverride, VehicleCommand,
};
use solar_charge_optimizer::hardware::{GatewayError, SiteReading, VehicleGateway, VehicleReading};
use solar_charge_optimizer::repo::{JsonOverrideStore, OverrideStore};

/// Reports a fixed vehicle and site reading and accepts every command.
struct ScriptedGateway {
    vehicle: VehicleReading,
    site: SiteReading,
    sent: Mutex<Vec<VehicleCommand>>,
    /// Turns the manual flag on through this store while the next command is in flight.
    remote_toggle: Mutex<Option<Arc<JsonOverrideStore>>>,
}

impl ScriptedGateway {
    fn new(vehicle: VehicleReading, spare_w: f64) -> Self {
        Self {
            vehicle,
            site: SiteReading {
                load_w: (-spare_w).max(0.0),
                generation_w: spare_w.max(0.0),
                battery_charge_pct: 80.0,
            },
            sent: Mutex::new(Vec::new()),
            remote_toggle: Mutex::new(None),
        }
    }

    fn sent(&self) -> Vec<VehicleCommand> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl VehicleGateway for ScriptedGateway {
    async fn connect(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn send_command(&self, command: VehicleCommand) -> Result<CommandOutcome, GatewayError> {
        self.sent.lock().push(command);
        let remote = self.remote_toggle.lock().take();
        if let Some(store) = remote {
            store.toggle_force_charge(true, Utc::now()).unwrap();
        }
        Ok(CommandOutcome::accepted())
    }

    async fn refresh_vehicle_state(&self, model: &mut ChargeStateModel) -> Result<(), GatewayError> {
        self.vehicle.apply(model);
        Ok(())
    }

    async fn refresh_battery_state(
        &self,
        model: &mut ChargeStateModel,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.site.apply(model, now);
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    gateway: Arc<ScriptedGateway>,
    store: Arc<JsonOverrideStore>,
    engine: DecisionEngine,
    model: ChargeStateModel,
}

impl Harness {
    fn new(vehicle: VehicleReading, spare_w: f64, record: Option<ForceChargeOverride>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonOverrideStore::new(dir.path().join("force_charge.json")));
        if let Some(record) = record {
            store.save(&record).unwrap();
        }
        let gateway = Arc::new(ScriptedGateway::new(vehicle, spare_w));
        let engine = DecisionEngine::new(
            gateway.clone(),
            store.clone(),
            CommandThrottle::default(),
        );
        Self {
            _dir: dir,
            gateway,
            store,
            engine,
            model: ChargeStateModel::default(),
        }
    }

    async fn cycle(&mut self, now: DateTime<Utc>) -> Vec<VehicleCommand> {
        let gw = self.gateway.clone();
        gw.refresh_vehicle_state(&mut self.model).await.unwrap();
        gw.refresh_battery_state(&mut self.model, now).await.unwrap();
        self.engine.run_cycle(&mut self.model, now).await.unwrap().dispatched
    }
}

fn vehicle(charge_state: ChargeState, request: u32, pct: f64, port_open: bool) -> VehicleReading {
    VehicleReading {
        charge_state,
        charge_current_request: request,
        vehicle_charge_pct: pct,
        port_open,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn surplus_above_floor_starts_charge() {
    let mut h = Harness::new(vehicle(ChargeState::Stopped, 0, 60.0, false), 1300.0, None);

    assert_eq!(h.cycle(t0()).await, vec![VehicleCommand::StartCharge]);
    assert_eq!(h.store.load().unwrap().request_time, None);
}

#[tokio::test]
async fn deficit_stops_charge_and_releases_port() {
    let mut h = Harness::new(vehicle(ChargeState::Charging, 4, 60.0, false), -200.0, None);
    assert_eq!(h.model.possible_charge_current(), 0);

    let sent = h.cycle(t0()).await;
    assert_eq!(h.model.possible_charge_current(), 3);
    assert_eq!(
        sent,
        vec![VehicleCommand::StopCharge, VehicleCommand::OpenChargePort]
    );
    assert!(!sent
        .iter()
        .any(|c| matches!(c, VehicleCommand::SetChargingAmps(_))));
}

#[tokio::test]
async fn forced_cycle_rides_through_deficit() {
    let record = ForceChargeOverride {
        request_time: Some(t0() - Duration::hours(1)),
        ..Default::default()
    };
    let mut h = Harness::new(
        vehicle(ChargeState::Charging, 4, 40.0, false),
        -200.0,
        Some(record),
    );

    assert_eq!(
        h.cycle(t0()).await,
        vec![VehicleCommand::SetChargingAmps(5)]
    );
    assert!(h.store.load().unwrap().request_time.is_some());
}

#[tokio::test]
async fn completed_charge_only_opens_port() {
    let mut h = Harness::new(vehicle(ChargeState::Complete, 10, 90.0, false), 5000.0, None);
    assert_eq!(h.cycle(t0()).await, vec![VehicleCommand::OpenChargePort]);
}

#[tokio::test]
async fn second_adjustment_within_interval_is_throttled() {
    let mut h = Harness::new(vehicle(ChargeState::Charging, 6, 60.0, false), 1000.0, None);

    assert_eq!(
        h.cycle(t0()).await,
        vec![VehicleCommand::SetChargingAmps(10)]
    );
    assert!(h.cycle(t0() + Duration::seconds(30)).await.is_empty());
    assert_eq!(h.gateway.sent(), vec![VehicleCommand::SetChargingAmps(10)]);

    assert_eq!(
        h.cycle(t0() + Duration::seconds(120)).await,
        vec![VehicleCommand::SetChargingAmps(10)]
    );
}

#[tokio::test]
async fn low_vehicle_start_persists_request_time() {
    let mut h = Harness::new(vehicle(ChargeState::Stopped, 0, 30.0, false), 0.0, None);

    assert_eq!(h.cycle(t0()).await, vec![VehicleCommand::StartCharge]);
    assert_eq!(h.store.load().unwrap().request_time, Some(t0()));
}

#[tokio::test]
async fn toggle_during_command_survives_request_time_stamp() {
    let mut h = Harness::new(vehicle(ChargeState::Stopped, 0, 30.0, false), 0.0, None);
    *h.gateway.remote_toggle.lock() = Some(h.store.clone());

    assert_eq!(h.cycle(t0()).await, vec![VehicleCommand::StartCharge]);

    let stored = h.store.load().unwrap();
    assert!(stored.force_charge);
    assert_eq!(stored.request_time, Some(t0()));
}
