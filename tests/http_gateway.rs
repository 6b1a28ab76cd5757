//! HTTP gateway against a mock owner API.

use chrono::{TimeZone, Utc};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use solar_charge_optimizer::domain::{ChargeState, ChargeStateModel, VehicleCommand};
use solar_charge_optimizer::hardware::{GatewayError, HttpGateway, VehicleGateway};

const TOKEN: &str = "test-token";

fn gateway(server: &MockServer) -> HttpGateway {
    HttpGateway::new(server.uri(), TOKEN, "42", "7", 2, Duration::from_secs(5)).unwrap()
}

async fn mount_wake_up(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/1/vehicles/42/wake_up"))
        .and(bearer_token(TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "state": "online" }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn refresh_vehicle_reads_charge_state() {
    let server = MockServer::start().await;
    mount_wake_up(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/1/vehicles/42/vehicle_data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "charge_state": {
                    "charging_state": "Charging",
                    "charge_current_request": 8,
                    "battery_level": 64,
                    "charge_port_door_open": true,
                    "charge_limit_soc": 90
                }
            }
        })))
        .mount(&server)
        .await;

    let mut model = ChargeStateModel::default();
    gateway(&server).refresh_vehicle_state(&mut model).await.unwrap();

    assert_eq!(model.charge_state, ChargeState::Charging);
    assert_eq!(model.charge_current_request, 8);
    assert_eq!(model.vehicle_charge_pct, 64.0);
    assert!(model.port_open);
}

#[tokio::test]
async fn unknown_charging_state_maps_to_disconnected() {
    let server = MockServer::start().await;
    mount_wake_up(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/1/vehicles/42/vehicle_data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "charge_state": {
                    "charging_state": "NoPower",
                    "charge_current_request": 0,
                    "battery_level": 50,
                    "charge_port_door_open": false
                }
            }
        })))
        .mount(&server)
        .await;

    let mut model = ChargeStateModel::default();
    model.charge_state = ChargeState::Stopped;
    gateway(&server).refresh_vehicle_state(&mut model).await.unwrap();
    assert_eq!(model.charge_state, ChargeState::Disconnected);
}

#[tokio::test]
async fn refresh_battery_records_spare_capacity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/energy_sites/7/live_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "load_power": 900.0,
                "solar_power": 3100.0,
                "energy_left": 6750.0,
                "total_pack_energy": 13500.0
            }
        })))
        .mount(&server)
        .await;

    let now = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
    let mut model = ChargeStateModel::default();
    gateway(&server)
        .refresh_battery_state(&mut model, now)
        .await
        .unwrap();

    assert_eq!(model.spare_capacity(), 2200.0);
    assert_eq!(model.avg_spare_capacity(), 2200.0);
    assert_eq!(model.battery_charge_pct, 50.0);
    assert_eq!(model.updated_at, Some(now));
}

#[tokio::test]
async fn set_charging_amps_posts_params() {
    let server = MockServer::start().await;
    mount_wake_up(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/1/vehicles/42/command/charging_amps"))
        .and(body_json(json!({ "charging_amps": 8 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "result": true, "reason": "" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = gateway(&server)
        .send_command(VehicleCommand::SetChargingAmps(8))
        .await
        .unwrap();
    assert!(outcome.success);
}

#[tokio::test]
async fn vehicle_rejection_is_not_an_error() {
    let server = MockServer::start().await;
    mount_wake_up(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/1/vehicles/42/command/start_charge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "result": false, "reason": "is_charging" }
        })))
        .mount(&server)
        .await;

    let outcome = gateway(&server)
        .send_command(VehicleCommand::StartCharge)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "is_charging");
}

#[tokio::test]
async fn refresh_gives_up_after_configured_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/energy_sites/7/live_status"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let mut model = ChargeStateModel::default();
    let now = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
    let err = gateway(&server)
        .refresh_battery_state(&mut model, now)
        .await
        .unwrap_err();

    assert!(err.is_connectivity());
    assert!(model.history().is_empty());
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1/energy_sites/7/live_status"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let mut model = ChargeStateModel::default();
    let err = gateway(&server)
        .refresh_battery_state(&mut model, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unauthorized(_)));
}

#[tokio::test]
async fn empty_token_fails_connect() {
    let server = MockServer::start().await;
    let gw = HttpGateway::new(server.uri(), "", "42", "7", 2, Duration::from_secs(5)).unwrap();
    assert!(matches!(
        gw.connect().await,
        Err(GatewayError::Unauthorized(_))
    ));
}
