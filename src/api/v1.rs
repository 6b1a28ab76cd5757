use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::error::ApiError;
use crate::{
    controller::AppState,
    domain::{ChargeSnapshot, ForceChargeOverride},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/solar_charge_state", get(get_solar_charge_state))
        .route("/force_charge", get(get_force_charge).patch(patch_force_charge))
        .route("/healthz", get(healthz))
        .with_state(state)
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

/// Latest snapshot written by the controller loop.
pub async fn get_solar_charge_state(
    State(st): State<AppState>,
) -> Result<Json<ChargeSnapshot>, ApiError> {
    st.snapshots
        .read()?
        .map(Json)
        .ok_or_else(|| ApiError::ServiceUnavailable("no charge state recorded yet".to_string()))
}

pub async fn get_force_charge(
    State(st): State<AppState>,
) -> Result<Json<ForceChargeOverride>, ApiError> {
    Ok(Json(st.overrides.load()?))
}

#[derive(Debug, Deserialize)]
pub struct ForceChargeRequest {
    pub force_charge: bool,
}

pub async fn patch_force_charge(
    State(st): State<AppState>,
    payload: Result<Json<ForceChargeRequest>, JsonRejection>,
) -> Result<Json<ForceChargeOverride>, ApiError> {
    let Json(req) = payload?;

    let record = st.overrides.toggle_force_charge(req.force_charge, Utc::now())?;

    info!(force_charge = req.force_charge, "force charge toggled via API");
    Ok(Json(record))
}
