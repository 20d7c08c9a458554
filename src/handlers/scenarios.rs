//! Scenario command handlers
//!
//! Operator fault injection: mutations go straight to the scenario store,
//! never through the tick loop. Validation happens once, here at the
//! boundary, before the store applies its own invariants.

use axum::extract::State;
use axum::Json;
use validator::Validate;

use crate::models::{DemandSpikeRequest, InjectLeakRequest, ScenarioResponse, ScenarioSnapshot};
use crate::{AppResult, AppState};

/// Inject or overwrite a leak on a pipe
pub async fn inject_leak(
    State(state): State<AppState>,
    Json(req): Json<InjectLeakRequest>,
) -> AppResult<Json<ScenarioResponse>> {
    req.validate()?;
    state.store.inject_leak(&req.pipe_id, req.severity)?;

    tracing::info!(pipe = %req.pipe_id, severity = req.severity, "leak scenario applied");
    Ok(Json(ScenarioResponse::applied()))
}

/// Clear all active leaks
pub async fn clear_leaks(State(state): State<AppState>) -> Json<ScenarioResponse> {
    state.store.clear_leaks();
    tracing::info!("all leak scenarios cleared");
    Json(ScenarioResponse::applied())
}

/// Apply a demand spike with an absolute expiry
pub async fn demand_spike(
    State(state): State<AppState>,
    Json(req): Json<DemandSpikeRequest>,
) -> AppResult<Json<ScenarioResponse>> {
    req.validate()?;
    state.store.apply_demand_spike(req.multiplier, req.duration_s)?;

    tracing::info!(
        multiplier = req.multiplier,
        duration_s = req.duration_s,
        "demand spike applied"
    );
    Ok(Json(ScenarioResponse::applied()))
}

/// Current scenario state (after lazy demand expiry)
pub async fn current(State(state): State<AppState>) -> Json<ScenarioSnapshot> {
    Json(state.store.snapshot())
}
