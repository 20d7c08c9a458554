//! Engine status and control handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use validator::Validate;

use crate::sim::anomaly::Thresholds;
use crate::sim::scheduler::EngineStatsSnapshot;
use crate::{AppError, AppResult, AppState};

#[derive(Serialize)]
pub struct EngineStatusResponse {
    #[serde(flatten)]
    pub stats: EngineStatsSnapshot,
    pub push_subscribers: usize,
    pub tick_interval_ms: u64,
    pub thresholds: Thresholds,
}

pub async fn status(State(state): State<AppState>) -> Json<EngineStatusResponse> {
    Json(EngineStatusResponse {
        stats: state.scheduler.stats().snapshot(),
        push_subscribers: state.hub.subscriber_count(),
        tick_interval_ms: state.config.tick_interval_ms,
        thresholds: state.scorer.thresholds(),
    })
}

#[derive(Serialize)]
pub struct EngineControlResponse {
    pub status: &'static str,
    pub running: bool,
}

pub async fn start(State(state): State<AppState>) -> Json<EngineControlResponse> {
    let started = state.scheduler.start().await;
    if started {
        tracing::info!("engine started by operator");
    }
    Json(EngineControlResponse { status: "ok", running: state.scheduler.is_running() })
}

pub async fn stop(State(state): State<AppState>) -> Json<EngineControlResponse> {
    let stopped = state.scheduler.stop().await;
    if stopped {
        tracing::info!("engine stopped by operator");
    }
    Json(EngineControlResponse { status: "ok", running: state.scheduler.is_running() })
}

/// Replace the warn/leak classification thresholds at runtime
pub async fn update_thresholds(
    State(state): State<AppState>,
    Json(req): Json<Thresholds>,
) -> AppResult<Json<Thresholds>> {
    req.validate()?;
    if req.warn > req.leak {
        return Err(AppError::ValidationError(
            "warn threshold must not exceed leak threshold".to_string(),
        ));
    }

    state.scorer.set_thresholds(req);
    tracing::info!(warn = req.warn, leak = req.leak, "classification thresholds updated");
    Ok(Json(req))
}
