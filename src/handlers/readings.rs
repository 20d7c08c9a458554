//! Recent readings / anomalies query handlers

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::models::AnomalyRecord;
use crate::sim::history::ReadingEntry;
use crate::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize, Default)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

impl RecentQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Recent sensor readings, most-recent-first
pub async fn recent_readings(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<ReadingEntry>> {
    Json(state.history.recent_readings(query.limit()))
}

/// Recent anomaly records, most-recent-first
pub async fn recent_anomalies(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<AnomalyRecord>> {
    Json(state.history.recent_anomalies(query.limit()))
}
