//! Telemetry event model

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::SolverError;
use crate::models::{AnomalyRecord, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    EngineStarted,
    EngineStopped,
    ReadingRecorded,
    AnomalyRecorded,
    SolverFailure,
}

/// One emitted event, serialized as a single JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl TwinEvent {
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            kind,
            payload,
        }
    }

    pub fn engine_started(tick_interval_ms: u64) -> Self {
        Self::new(
            EventKind::EngineStarted,
            json!({ "tick_interval_ms": tick_interval_ms }),
        )
    }

    pub fn engine_stopped(ticks: u64) -> Self {
        Self::new(EventKind::EngineStopped, json!({ "ticks": ticks }))
    }

    pub fn reading_recorded(frame: &Frame) -> Self {
        Self::new(
            EventKind::ReadingRecorded,
            json!({
                "time": frame.time,
                "spectral_freq": frame.sample.spectral_freq,
                "rms_power": frame.sample.rms_power,
            }),
        )
    }

    pub fn anomaly_recorded(record: &AnomalyRecord) -> Self {
        Self::new(
            EventKind::AnomalyRecorded,
            json!({
                "time": record.timestamp,
                "score": record.score,
                "location": record.location,
            }),
        )
    }

    pub fn solver_failure(streak: u32, error: &SolverError) -> Self {
        Self::new(
            EventKind::SolverFailure,
            json!({ "streak": streak, "error": error.to_string() }),
        )
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
