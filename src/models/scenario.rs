//! Scenario state snapshot and operator command payloads

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Immutable copy of the operator-mutable fault state, taken once per tick.
/// Demand spikes past their expiry never appear here.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSnapshot {
    /// Active leaks by pipe id; severity in (0, 1]. Absent entry == no leak.
    pub leaks: HashMap<String, f64>,
    pub demand_multiplier: f64,
    pub demand_expires_at: Option<DateTime<Utc>>,
}

impl ScenarioSnapshot {
    pub fn quiet() -> Self {
        Self {
            leaks: HashMap::new(),
            demand_multiplier: 1.0,
            demand_expires_at: None,
        }
    }

    /// Largest active leak severity, 0.0 when no leak is active.
    pub fn max_leak_severity(&self) -> f64 {
        self.leaks.values().copied().fold(0.0, f64::max)
    }

    pub fn demand_active(&self) -> bool {
        self.demand_expires_at.is_some()
    }
}

fn default_severity() -> f64 {
    0.5
}

fn default_multiplier() -> f64 {
    1.2
}

fn default_duration_s() -> u64 {
    600
}

#[derive(Debug, Deserialize, Validate)]
pub struct InjectLeakRequest {
    pub pipe_id: String,
    #[serde(default = "default_severity")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub severity: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DemandSpikeRequest {
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 0.0))]
    pub multiplier: f64,
    #[serde(default = "default_duration_s")]
    #[validate(range(min = 1))]
    pub duration_s: u64,
}

#[derive(Debug, Serialize)]
pub struct ScenarioResponse {
    pub status: &'static str,
    pub applied: bool,
}

impl ScenarioResponse {
    pub fn applied() -> Self {
        Self { status: "ok", applied: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leak_request_defaults_and_ranges() {
        let req: InjectLeakRequest = serde_json::from_str(r#"{"pipe_id": "P1"}"#).unwrap();
        assert_eq!(req.severity, 0.5);
        assert!(req.validate().is_ok());

        let req: InjectLeakRequest =
            serde_json::from_str(r#"{"pipe_id": "P1", "severity": 1.5}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn demand_request_rejects_negative_multiplier() {
        let req: DemandSpikeRequest =
            serde_json::from_str(r#"{"multiplier": -0.5, "duration_s": 10}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn quiet_snapshot_has_unit_demand() {
        let snap = ScenarioSnapshot::quiet();
        assert_eq!(snap.demand_multiplier, 1.0);
        assert_eq!(snap.max_leak_severity(), 0.0);
        assert!(!snap.demand_active());
    }
}
