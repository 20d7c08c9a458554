//! Operator-mutable fault scenario state
//!
//! One owned store, one mutex. Command handlers and the tick loop never see a
//! partially-applied mutation: mutators are serialized against each other and
//! `snapshot()` copies the whole state atomically.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::ScenarioError;
use crate::models::{ScenarioSnapshot, Topology};

#[derive(Debug)]
struct ScenarioState {
    leaks: HashMap<String, f64>,
    demand_multiplier: f64,
    demand_expires_at: Option<DateTime<Utc>>,
}

impl ScenarioState {
    fn empty() -> Self {
        Self {
            leaks: HashMap::new(),
            demand_multiplier: 1.0,
            demand_expires_at: None,
        }
    }

    /// Reset an elapsed demand spike. Expiry is lazy: nothing fires a timer,
    /// the next observer pays for it.
    fn expire_demand(&mut self, now: DateTime<Utc>) {
        if let Some(expires_at) = self.demand_expires_at {
            if expires_at <= now {
                self.demand_multiplier = 1.0;
                self.demand_expires_at = None;
            }
        }
    }
}

pub struct ScenarioStore {
    topology: Arc<Topology>,
    state: Mutex<ScenarioState>,
}

impl ScenarioStore {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            state: Mutex::new(ScenarioState::empty()),
        }
    }

    /// Set or overwrite the leak on `pipe_id`. Severity 0 removes the entry;
    /// a zero-severity entry is equivalent to absence and never retained.
    pub fn inject_leak(&self, pipe_id: &str, severity: f64) -> Result<(), ScenarioError> {
        if !severity.is_finite() || !(0.0..=1.0).contains(&severity) {
            return Err(ScenarioError::SeverityOutOfRange(severity));
        }
        if !self.topology.has_pipe(pipe_id) {
            return Err(ScenarioError::UnknownPipe(pipe_id.to_string()));
        }

        let mut state = self.state.lock();
        if severity == 0.0 {
            state.leaks.remove(pipe_id);
        } else {
            state.leaks.insert(pipe_id.to_string(), severity);
        }
        Ok(())
    }

    /// Empty the leak map unconditionally. Idempotent.
    pub fn clear_leaks(&self) {
        self.state.lock().leaks.clear();
    }

    /// Set the demand multiplier with an absolute expiry `duration_s` from
    /// now. Overwrites any prior spike; spikes do not stack.
    pub fn apply_demand_spike(&self, multiplier: f64, duration_s: u64) -> Result<(), ScenarioError> {
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(ScenarioError::InvalidMultiplier(multiplier));
        }
        if duration_s == 0 {
            return Err(ScenarioError::InvalidDuration);
        }

        let mut state = self.state.lock();
        state.demand_multiplier = multiplier;
        state.demand_expires_at = Some(Utc::now() + Duration::seconds(duration_s as i64));
        Ok(())
    }

    /// Immutable copy of the current state for one tick, after expiring any
    /// elapsed demand spike.
    pub fn snapshot(&self) -> ScenarioSnapshot {
        let mut state = self.state.lock();
        state.expire_demand(Utc::now());
        ScenarioSnapshot {
            leaks: state.leaks.clone(),
            demand_multiplier: state.demand_multiplier,
            demand_expires_at: state.demand_expires_at,
        }
    }
}
