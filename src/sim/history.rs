//! Bounded in-memory recent history
//!
//! Backs the bounded-limit "recent readings" / "recent anomalies" queries.
//! Durable storage is the external persistence collaborator's job; this
//! buffer only serves the command interface.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use crate::models::{AnomalyRecord, Frame, SensorSample};

/// One recorded reading: the frame time plus its flattened sensor channels.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingEntry {
    pub time: i64,
    #[serde(flatten)]
    pub sample: SensorSample,
}

pub struct RecentHistory {
    capacity: usize,
    readings: Mutex<VecDeque<ReadingEntry>>,
    anomalies: Mutex<VecDeque<AnomalyRecord>>,
}

impl RecentHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: Mutex::new(VecDeque::with_capacity(capacity)),
            anomalies: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, frame: &Frame) {
        let mut readings = self.readings.lock();
        if readings.len() == self.capacity {
            readings.pop_front();
        }
        readings.push_back(ReadingEntry { time: frame.time, sample: frame.sample });
        drop(readings);

        if let Some(anomaly) = &frame.anomaly {
            let mut anomalies = self.anomalies.lock();
            if anomalies.len() == self.capacity {
                anomalies.pop_front();
            }
            anomalies.push_back(anomaly.clone());
        }
    }

    /// Most-recent-first, at most `limit` entries.
    pub fn recent_readings(&self, limit: usize) -> Vec<ReadingEntry> {
        self.readings.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Most-recent-first, at most `limit` entries.
    pub fn recent_anomalies(&self, limit: usize) -> Vec<AnomalyRecord> {
        self.anomalies.lock().iter().rev().take(limit).cloned().collect()
    }
}
