//! Anomaly scoring
//!
//! Deterministic, explainable threshold/correlation scoring — not a trained
//! model. Pressure drop against baseline dominates; the acoustic channels
//! assist. Exact constants are configuration, not law.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{AnomalyRecord, Classification, NetworkSnapshot, SensorSample};

/// Kurtosis of an undisturbed waveform; deviation from it feeds the score.
const KURTOSIS_BASELINE: f64 = 3.0;
/// Largest meaningful kurtosis deviation given the generator's clamp range.
const KURTOSIS_SPAN: f64 = 5.5;
const RMS_BASELINE: f64 = 1.0;
const RMS_SPAN: f64 = 2.0;
/// Normalized drops below this report no location.
const LOCATION_EPSILON: f64 = 1e-3;

/// Score-to-label thresholds, runtime-mutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct Thresholds {
    #[validate(range(min = 0.0, max = 1.0))]
    pub warn: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub leak: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { warn: 0.35, leak: 0.6 }
    }
}

impl Thresholds {
    pub fn classify(&self, score: f64) -> Classification {
        if score >= self.leak {
            Classification::Leak
        } else if score >= self.warn {
            Classification::Warn
        } else {
            Classification::None
        }
    }
}

/// Fixed-weight linear combination; pressure carries the majority weight.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub pressure: f64,
    pub kurtosis: f64,
    pub rms: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { pressure: 0.6, kurtosis: 0.25, rms: 0.15 }
    }
}

pub struct AnomalyScorer {
    weights: ScoreWeights,
    drop_divisor: f64,
    thresholds: RwLock<Thresholds>,
}

impl AnomalyScorer {
    pub fn new(weights: ScoreWeights, drop_divisor: f64, thresholds: Thresholds) -> Self {
        Self {
            weights,
            drop_divisor,
            thresholds: RwLock::new(thresholds),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.read()
    }

    pub fn set_thresholds(&self, thresholds: Thresholds) {
        *self.thresholds.write() = thresholds;
    }

    /// Score one tick. `baselines` are the reference pressures the drop
    /// signal is measured against; `at_ms` stamps the record.
    pub fn score(
        &self,
        sample: &SensorSample,
        snapshot: &NetworkSnapshot,
        baselines: &BTreeMap<String, f64>,
        at_ms: i64,
    ) -> AnomalyRecord {
        // Per-node pressure-drop signal, floored at zero and normalized.
        // Baselines iterate key-ordered, so ties resolve deterministically.
        let mut max_drop = 0.0_f64;
        let mut location: Option<String> = None;
        for (node, baseline) in baselines {
            let current = snapshot.node_pressures.get(node).copied().unwrap_or(*baseline);
            let drop = ((baseline - current).max(0.0) / self.drop_divisor).clamp(0.0, 1.0);
            if drop > max_drop {
                max_drop = drop;
                location = Some(node.clone());
            }
        }
        if max_drop < LOCATION_EPSILON {
            location = None;
        }

        let kurtosis_dev =
            ((sample.kurtosis - KURTOSIS_BASELINE).abs() / KURTOSIS_SPAN).clamp(0.0, 1.0);
        let rms_dev = ((sample.rms_power - RMS_BASELINE).abs() / RMS_SPAN).clamp(0.0, 1.0);

        let score = (self.weights.pressure * max_drop
            + self.weights.kurtosis * kurtosis_dev
            + self.weights.rms * rms_dev)
            .clamp(0.0, 1.0);

        AnomalyRecord {
            score,
            location,
            classification: self.thresholds().classify(score),
            timestamp: at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_sample() -> SensorSample {
        SensorSample {
            spectral_freq: 700.0,
            kurtosis: 3.0,
            skewness: 0.0,
            rms_power: 1.0,
            accuracy: 0.84,
            precision: 0.81,
            recall: 0.89,
            auc: (0.84 + 0.81 + 0.89) / 3.0,
        }
    }

    fn snapshot(pressures: &[(&str, f64)]) -> NetworkSnapshot {
        NetworkSnapshot {
            node_pressures: pressures
                .iter()
                .map(|(id, p)| (id.to_string(), *p))
                .collect(),
            link_flows: BTreeMap::new(),
        }
    }

    fn baselines() -> BTreeMap<String, f64> {
        BTreeMap::from([("N1".to_string(), 52.0), ("N2".to_string(), 50.0)])
    }

    fn scorer() -> AnomalyScorer {
        AnomalyScorer::new(ScoreWeights::default(), 25.0, Thresholds::default())
    }

    #[test]
    fn quiet_network_has_no_location() {
        let record = scorer().score(
            &quiet_sample(),
            &snapshot(&[("N1", 52.0), ("N2", 50.0)]),
            &baselines(),
            1,
        );
        assert!(record.location.is_none());
        assert_eq!(record.classification, Classification::None);
    }

    #[test]
    fn location_is_node_with_maximum_drop() {
        let record = scorer().score(
            &quiet_sample(),
            &snapshot(&[("N1", 47.0), ("N2", 30.0)]),
            &baselines(),
            1,
        );
        assert_eq!(record.location.as_deref(), Some("N2"));
    }

    #[test]
    fn pressure_rise_does_not_score() {
        let record = scorer().score(
            &quiet_sample(),
            &snapshot(&[("N1", 60.0), ("N2", 58.0)]),
            &baselines(),
            1,
        );
        assert!(record.location.is_none());
        assert!(record.score < 0.05);
    }

    #[test]
    fn score_is_clamped_to_unit_interval() {
        let extreme = SensorSample {
            kurtosis: -2.5,
            rms_power: 5.0,
            ..quiet_sample()
        };
        let record = scorer().score(
            &extreme,
            &snapshot(&[("N1", 0.0), ("N2", 0.0)]),
            &baselines(),
            1,
        );
        assert!(record.score <= 1.0);
        assert!(record.score >= 0.0);
        assert_eq!(record.classification, Classification::Leak);
    }

    #[test]
    fn thresholds_are_runtime_mutable() {
        let scorer = scorer();
        let record = scorer.score(
            &quiet_sample(),
            &snapshot(&[("N1", 40.0), ("N2", 50.0)]),
            &baselines(),
            1,
        );
        assert_eq!(record.classification, Classification::None);

        scorer.set_thresholds(Thresholds { warn: 0.1, leak: 0.2 });
        let record = scorer.score(
            &quiet_sample(),
            &snapshot(&[("N1", 40.0), ("N2", 50.0)]),
            &baselines(),
            1,
        );
        assert_eq!(record.classification, Classification::Leak);
    }
}
