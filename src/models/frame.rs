//! Broadcast frame and anomaly record models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sample::SensorSample;

/// Presentation label derived from the anomaly score and the configured
/// warn/leak thresholds. A label, not stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    None,
    Warn,
    Leak,
}

/// Leak-likelihood assessment for one tick, derived purely from the sensor
/// sample and the network snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Combined score, always clamped to [0, 1]
    pub score: f64,
    /// Node with the dominant pressure drop, absent when the network is quiet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub classification: Classification,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// The unit of broadcast: one tick's combined sensor, hydraulic and anomaly
/// output. Immutable, `time` strictly increasing across frames.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Wall-clock milliseconds, monotonic per tick
    pub time: i64,
    #[serde(flatten)]
    pub sample: SensorSample,
    pub node_pressures: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<AnomalyRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorSample {
        SensorSample {
            spectral_freq: 687.23,
            kurtosis: 1.2,
            skewness: 0.1,
            rms_power: 1.01,
            accuracy: 0.84,
            precision: 0.81,
            recall: 0.89,
            auc: (0.84 + 0.81 + 0.89) / 3.0,
        }
    }

    #[test]
    fn frame_flattens_sensor_fields() {
        let frame = Frame {
            time: 1_699_123_456_789,
            sample: sample(),
            node_pressures: BTreeMap::from([("N1".to_string(), 52.3)]),
            anomaly: Some(AnomalyRecord {
                score: 0.42,
                location: Some("N1".to_string()),
                classification: Classification::Warn,
                timestamp: 1_699_123_456_789,
            }),
        };

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["time"], 1_699_123_456_789_i64);
        assert_eq!(value["spectral_freq"], 687.23);
        assert_eq!(value["node_pressures"]["N1"], 52.3);
        assert_eq!(value["anomaly"]["classification"], "warn");
        assert!(value.get("sample").is_none());
    }

    #[test]
    fn absent_anomaly_is_omitted() {
        let frame = Frame {
            time: 1,
            sample: sample(),
            node_pressures: BTreeMap::new(),
            anomaly: None,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert!(value.get("anomaly").is_none());
    }
}
