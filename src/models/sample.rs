//! Synthetic sensor sample model

use serde::{Deserialize, Serialize};

/// One tick's synthetic multi-channel readings. Immutable once produced.
///
/// The acoustic channels describe the statistical shape of a simulated
/// waveform; the model-performance channels sit in [0, 1] with `auc`
/// always the mean of the other three.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Dominant spectral frequency of the acoustic signal (Hz)
    pub spectral_freq: f64,
    /// Peakedness of the waveform, clamped to [-2.5, 2.0]
    pub kurtosis: f64,
    /// Asymmetry of the waveform, clamped to [-1.5, 1.5]
    pub skewness: f64,
    /// Root-mean-square signal energy
    pub rms_power: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    /// Derived: (accuracy + precision + recall) / 3, never sampled
    pub auc: f64,
}
