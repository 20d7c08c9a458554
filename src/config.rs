//! Configuration module

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Path to the network-description file loaded at startup
    pub topology_path: String,

    /// Simulation tick period in milliseconds
    pub tick_interval_ms: u64,

    /// Upper bound on a single solver call
    pub solver_timeout_ms: u64,

    /// Consecutive solver failures before the engine reports degraded health
    pub solver_failure_streak: u32,

    /// Anomaly score at or above which a frame is classified `warn`
    pub warn_threshold: f64,

    /// Anomaly score at or above which a frame is classified `leak`
    pub leak_threshold: f64,

    /// Divisor normalizing per-node pressure drops into [0, 1]
    pub pressure_drop_divisor: f64,

    /// Anomaly score weights (pressure-drop-dominant, acoustic-assisted)
    pub score_weight_pressure: f64,
    pub score_weight_kurtosis: f64,
    pub score_weight_rms: f64,

    /// Bounded capacity of the in-memory recent readings/anomalies buffers
    pub history_capacity: usize,

    /// Per-subscriber outbound frame queue capacity
    pub subscriber_capacity: usize,

    /// Consecutive full-queue publishes before a slow subscriber is dropped
    pub subscriber_max_lag: u32,

    /// Directory for the telemetry event log; disabled when unset
    pub telemetry_dir: Option<String>,

    /// Fixed seed for the signal generator; random when unset
    pub signal_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            topology_path: env::var("TOPOLOGY_PATH")
                .unwrap_or_else(|_| "assets/network.json".to_string()),

            tick_interval_ms: env::var("TICK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),

            solver_timeout_ms: env::var("SOLVER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),

            solver_failure_streak: env::var("SOLVER_FAILURE_STREAK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            warn_threshold: env::var("WARN_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.35),

            leak_threshold: env::var("LEAK_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.6),

            pressure_drop_divisor: env::var("PRESSURE_DROP_DIVISOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25.0),

            score_weight_pressure: env::var("SCORE_WEIGHT_PRESSURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.6),

            score_weight_kurtosis: env::var("SCORE_WEIGHT_KURTOSIS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.25),

            score_weight_rms: env::var("SCORE_WEIGHT_RMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.15),

            history_capacity: env::var("HISTORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),

            subscriber_capacity: env::var("SUBSCRIBER_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16),

            subscriber_max_lag: env::var("SUBSCRIBER_MAX_LAG")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),

            telemetry_dir: env::var("TELEMETRY_DIR").ok(),

            signal_seed: env::var("SIGNAL_SEED").ok().and_then(|v| v.parse().ok()),
        }
    }
}
