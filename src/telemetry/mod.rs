//! Telemetry event boundary
//!
//! The core emits read-only "reading recorded" / "anomaly recorded" events;
//! durable storage and retrieval live outside this process. The recorder is
//! an append-only JSONL writer with size-based rotation.

pub mod event;
pub mod recorder;

pub use event::{EventKind, TwinEvent};
pub use recorder::EventLog;
