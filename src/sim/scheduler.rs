//! Tick scheduler
//!
//! One logical clock drives the whole pipeline: scenario snapshot → solver →
//! signal → scorer → frame → fan-out. Ticks are not reentrant; a slow tick
//! delays the next one so every frame reflects one consistent scenario
//! snapshot. Stopping drains the in-flight tick.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::{Frame, Topology};
use crate::sim::anomaly::AnomalyScorer;
use crate::sim::history::RecentHistory;
use crate::sim::hub::BroadcastHub;
use crate::sim::scenario::ScenarioStore;
use crate::sim::signal::SignalGenerator;
use crate::sim::solver::SolverAdapter;
use crate::telemetry::{EventLog, TwinEvent};

/// Counters the engine task publishes for the status surface.
pub struct EngineStats {
    pub running: AtomicBool,
    pub ticks: AtomicU64,
    pub solver_failures: AtomicU64,
    pub failure_streak: AtomicU32,
    pub degraded: AtomicBool,
    pub last_tick_ms: AtomicI64,
}

impl EngineStats {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
            solver_failures: AtomicU64::new(0),
            failure_streak: AtomicU32::new(0),
            degraded: AtomicBool::new(false),
            last_tick_ms: AtomicI64::new(0),
        }
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        let last_tick_ms = self.last_tick_ms.load(Ordering::SeqCst);
        EngineStatsSnapshot {
            running: self.running.load(Ordering::SeqCst),
            ticks: self.ticks.load(Ordering::SeqCst),
            solver_failures: self.solver_failures.load(Ordering::SeqCst),
            failure_streak: self.failure_streak.load(Ordering::SeqCst),
            degraded: self.degraded.load(Ordering::SeqCst),
            last_tick_ms: (last_tick_ms > 0).then_some(last_tick_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub running: bool,
    pub ticks: u64,
    pub solver_failures: u64,
    pub failure_streak: u32,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_ms: Option<i64>,
}

/// Everything one tick needs, owned by the engine task while running.
pub struct EngineCore {
    generator: SignalGenerator,
    adapter: SolverAdapter,
    scorer: Arc<AnomalyScorer>,
    store: Arc<ScenarioStore>,
    hub: Arc<BroadcastHub>,
    history: Arc<RecentHistory>,
    events: Arc<EventLog>,
    baselines: BTreeMap<String, f64>,
    tick_interval: Duration,
    failure_streak_limit: u32,
    tick: u64,
    last_time_ms: i64,
}

impl EngineCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: SignalGenerator,
        adapter: SolverAdapter,
        scorer: Arc<AnomalyScorer>,
        store: Arc<ScenarioStore>,
        hub: Arc<BroadcastHub>,
        history: Arc<RecentHistory>,
        events: Arc<EventLog>,
        topology: &Topology,
        tick_interval: Duration,
        failure_streak_limit: u32,
    ) -> Self {
        Self {
            generator,
            adapter,
            scorer,
            store,
            hub,
            history,
            events,
            baselines: topology.baseline_pressures(),
            tick_interval,
            failure_streak_limit,
            tick: 0,
            last_time_ms: 0,
        }
    }

    async fn run_tick(&mut self, stats: &EngineStats) {
        self.tick += 1;

        let scenario = self.store.snapshot();
        let outcome = self.adapter.solve(&scenario).await;
        if let Some(err) = &outcome.error {
            self.events
                .record(TwinEvent::solver_failure(self.adapter.failure_streak(), err));
        }

        let sample = self.generator.next(self.tick, &scenario);

        // Wall-clock milliseconds, forced strictly increasing across frames
        let now = Utc::now().timestamp_millis();
        let time = if now <= self.last_time_ms { self.last_time_ms + 1 } else { now };
        self.last_time_ms = time;

        let anomaly = self.scorer.score(&sample, &outcome.snapshot, &self.baselines, time);

        let frame = Frame {
            time,
            sample,
            node_pressures: outcome.snapshot.node_pressures,
            anomaly: Some(anomaly.clone()),
        };

        self.history.record(&frame);
        self.events.record(TwinEvent::reading_recorded(&frame));
        self.events.record(TwinEvent::anomaly_recorded(&anomaly));
        self.hub.publish(frame);

        stats.ticks.store(self.tick, Ordering::SeqCst);
        stats.last_tick_ms.store(time, Ordering::SeqCst);
        stats
            .solver_failures
            .store(self.adapter.failures_total(), Ordering::SeqCst);
        let streak = self.adapter.failure_streak();
        stats.failure_streak.store(streak, Ordering::SeqCst);

        if streak >= self.failure_streak_limit {
            if !stats.degraded.swap(true, Ordering::SeqCst) {
                tracing::error!(streak, "solver failure streak reached health limit, engine degraded");
            }
        } else {
            stats.degraded.store(false, Ordering::SeqCst);
        }
    }

    async fn run(mut self: Box<Self>, stats: Arc<EngineStats>, mut shutdown: watch::Receiver<bool>) -> Box<Self> {
        self.events
            .record(TwinEvent::engine_started(self.tick_interval.as_millis() as u64));
        tracing::info!(interval_ms = self.tick_interval.as_millis() as u64, "tick loop started");

        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.run_tick(&stats).await,
                _ = shutdown.changed() => break,
            }
        }

        self.events.record(TwinEvent::engine_stopped(self.tick));
        tracing::info!(ticks = self.tick, "tick loop stopped");
        self
    }
}

enum RunState {
    Stopped(Box<EngineCore>),
    Running {
        shutdown: watch::Sender<bool>,
        task: JoinHandle<Box<EngineCore>>,
    },
}

/// State machine `Stopped → Running → Stopped`. The core moves into the
/// engine task on start and is handed back on stop, so counters and the
/// monotonic frame clock survive restarts.
pub struct TickScheduler {
    state: tokio::sync::Mutex<Option<RunState>>,
    stats: Arc<EngineStats>,
}

impl TickScheduler {
    pub fn new(core: EngineCore) -> Self {
        Self {
            state: tokio::sync::Mutex::new(Some(RunState::Stopped(Box::new(core)))),
            stats: Arc::new(EngineStats::new()),
        }
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.stats.running.load(Ordering::SeqCst)
    }

    /// Returns false when already running (or the engine was lost to a
    /// panic, which is logged at stop time).
    pub async fn start(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.take() {
            Some(RunState::Stopped(core)) => {
                let (tx, rx) = watch::channel(false);
                let stats = Arc::clone(&self.stats);
                self.stats.running.store(true, Ordering::SeqCst);
                let task = tokio::spawn(core.run(stats, rx));
                *state = Some(RunState::Running { shutdown: tx, task });
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }

    /// Signal the loop and wait for the in-flight tick to drain. Returns
    /// false when already stopped.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.take() {
            Some(RunState::Running { shutdown, task }) => {
                let _ = shutdown.send(true);
                match task.await {
                    Ok(core) => *state = Some(RunState::Stopped(core)),
                    Err(err) => {
                        tracing::error!("engine task failed: {}", err);
                    }
                }
                self.stats.running.store(false, Ordering::SeqCst);
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkSpec, NodeSpec};
    use crate::sim::anomaly::{ScoreWeights, Thresholds};
    use crate::sim::solver::PropagationSolver;

    struct Rig {
        topology: Arc<Topology>,
        store: Arc<ScenarioStore>,
        hub: Arc<BroadcastHub>,
        scheduler: TickScheduler,
    }

    fn rig() -> Rig {
        let topology = Arc::new(Topology {
            nodes: vec![
                NodeSpec { id: "N1".into(), baseline_pressure: 52.0 },
                NodeSpec { id: "N2".into(), baseline_pressure: 51.0 },
                NodeSpec { id: "N3".into(), baseline_pressure: 50.0 },
            ],
            links: vec![
                LinkSpec { id: "P1".into(), source: "N1".into(), target: "N2".into(), baseline_flow: 60.0 },
                LinkSpec { id: "P2".into(), source: "N2".into(), target: "N3".into(), baseline_flow: 55.0 },
            ],
        });

        let store = Arc::new(ScenarioStore::new(Arc::clone(&topology)));
        let hub = Arc::new(BroadcastHub::new(32, 3));
        let history = Arc::new(RecentHistory::new(100));
        let events = Arc::new(EventLog::disabled());
        let scorer = Arc::new(AnomalyScorer::new(
            ScoreWeights::default(),
            25.0,
            Thresholds::default(),
        ));
        let adapter = SolverAdapter::new(
            Arc::new(PropagationSolver),
            Arc::clone(&topology),
            Duration::from_secs(1),
        );

        let core = EngineCore::new(
            SignalGenerator::new(Some(1)),
            adapter,
            scorer,
            Arc::clone(&store),
            Arc::clone(&hub),
            history,
            events,
            &topology,
            Duration::from_millis(20),
            5,
        );

        Rig {
            topology,
            store,
            hub,
            scheduler: TickScheduler::new(core),
        }
    }

    #[tokio::test]
    async fn start_and_stop_transitions() {
        let rig = rig();
        assert!(!rig.scheduler.is_running());

        assert!(rig.scheduler.start().await);
        assert!(!rig.scheduler.start().await);
        assert!(rig.scheduler.is_running());

        assert!(rig.scheduler.stop().await);
        assert!(!rig.scheduler.stop().await);
        assert!(!rig.scheduler.is_running());
        assert!(rig.scheduler.stats().snapshot().ticks > 0);
    }

    #[tokio::test]
    async fn frame_times_strictly_increase() {
        let rig = rig();
        let mut sub = rig.hub.subscribe_push();
        rig.scheduler.start().await;

        let mut last = 0;
        for _ in 0..4 {
            let frame = sub.recv().await.unwrap();
            assert!(frame.time > last);
            last = frame.time;
        }

        rig.scheduler.stop().await;
    }

    #[tokio::test]
    async fn injected_leak_shows_up_in_frames_and_anomaly() {
        let rig = rig();
        let mut sub = rig.hub.subscribe_push();
        rig.scheduler.start().await;

        // Baseline tick first: quiet network sits exactly at baselines
        let baseline = sub.recv().await.unwrap();
        assert_eq!(baseline.node_pressures["N2"], 51.0);

        rig.store.inject_leak("P1", 0.8).unwrap();

        let mut leak_frame = None;
        for _ in 0..10 {
            let frame = sub.recv().await.unwrap();
            if frame.node_pressures["N2"] < 51.0 {
                leak_frame = Some(frame);
                break;
            }
        }
        let frame = leak_frame.expect("leak never reached a frame");

        // Downstream node of P1 strictly below its baseline
        assert!(frame.node_pressures["N2"] < baseline.node_pressures["N2"]);
        let anomaly = frame.anomaly.as_ref().unwrap();
        assert!(anomaly.score > 0.0);
        let location = anomaly.location.as_deref().unwrap();
        let pipe = rig.topology.pipe("P1").unwrap();
        assert!(location == pipe.source || location == pipe.target);

        rig.scheduler.stop().await;
    }
}
