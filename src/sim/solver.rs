//! Network solver seam and adapter
//!
//! The hydraulic mathematics live behind the [`NetworkSolver`] trait — an
//! external collaborator with a bounded-time contract. The adapter owns what
//! the solver does not: translating scenario state into a perturbation call,
//! normalizing raw output into a [`NetworkSnapshot`], bounding the call with
//! a timeout, and the stale-reuse failure policy.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SolverError;
use crate::models::{NetworkSnapshot, ScenarioSnapshot, Topology};

/// Raw solver result before normalization.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub node_pressures: HashMap<String, f64>,
    pub link_flows: HashMap<String, f64>,
}

/// The external hydraulic collaborator: topology plus a perturbation list in,
/// instantaneous pressures (and flows, if available) out. Synchronous; the
/// adapter runs it on a blocking thread under a timeout.
pub trait NetworkSolver: Send + Sync + 'static {
    fn solve(
        &self,
        topology: &Topology,
        scenario: &ScenarioSnapshot,
    ) -> Result<SolverOutput, SolverError>;
}

/// Maximum pressure drop at a leaking pipe's endpoints.
const MAX_ENDPOINT_DROP: f64 = 25.0;
/// Propagated drop numerator; decays with hop distance from the leak.
const PROPAGATED_DROP: f64 = 20.0;
/// Floor on the propagated drop anywhere in the connected component.
const MIN_PROPAGATED_DROP: f64 = 5.0;
/// No node is drawn below this pressure.
const MIN_PRESSURE: f64 = 10.0;
/// Additional flow loss through a leaking pipe at full severity.
const LEAK_FLOW_LOSS: f64 = 0.4;

/// Built-in default collaborator: a breadth-first pressure-propagation model.
/// Leak severity drops pressure most at the pipe's endpoints, decaying with
/// hop distance; a demand spike scales all pressures uniformly; link flows
/// track mean endpoint pressure. Deterministic.
pub struct PropagationSolver;

impl PropagationSolver {
    fn leak_drops(
        topology: &Topology,
        adjacency: &HashMap<String, Vec<String>>,
        pipe_id: &str,
        severity: f64,
    ) -> Result<HashMap<String, f64>, SolverError> {
        let pipe = topology
            .pipe(pipe_id)
            .ok_or_else(|| SolverError::UnknownPipe(pipe_id.to_string()))?;

        let mut drops: HashMap<String, f64> = HashMap::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((pipe.source.clone(), 0));
        queue.push_back((pipe.target.clone(), 0));

        while let Some((node, distance)) = queue.pop_front() {
            if drops.contains_key(&node) {
                continue;
            }
            let drop = if distance == 0 {
                severity * MAX_ENDPOINT_DROP
            } else {
                severity * (PROPAGATED_DROP / (distance as f64 + 1.0)).max(MIN_PROPAGATED_DROP)
            };
            drops.insert(node.clone(), drop);

            for neighbor in adjacency.get(&node).into_iter().flatten() {
                if !drops.contains_key(neighbor) {
                    queue.push_back((neighbor.clone(), distance + 1));
                }
            }
        }

        Ok(drops)
    }
}

impl NetworkSolver for PropagationSolver {
    fn solve(
        &self,
        topology: &Topology,
        scenario: &ScenarioSnapshot,
    ) -> Result<SolverOutput, SolverError> {
        let baselines = topology.baseline_pressures();
        let adjacency = topology.adjacency();

        // Dominant leak wins per node when several leaks overlap.
        let mut worst_drop: HashMap<String, f64> = HashMap::new();
        for (pipe_id, severity) in &scenario.leaks {
            let drops = Self::leak_drops(topology, &adjacency, pipe_id, *severity)?;
            for (node, drop) in drops {
                let entry = worst_drop.entry(node).or_insert(0.0);
                if drop > *entry {
                    *entry = drop;
                }
            }
        }

        let demand_factor = 1.0 - 0.05 * (scenario.demand_multiplier - 1.0);
        let demand_factor = demand_factor.max(0.7);

        let mut node_pressures: HashMap<String, f64> = HashMap::new();
        for (node, baseline) in &baselines {
            let drop = worst_drop.get(node).copied().unwrap_or(0.0);
            let pressure = (baseline - drop).max(MIN_PRESSURE) * demand_factor;
            node_pressures.insert(node.clone(), pressure);
        }

        // Flow capacity tracks the mean endpoint pressure relative to its
        // baseline, with extra loss through leaking pipes.
        let mut link_flows: HashMap<String, f64> = HashMap::new();
        for link in &topology.links {
            let baseline_avg = (baselines[&link.source] + baselines[&link.target]) / 2.0;
            let current_avg =
                (node_pressures[&link.source] + node_pressures[&link.target]) / 2.0;
            let pressure_factor = if baseline_avg > 0.0 {
                current_avg / baseline_avg
            } else {
                1.0
            };
            let leak_loss = scenario.leaks.get(&link.id).copied().unwrap_or(0.0) * LEAK_FLOW_LOSS;
            let flow = link.baseline_flow * (pressure_factor * (1.0 - leak_loss)).max(0.3);
            link_flows.insert(link.id.clone(), flow);
        }

        Ok(SolverOutput { node_pressures, link_flows })
    }
}

/// Outcome of one adapter call. `snapshot` is always usable; `error` carries
/// the failure the tick should log and count, if any.
#[derive(Debug)]
pub struct SolveOutcome {
    pub snapshot: NetworkSnapshot,
    pub error: Option<SolverError>,
}

pub struct SolverAdapter {
    solver: Arc<dyn NetworkSolver>,
    topology: Arc<Topology>,
    timeout: Duration,
    last_good: NetworkSnapshot,
    failures_total: u64,
    failure_streak: u32,
}

impl SolverAdapter {
    pub fn new(solver: Arc<dyn NetworkSolver>, topology: Arc<Topology>, timeout: Duration) -> Self {
        // Before the first successful solve there is nothing to reuse on
        // failure except the topology baselines.
        let last_good = NetworkSnapshot::baseline(&topology);
        Self {
            solver,
            topology,
            timeout,
            last_good,
            failures_total: 0,
            failure_streak: 0,
        }
    }

    pub fn failures_total(&self) -> u64 {
        self.failures_total
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    /// Run one bounded solve. Never fails: on any solver error the previous
    /// snapshot is reused and the failure is reported in the outcome. No
    /// retry here; the next tick is the natural retry.
    pub async fn solve(&mut self, scenario: &ScenarioSnapshot) -> SolveOutcome {
        let solver = Arc::clone(&self.solver);
        let topology = Arc::clone(&self.topology);
        let scenario = scenario.clone();

        let task =
            tokio::task::spawn_blocking(move || solver.solve(&topology, &scenario));

        let result = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(SolverError::Timeout(self.timeout.as_millis() as u64)),
            Ok(Err(join_err)) => Err(SolverError::Aborted(join_err.to_string())),
            Ok(Ok(result)) => result,
        };

        match result.and_then(|output| self.normalize(output)) {
            Ok(snapshot) => {
                self.failure_streak = 0;
                self.last_good = snapshot.clone();
                SolveOutcome { snapshot, error: None }
            }
            Err(err) => {
                self.failures_total += 1;
                self.failure_streak += 1;
                tracing::warn!(
                    streak = self.failure_streak,
                    "solver failure, reusing previous snapshot: {}",
                    err
                );
                SolveOutcome {
                    snapshot: self.last_good.clone(),
                    error: Some(err),
                }
            }
        }
    }

    /// Normalize raw output: every topology node gets a pressure (baseline
    /// when the solver omitted it), non-finite values are malformed output.
    fn normalize(&self, output: SolverOutput) -> Result<NetworkSnapshot, SolverError> {
        let mut node_pressures = BTreeMap::new();
        for node in &self.topology.nodes {
            let pressure = output
                .node_pressures
                .get(&node.id)
                .copied()
                .unwrap_or(node.baseline_pressure);
            if !pressure.is_finite() {
                return Err(SolverError::MalformedOutput(format!(
                    "non-finite pressure for node {}",
                    node.id
                )));
            }
            node_pressures.insert(node.id.clone(), pressure);
        }

        let mut link_flows = BTreeMap::new();
        for link in &self.topology.links {
            let flow = output
                .link_flows
                .get(&link.id)
                .copied()
                .unwrap_or(link.baseline_flow);
            if !flow.is_finite() {
                return Err(SolverError::MalformedOutput(format!(
                    "non-finite flow for link {}",
                    link.id
                )));
            }
            link_flows.insert(link.id.clone(), flow);
        }

        Ok(NetworkSnapshot { node_pressures, link_flows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkSpec, NodeSpec};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn topology() -> Arc<Topology> {
        // N1 -P1- N2 -P2- N3 -P3- N4
        Arc::new(Topology {
            nodes: vec![
                NodeSpec { id: "N1".into(), baseline_pressure: 52.0 },
                NodeSpec { id: "N2".into(), baseline_pressure: 51.0 },
                NodeSpec { id: "N3".into(), baseline_pressure: 50.0 },
                NodeSpec { id: "N4".into(), baseline_pressure: 49.0 },
            ],
            links: vec![
                LinkSpec { id: "P1".into(), source: "N1".into(), target: "N2".into(), baseline_flow: 60.0 },
                LinkSpec { id: "P2".into(), source: "N2".into(), target: "N3".into(), baseline_flow: 55.0 },
                LinkSpec { id: "P3".into(), source: "N3".into(), target: "N4".into(), baseline_flow: 50.0 },
            ],
        })
    }

    fn leak_scenario(pipe: &str, severity: f64) -> ScenarioSnapshot {
        let mut scenario = ScenarioSnapshot::quiet();
        scenario.leaks.insert(pipe.to_string(), severity);
        scenario
    }

    #[test]
    fn quiet_scenario_returns_baselines() {
        let topology = topology();
        let output = PropagationSolver
            .solve(&topology, &ScenarioSnapshot::quiet())
            .unwrap();
        assert_eq!(output.node_pressures["N1"], 52.0);
        assert_eq!(output.link_flows["P1"], 60.0);
    }

    #[test]
    fn leak_drops_endpoint_pressure_most() {
        let topology = topology();
        let output = PropagationSolver
            .solve(&topology, &leak_scenario("P1", 0.8))
            .unwrap();

        assert!(output.node_pressures["N1"] < 52.0);
        assert!(output.node_pressures["N2"] < 51.0);
        // Endpoint drop exceeds the drop two hops away
        let endpoint_drop = 51.0 - output.node_pressures["N2"];
        let far_drop = 49.0 - output.node_pressures["N4"];
        assert!(endpoint_drop > far_drop);
    }

    #[test]
    fn drop_grows_with_severity() {
        let topology = topology();
        let mild = PropagationSolver
            .solve(&topology, &leak_scenario("P2", 0.2))
            .unwrap();
        let severe = PropagationSolver
            .solve(&topology, &leak_scenario("P2", 0.9))
            .unwrap();
        assert!(severe.node_pressures["N2"] < mild.node_pressures["N2"]);
    }

    #[test]
    fn demand_spike_scales_all_pressures() {
        let topology = topology();
        let mut scenario = ScenarioSnapshot::quiet();
        scenario.demand_multiplier = 3.0;
        let output = PropagationSolver.solve(&topology, &scenario).unwrap();

        for node in &topology.nodes {
            assert!(output.node_pressures[&node.id] < node.baseline_pressure);
        }
    }

    #[test]
    fn leaking_pipe_loses_flow() {
        let topology = topology();
        let output = PropagationSolver
            .solve(&topology, &leak_scenario("P2", 1.0))
            .unwrap();
        assert!(output.link_flows["P2"] < 55.0);
    }

    #[test]
    fn unknown_pipe_in_perturbation_is_an_error() {
        let topology = topology();
        let err = PropagationSolver
            .solve(&topology, &leak_scenario("P9", 0.5))
            .unwrap_err();
        assert_eq!(err, SolverError::UnknownPipe("P9".into()));
    }

    /// Fails for the first `failures` calls, then succeeds with baselines.
    struct FlakySolver {
        failures: u32,
        calls: AtomicU32,
    }

    impl NetworkSolver for FlakySolver {
        fn solve(
            &self,
            topology: &Topology,
            scenario: &ScenarioSnapshot,
        ) -> Result<SolverOutput, SolverError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SolverError::NonConvergence("flaky".into()));
            }
            PropagationSolver.solve(topology, scenario)
        }
    }

    #[tokio::test]
    async fn failure_reuses_previous_snapshot_and_counts_once() {
        let topology = topology();
        let solver = Arc::new(FlakySolver { failures: 1, calls: AtomicU32::new(0) });
        let mut adapter =
            SolverAdapter::new(solver, Arc::clone(&topology), Duration::from_secs(1));

        let failed = adapter.solve(&leak_scenario("P1", 0.9)).await;
        assert!(failed.error.is_some());
        assert_eq!(adapter.failures_total(), 1);
        assert_eq!(adapter.failure_streak(), 1);
        // Nothing solved yet, so the reused snapshot is the baseline one
        assert_eq!(failed.snapshot.node_pressures["N1"], 52.0);

        let ok = adapter.solve(&leak_scenario("P1", 0.9)).await;
        assert!(ok.error.is_none());
        assert_eq!(adapter.failures_total(), 1);
        assert_eq!(adapter.failure_streak(), 0);
        assert!(ok.snapshot.node_pressures["N1"] < 52.0);
    }

    struct SleepySolver;

    impl NetworkSolver for SleepySolver {
        fn solve(
            &self,
            _topology: &Topology,
            _scenario: &ScenarioSnapshot,
        ) -> Result<SolverOutput, SolverError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(SolverOutput { node_pressures: HashMap::new(), link_flows: HashMap::new() })
        }
    }

    #[tokio::test]
    async fn slow_solver_times_out_as_failure() {
        let topology = topology();
        let mut adapter = SolverAdapter::new(
            Arc::new(SleepySolver),
            Arc::clone(&topology),
            Duration::from_millis(20),
        );

        let outcome = adapter.solve(&ScenarioSnapshot::quiet()).await;
        assert!(matches!(outcome.error, Some(SolverError::Timeout(_))));
        assert_eq!(adapter.failures_total(), 1);
        assert_eq!(outcome.snapshot.node_pressures["N1"], 52.0);
    }

    struct NanSolver;

    impl NetworkSolver for NanSolver {
        fn solve(
            &self,
            _topology: &Topology,
            _scenario: &ScenarioSnapshot,
        ) -> Result<SolverOutput, SolverError> {
            Ok(SolverOutput {
                node_pressures: HashMap::from([("N1".to_string(), f64::NAN)]),
                link_flows: HashMap::new(),
            })
        }
    }

    #[tokio::test]
    async fn non_finite_output_is_malformed() {
        let topology = topology();
        let mut adapter = SolverAdapter::new(
            Arc::new(NanSolver),
            Arc::clone(&topology),
            Duration::from_secs(1),
        );

        let outcome = adapter.solve(&ScenarioSnapshot::quiet()).await;
        assert!(matches!(outcome.error, Some(SolverError::MalformedOutput(_))));
    }
}
