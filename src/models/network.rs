//! Network topology and per-tick hydraulic state

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

fn default_baseline_pressure() -> f64 {
    52.0
}

fn default_baseline_flow() -> f64 {
    60.0
}

/// A junction, reservoir or tank in the distribution network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default = "default_baseline_pressure")]
    pub baseline_pressure: f64,
}

/// A pipe connecting two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_baseline_flow")]
    pub baseline_flow: f64,
}

/// Static network description, loaded once at process start. Only pressures
/// change per tick; the topology itself is immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<LinkSpec>,
}

impl Topology {
    /// Load and validate a topology from a JSON network-description file.
    /// Failure here is a startup precondition, not a runtime error.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read topology file {}", path.display()))?;
        let topology: Topology = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse topology file {}", path.display()))?;
        topology.validate()?;
        Ok(topology)
    }

    /// Validate referential integrity: every link endpoint must be a known
    /// node and ids must be unique.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.nodes.is_empty() {
            anyhow::bail!("topology has no nodes");
        }

        let mut node_ids = std::collections::HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                anyhow::bail!("duplicate node id: {}", node.id);
            }
        }

        let mut link_ids = std::collections::HashSet::new();
        for link in &self.links {
            if !link_ids.insert(link.id.as_str()) {
                anyhow::bail!("duplicate link id: {}", link.id);
            }
            if !node_ids.contains(link.source.as_str()) {
                anyhow::bail!("link {} references unknown source node {}", link.id, link.source);
            }
            if !node_ids.contains(link.target.as_str()) {
                anyhow::bail!("link {} references unknown target node {}", link.id, link.target);
            }
        }

        Ok(())
    }

    pub fn has_pipe(&self, pipe_id: &str) -> bool {
        self.links.iter().any(|l| l.id == pipe_id)
    }

    pub fn pipe(&self, pipe_id: &str) -> Option<&LinkSpec> {
        self.links.iter().find(|l| l.id == pipe_id)
    }

    /// Baseline pressure per node, key-ordered for deterministic iteration.
    pub fn baseline_pressures(&self) -> BTreeMap<String, f64> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.baseline_pressure))
            .collect()
    }

    pub fn baseline_flows(&self) -> BTreeMap<String, f64> {
        self.links
            .iter()
            .map(|l| (l.id.clone(), l.baseline_flow))
            .collect()
    }

    /// Undirected adjacency over nodes, for propagation models.
    pub fn adjacency(&self) -> HashMap<String, Vec<String>> {
        let mut graph: HashMap<String, Vec<String>> =
            self.nodes.iter().map(|n| (n.id.clone(), Vec::new())).collect();
        for link in &self.links {
            if graph.contains_key(&link.source) && graph.contains_key(&link.target) {
                graph.get_mut(&link.source).unwrap().push(link.target.clone());
                graph.get_mut(&link.target).unwrap().push(link.source.clone());
            }
        }
        graph
    }
}

/// Per-tick result from the network solver, normalized for the rest of the
/// core: pressures for every topology node, flows where available.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub node_pressures: BTreeMap<String, f64>,
    pub link_flows: BTreeMap<String, f64>,
}

impl NetworkSnapshot {
    /// Snapshot at topology baselines, used before the first solve succeeds.
    pub fn baseline(topology: &Topology) -> Self {
        Self {
            node_pressures: topology.baseline_pressures(),
            link_flows: topology.baseline_flows(),
        }
    }
}
