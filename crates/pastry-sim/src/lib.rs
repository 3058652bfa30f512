//! Pastry Cluster Simulation
//!
//! Builds a seeded population of nodes, gives each one its own
//! [`RoutingTable`], and feeds every table every other node. Latency between
//! two nodes is the distance between their points on a 2D plane, so the
//! proximity ordering each table sees is consistent across the cluster.
//!
//! The same seed always produces the same identifiers, regions and
//! latencies.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use pastry_id::NodeId;
use pastry_routing::{Error, Node, Result, RoutingConfig, RoutingTable};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// Regions nodes are spread over.
pub const DEFAULT_REGIONS: &[&str] = &["us-east", "us-west", "eu-central", "ap-south"];

/// Port every simulated node listens on.
const SIM_PORT: u16 = 4000;

/// Side of the latency plane in milliseconds.
const PLANE_MS: f64 = 150.0;

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Nodes in the cluster.
    pub node_count: usize,
    /// Seed for every random choice.
    pub seed: u64,
    /// Random keys checked for an owner after the cluster settles.
    pub probes: usize,
    /// Region names assigned at random.
    pub regions: Vec<String>,
    /// Configuration shared by every table.
    pub routing: RoutingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 100,
            seed: 42,
            probes: 256,
            regions: DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
            routing: RoutingConfig::default(),
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn with_node_count(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_probes(mut self, probes: usize) -> Self {
        self.probes = probes;
        self
    }

    #[must_use]
    pub fn with_routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }
}

/// A generated member of the cluster.
#[derive(Debug, Clone)]
pub struct SimNode {
    pub node: Node,
    /// Position on the latency plane.
    pub position: (f64, f64),
}

impl SimNode {
    /// Round-trip estimate to `other`, at least 1ms.
    pub fn latency_to(&self, other: &SimNode) -> u64 {
        let dx = self.position.0 - other.position.0;
        let dy = self.position.1 - other.position.1;
        (dx.hypot(dy).round() as u64).max(1)
    }
}

/// Aggregate results of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub nodes: usize,
    /// Mean routing table entries per node.
    pub mean_entries: f64,
    /// Mean occupied columns in row 0.
    pub mean_row0_columns: f64,
    pub min_leaf_set: usize,
    pub max_leaf_set: usize,
    pub mean_neighborhood: f64,
    pub probes: usize,
    /// Probed keys no node claimed.
    pub unowned: usize,
    /// Largest number of nodes claiming one key.
    pub max_owners: usize,
}

impl std::fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "nodes:              {}", self.nodes)?;
        writeln!(f, "table entries:      {:.1} avg", self.mean_entries)?;
        writeln!(f, "row 0 columns:      {:.1} avg", self.mean_row0_columns)?;
        writeln!(f, "leaf set size:      {}..={}", self.min_leaf_set, self.max_leaf_set)?;
        writeln!(f, "neighborhood size:  {:.1} avg", self.mean_neighborhood)?;
        write!(
            f,
            "responsibility:     {}/{} keys owned, at most {} owners per key",
            self.probes - self.unowned,
            self.probes,
            self.max_owners
        )
    }
}

/// A generated cluster, ready to run.
pub struct Simulation {
    config: SimulationConfig,
    nodes: Vec<SimNode>,
    rng: StdRng,
}

impl Simulation {
    /// Generate the cluster described by `config`.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.routing.validate()?;
        if config.node_count == 0 {
            return Err(Error::InvalidConfig("node count must be non-zero".into()));
        }
        if config.regions.is_empty() {
            return Err(Error::InvalidConfig("at least one region is required".into()));
        }

        let space = config.routing.space;
        if let Some(ring) = space.ring_size() {
            if (config.node_count as u128) > ring {
                return Err(Error::InvalidConfig(format!(
                    "{} nodes do not fit in a space of {} identifiers",
                    config.node_count, ring
                )));
            }
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut seen = HashSet::with_capacity(config.node_count);
        let mut nodes = Vec::with_capacity(config.node_count);

        while nodes.len() < config.node_count {
            let id = NodeId::from_value(rng.gen(), space);
            if !seen.insert(id) {
                continue;
            }

            let index = nodes.len() as u32;
            let ip = IpAddr::V4(Ipv4Addr::from(0x0a00_0000 | (index + 1)));
            let region = config
                .regions
                .choose(&mut rng)
                .cloned()
                .unwrap_or_default();
            let position = (rng.gen_range(0.0..PLANE_MS), rng.gen_range(0.0..PLANE_MS));

            nodes.push(SimNode {
                node: Node::new(id, ip, ip, SIM_PORT, region),
                position,
            });
        }

        Ok(Self { config, nodes, rng })
    }

    /// The generated nodes, in creation order.
    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// Spawn a table per node, introduce everyone to everyone, and measure.
    ///
    /// Every table is shut down before returning, whether or not the run
    /// succeeded.
    pub async fn run(mut self) -> Result<SimulationReport> {
        let mut tables = Vec::with_capacity(self.nodes.len());
        for member in &self.nodes {
            match RoutingTable::spawn(member.node.clone(), self.config.routing.clone()) {
                Ok(table) => tables.push(table),
                Err(err) => {
                    shutdown_all(&tables);
                    return Err(err);
                }
            }
        }

        let result = self.exercise(&tables).await;
        shutdown_all(&tables);
        result
    }

    async fn exercise(&mut self, tables: &[RoutingTable]) -> Result<SimulationReport> {
        info!(nodes = self.nodes.len(), seed = self.config.seed, "joining cluster");

        for (table, member) in tables.iter().zip(&self.nodes) {
            for peer in &self.nodes {
                if peer.node.id == member.node.id {
                    continue;
                }
                let seen = peer.node.clone().with_proximity(member.latency_to(peer));
                table.insert(seen).await?;
            }
        }

        let mut entries = 0usize;
        let mut row0 = 0usize;
        let mut neighborhood = 0usize;
        let mut min_leaf_set = usize::MAX;
        let mut max_leaf_set = 0usize;

        for table in tables {
            let stats = table.stats().await?;
            debug!(node = %table.origin().id, %stats, "table settled");
            entries += stats.entries;
            row0 += stats.occupied_columns.first().copied().unwrap_or(0);
            neighborhood += stats.neighborhood;
            min_leaf_set = min_leaf_set.min(stats.leaf_set);
            max_leaf_set = max_leaf_set.max(stats.leaf_set);
        }

        let space = self.config.routing.space;
        let mut unowned = 0usize;
        let mut max_owners = 0usize;
        for _ in 0..self.config.probes {
            let key = NodeId::from_value(self.rng.gen(), space);
            let mut owners = 0usize;
            for table in tables {
                if table.is_responsible(key).await? {
                    owners += 1;
                }
            }
            if owners == 0 {
                warn!(%key, "no node claims key");
                unowned += 1;
            }
            max_owners = max_owners.max(owners);
        }

        let n = tables.len() as f64;
        Ok(SimulationReport {
            nodes: tables.len(),
            mean_entries: entries as f64 / n,
            mean_row0_columns: row0 as f64 / n,
            min_leaf_set,
            max_leaf_set,
            mean_neighborhood: neighborhood as f64 / n,
            probes: self.config.probes,
            unowned,
            max_owners,
        })
    }
}

fn shutdown_all(tables: &[RoutingTable]) {
    for table in tables {
        table.shutdown();
    }
}
