//! Region-aware proximity scoring.
//!
//! A raw latency sample is multiplied by the region penalty when the peer
//! lives in a different region, keeping traffic inside a region where
//! possible. Scores are totally ordered: equal adjusted latencies fall back
//! to the raw sample, then to identifier order, so repeated sorts are stable.
//! Latencies above 2^53 lose precision as `f64`; the raw tie-break keeps the
//! order monotonic in the sample anyway.

use std::cmp::Ordering;

use pastry_id::NodeId;

use crate::config::RoutingConfig;
use crate::error::{Error, Result};
use crate::node::Node;

/// Scoring policy shared by the neighborhood set and the routing table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityMetric {
    region_penalty: f64,
}

impl ProximityMetric {
    /// Create a metric. The penalty must be finite and greater than one.
    pub fn new(region_penalty: f64) -> Result<Self> {
        if !region_penalty.is_finite() || region_penalty <= 1.0 {
            return Err(Error::InvalidConfig(format!(
                "region penalty must be a finite factor greater than 1, got {}",
                region_penalty
            )));
        }
        Ok(Self { region_penalty })
    }

    /// Metric described by a routing configuration.
    pub fn from_config(config: &RoutingConfig) -> Result<Self> {
        Self::new(config.region_penalty)
    }

    /// Multiplier for cross-region peers.
    pub fn region_penalty(&self) -> f64 {
        self.region_penalty
    }

    /// Score `other` as seen from `origin`. Lower is closer.
    pub fn score(&self, origin: &Node, other: &Node) -> ProximityScore {
        let raw = other.proximity as f64;
        let adjusted = if other.same_region(&origin.region) {
            raw
        } else {
            raw * self.region_penalty
        };
        ProximityScore {
            adjusted,
            raw: other.proximity,
            id: other.id,
        }
    }

    /// Order two candidates by their score relative to `origin`.
    pub fn compare(&self, origin: &Node, a: &Node, b: &Node) -> Ordering {
        self.score(origin, a).cmp(&self.score(origin, b))
    }

    /// Sort nearest first.
    pub fn sort(&self, origin: &Node, nodes: &mut [Node]) {
        nodes.sort_by(|a, b| self.compare(origin, a, b));
    }
}

impl Default for ProximityMetric {
    fn default() -> Self {
        Self {
            region_penalty: crate::config::DEFAULT_REGION_PENALTY,
        }
    }
}

/// Region-adjusted latency with raw-latency and identifier tie-breakers.
#[derive(Debug, Clone, Copy)]
pub struct ProximityScore {
    adjusted: f64,
    raw: u64,
    id: NodeId,
}

impl ProximityScore {
    /// Latency after the region penalty.
    pub fn adjusted(&self) -> f64 {
        self.adjusted
    }

    /// Latency sample before the region penalty.
    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// Node the score belongs to.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl PartialEq for ProximityScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ProximityScore {}

impl PartialOrd for ProximityScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProximityScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.adjusted
            .total_cmp(&other.adjusted)
            .then_with(|| self.raw.cmp(&other.raw))
            .then_with(|| self.id.cmp(&other.id))
    }
}
