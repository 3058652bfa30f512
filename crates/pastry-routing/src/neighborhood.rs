//! The neighborhood set: nodes nearest to us by network proximity.
//!
//! Not consulted for routing decisions. It shares its [`ProximityMetric`]
//! with the routing table so both order peers the same way.

use pastry_id::NodeId;

use crate::node::Node;
use crate::proximity::ProximityMetric;

/// Fixed-capacity set ordered by ascending proximity score.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    origin: Node,
    capacity: usize,
    metric: ProximityMetric,
    members: Vec<Node>,
}

impl Neighborhood {
    /// Empty neighborhood scored relative to `origin`.
    pub fn new(origin: Node, capacity: usize, metric: ProximityMetric) -> Self {
        Self {
            origin,
            capacity,
            metric,
            members: Vec::with_capacity(capacity),
        }
    }

    /// The scoring policy in use.
    pub fn metric(&self) -> ProximityMetric {
        self.metric
    }

    /// Maximum number of members.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Offer a node for membership.
    ///
    /// A node already present is re-scored from the new copy. When full, the
    /// node is admitted only if it scores better than the current worst
    /// member, which is evicted. Returns true if the set changed.
    pub fn consider(&mut self, node: Node) -> bool {
        if node.id == self.origin.id {
            return false;
        }

        let replaced = self.remove(&node.id).is_some();

        let score = self.metric.score(&self.origin, &node);
        if self.members.len() >= self.capacity {
            let worst = match self.members.last() {
                Some(worst) => self.metric.score(&self.origin, worst),
                None => return replaced,
            };
            if score >= worst {
                return replaced;
            }
            self.members.pop();
        }

        let pos = self
            .members
            .partition_point(|m| self.metric.score(&self.origin, m) < score);
        self.members.insert(pos, node);
        true
    }

    /// Drop a member. Returns the stored copy if it was present.
    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        let pos = self.members.iter().position(|n| n.id == *id)?;
        Some(self.members.remove(pos))
    }

    /// Members, nearest first.
    pub fn members(&self) -> &[Node] {
        &self.members
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.members.iter().any(|n| n.id == *id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
