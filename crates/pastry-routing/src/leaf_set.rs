//! The leaf set: nodes nearest to us by identifier.
//!
//! Members are split by plain numeric comparison with our own identifier:
//! smaller identifiers go left, larger go right. Within a half, members are
//! ranked by circular distance, so a node just across the wrap point is kept
//! ahead of a numerically nearer but circularly farther one.

use pastry_id::NodeId;

use crate::node::Node;

/// Circularly nearest nodes on each side of `origin`.
#[derive(Debug, Clone)]
pub struct LeafSet {
    origin: NodeId,
    half_capacity: usize,
    /// Identifiers below ours, nearest first.
    left: Vec<Node>,
    /// Identifiers above ours, nearest first.
    right: Vec<Node>,
}

impl LeafSet {
    /// Empty leaf set around `origin`.
    pub fn new(origin: NodeId, half_capacity: usize) -> Self {
        Self {
            origin,
            half_capacity,
            left: Vec::with_capacity(half_capacity),
            right: Vec::with_capacity(half_capacity),
        }
    }

    /// Our own identifier.
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// Capacity of each half.
    pub fn half_capacity(&self) -> usize {
        self.half_capacity
    }

    /// Offer a node for membership.
    ///
    /// Returns true if the set changed: the node was added (possibly evicting
    /// the farthest member of its half) or an existing copy was replaced.
    pub fn consider(&mut self, node: Node) -> bool {
        if node.id == self.origin {
            return false;
        }
        let origin = self.origin;
        let capacity = self.half_capacity;
        let half = if node.id < origin {
            &mut self.left
        } else {
            &mut self.right
        };
        admit(half, origin, capacity, node)
    }

    /// Drop a member. Returns the stored copy if it was present.
    pub fn remove(&mut self, id: &NodeId) -> Option<Node> {
        for half in [&mut self.left, &mut self.right] {
            if let Some(pos) = half.iter().position(|n| n.id == *id) {
                return Some(half.remove(pos));
            }
        }
        None
    }

    /// Left half, nearest first.
    pub fn left(&self) -> &[Node] {
        &self.left
    }

    /// Right half, nearest first.
    pub fn right(&self) -> &[Node] {
        &self.right
    }

    /// Snapshot of both halves.
    pub fn members(&self) -> Vec<Node> {
        self.left.iter().chain(self.right.iter()).cloned().collect()
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.left.iter().chain(self.right.iter()).any(|n| n.id == *id)
    }

    /// Total members across both halves.
    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    /// True when neither half has members.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    /// Whether `id` falls inside the arc spanned by the leaf set's extremes.
    ///
    /// The arc runs clockwise from the member farthest counter-clockwise of
    /// us to the member farthest clockwise of us, passing through our own
    /// identifier. Bounds are inclusive. With no members we are alone on the
    /// ring and responsible for everything.
    pub fn is_responsible(&self, id: &NodeId) -> bool {
        if self.is_empty() {
            return true;
        }

        let (mut low, mut low_dist) = (self.origin, 0u128);
        let (mut high, mut high_dist) = (self.origin, 0u128);

        for member in self.left.iter().chain(self.right.iter()) {
            let clockwise = self.origin.clockwise_distance(&member.id);
            let counter = member.id.clockwise_distance(&self.origin);
            if clockwise <= counter {
                if clockwise > high_dist {
                    high = member.id;
                    high_dist = clockwise;
                }
            } else if counter > low_dist {
                low = member.id;
                low_dist = counter;
            }
        }

        low.clockwise_distance(id) <= low.clockwise_distance(&high)
    }
}

fn rank(origin: &NodeId, id: &NodeId) -> (u128, NodeId) {
    (origin.circular_distance(id), *id)
}

fn admit(half: &mut Vec<Node>, origin: NodeId, capacity: usize, node: Node) -> bool {
    // Distance depends only on the id, so a replaced copy keeps its slot.
    if let Some(existing) = half.iter_mut().find(|n| n.id == node.id) {
        *existing = node;
        return true;
    }

    let key = rank(&origin, &node.id);
    if half.len() >= capacity {
        match half.last() {
            Some(farthest) if key < rank(&origin, &farthest.id) => {
                half.pop();
            }
            _ => return false,
        }
    }

    let pos = half.partition_point(|n| rank(&origin, &n.id) < key);
    half.insert(pos, node);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pastry_id::IdSpace;
    use std::net::{IpAddr, Ipv4Addr};

    fn space() -> IdSpace {
        IdSpace::new(16, 4).unwrap()
    }

    fn id(text: &str) -> NodeId {
        NodeId::parse(text, space()).unwrap()
    }

    fn node(text: &str) -> Node {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Node::new(id(text), ip, ip, 9000, "a")
    }

    fn ids(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn splits_by_numeric_order() {
        let mut leaves = LeafSet::new(id("8000"), 4);
        assert!(leaves.consider(node("7000")));
        assert!(leaves.consider(node("9000")));
        assert!(leaves.consider(node("7f00")));

        assert_eq!(ids(leaves.left()), vec!["7f00", "7000"]);
        assert_eq!(ids(leaves.right()), vec!["9000"]);
        assert_eq!(leaves.len(), 3);
    }

    #[test]
    fn ignores_self() {
        let mut leaves = LeafSet::new(id("8000"), 4);
        assert!(!leaves.consider(node("8000")));
        assert!(leaves.is_empty());
    }

    #[test]
    fn full_half_evicts_farthest() {
        let mut leaves = LeafSet::new(id("8000"), 2);
        leaves.consider(node("8100"));
        leaves.consider(node("8200"));
        assert_eq!(ids(leaves.right()), vec!["8100", "8200"]);

        // Closer than the farthest: evicts exactly 8200.
        assert!(leaves.consider(node("8010")));
        assert_eq!(ids(leaves.right()), vec!["8010", "8100"]);
        assert!(!leaves.contains(&id("8200")));

        // Farther than everyone: rejected.
        assert!(!leaves.consider(node("9000")));
        assert_eq!(leaves.right().len(), 2);
    }

    #[test]
    fn halves_never_exceed_capacity() {
        let mut leaves = LeafSet::new(id("8000"), 3);
        for value in (0u128..0x10000).step_by(0x0111) {
            leaves.consider(node(&format!("{:04x}", value)));
            assert!(leaves.left().len() <= 3);
            assert!(leaves.right().len() <= 3);
        }
        assert_eq!(leaves.left().len(), 3);
        assert_eq!(leaves.right().len(), 3);
    }

    #[test]
    fn retention_uses_circular_distance() {
        // 0xfff0 is numerically above us (right half) but only 0x20 away
        // going the short way round.
        let mut leaves = LeafSet::new(id("0010"), 2);
        leaves.consider(node("0100"));
        leaves.consider(node("0050"));
        assert!(leaves.consider(node("fff0")));

        assert_eq!(ids(leaves.right()), vec!["fff0", "0050"]);
    }

    #[test]
    fn reconsider_replaces_copy() {
        let mut leaves = LeafSet::new(id("8000"), 2);
        leaves.consider(node("8100").with_proximity(5));
        assert!(leaves.consider(node("8100").with_proximity(9)));
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves.right()[0].proximity, 9);
    }

    #[test]
    fn remove_member() {
        let mut leaves = LeafSet::new(id("8000"), 2);
        leaves.consider(node("7000"));
        leaves.consider(node("9000"));

        assert!(leaves.remove(&id("7000")).is_some());
        assert!(leaves.remove(&id("7000")).is_none());
        assert_eq!(ids(&leaves.members()), vec!["9000"]);
    }

    #[test]
    fn responsible_alone() {
        let leaves = LeafSet::new(id("8000"), 2);
        assert!(leaves.is_responsible(&id("0000")));
        assert!(leaves.is_responsible(&id("ffff")));
    }

    #[test]
    fn responsible_within_extremes() {
        let mut leaves = LeafSet::new(id("8000"), 2);
        for text in ["7000", "7800", "8800", "9000"] {
            leaves.consider(node(text));
        }

        assert!(leaves.is_responsible(&id("8000")));
        assert!(leaves.is_responsible(&id("7000")));
        assert!(leaves.is_responsible(&id("9000")));
        assert!(leaves.is_responsible(&id("7abc")));
        assert!(!leaves.is_responsible(&id("6fff")));
        assert!(!leaves.is_responsible(&id("9001")));
    }

    #[test]
    fn responsible_across_wrap() {
        let mut leaves = LeafSet::new(id("0010"), 3);
        for text in ["fff0", "0000", "0020", "0030"] {
            leaves.consider(node(text));
        }

        assert!(leaves.is_responsible(&id("fff8")));
        assert!(leaves.is_responsible(&id("0025")));
        assert!(!leaves.is_responsible(&id("ff00")));
        assert!(!leaves.is_responsible(&id("0040")));
    }
}
