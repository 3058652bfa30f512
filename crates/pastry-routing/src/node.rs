//! Cluster members as seen by the local node.

use std::net::{IpAddr, SocketAddr};

use pastry_id::NodeId;

/// A server in the cluster.
///
/// Nodes are value snapshots. Containers store their own copy, and a new
/// proximity measurement is applied by replacing that copy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Position on the identifier ring.
    pub id: NodeId,

    /// Address used by nodes in the same region.
    pub local_ip: IpAddr,

    /// Address used by nodes in other regions.
    pub global_ip: IpAddr,

    /// Listening port.
    pub port: u16,

    /// Locality label (e.g. a datacenter).
    pub region: String,

    /// Raw latency sample, not adjusted for region.
    pub proximity: u64,
}

impl Node {
    /// Create a node with no proximity measurement yet.
    pub fn new(
        id: NodeId,
        local_ip: IpAddr,
        global_ip: IpAddr,
        port: u16,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id,
            local_ip,
            global_ip,
            port,
            region: region.into(),
            proximity: 0,
        }
    }

    /// Copy of this node carrying a new latency sample.
    #[must_use]
    pub fn with_proximity(mut self, proximity: u64) -> Self {
        self.proximity = proximity;
        self
    }

    /// Whether `region` matches ours.
    pub fn same_region(&self, region: &str) -> bool {
        self.region == region
    }

    /// The address a caller in `region` should dial.
    pub fn address_from(&self, region: &str) -> SocketAddr {
        let ip = if self.same_region(region) {
            self.local_ip
        } else {
            self.global_ip
        };
        SocketAddr::new(ip, self.port)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.region, self.port)
    }
}
