//! Pastry Routing State
//!
//! The per-node state a Pastry overlay routes with: a prefix routing table, a
//! leaf set and a neighborhood set, all owned by one background worker.
//!
//! # Structures
//!
//! - **Routing table**: `L` rows by `B` columns. Row `r` holds peers sharing
//!   exactly `r` leading digits with us, column `c` those whose next digit is
//!   `c`. Columns are unbounded and ordered by proximity.
//! - **Leaf set**: the numerically closest peers on each side of us, kept by
//!   circular distance. Decides whether a key is ours.
//! - **Neighborhood set**: the peers nearest by network proximity.
//!
//! # Proximity
//!
//! Latency to peers in another region is multiplied by a configurable
//! penalty before comparison. Ties fall back to identifier order, so every
//! column has one deterministic order.
//!
//! # Concurrency
//!
//! [`RoutingTable`] is a cloneable handle. Every mutation and query is a
//! message to the worker, which applies them one at a time. Queries wait at
//! most [`RoutingConfig::lookup_timeout`] for an answer.
//!
//! # Example
//!
//! ```
//! use std::net::{IpAddr, Ipv4Addr};
//! use pastry_id::{IdSpace, NodeId};
//! use pastry_routing::{Node, RoutingConfig, RoutingTable};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pastry_routing::Result<()> {
//! let space = IdSpace::new(16, 4)?;
//! let config = RoutingConfig::default().with_space(space);
//! let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
//!
//! let me = Node::new(NodeId::parse("0000", space)?, ip, ip, 9000, "eu");
//! let table = RoutingTable::spawn(me, config)?;
//!
//! let peer = Node::new(NodeId::parse("0A12", space)?, ip, ip, 9001, "eu").with_proximity(12);
//! table.insert(peer).await?;
//!
//! let found = table.get_node(1, 0xA, 0).await?;
//! assert_eq!(found.port, 9001);
//! assert!(table.get_node(1, 0xA, 1).await.unwrap_err().is_out_of_range());
//!
//! table.shutdown();
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod leaf_set;
mod neighborhood;
mod node;
mod proximity;
mod routing_table;
mod table;

pub use config::{
    RoutingConfig, DEFAULT_INBOX_CAPACITY, DEFAULT_LEAF_HALF_CAPACITY,
    DEFAULT_LOOKUP_TIMEOUT, DEFAULT_NEIGHBORHOOD_CAPACITY, DEFAULT_REGION_PENALTY,
};
pub use error::{Error, Result};
pub use leaf_set::LeafSet;
pub use neighborhood::Neighborhood;
pub use node::Node;
pub use proximity::{ProximityMetric, ProximityScore};
pub use routing_table::{RoutingTable, TableStats, WorkerState};
pub use table::{Placement, PrefixTable};

pub use pastry_id::{IdSpace, NodeId};
