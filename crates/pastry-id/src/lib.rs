//! Pastry Identifier Space
//!
//! Fixed-length digit-string identifiers on a circular space, and the two
//! metrics the overlay is built on.
//!
//! # Metrics
//!
//! - **Shared prefix length**: how many leading digits two identifiers have
//!   in common. Selects the routing table row.
//! - **Circular distance**: the shorter way round a ring of `base^length`
//!   positions. Orders the leaf set.
//!
//! Both are pure and total: every pair of identifiers has an answer, and an
//! identifier compared with itself gives `length` and `0` respectively.
//!
//! # Example
//!
//! ```
//! use pastry_id::{IdSpace, NodeId};
//!
//! let space = IdSpace::new(16, 4).unwrap();
//! let me = NodeId::parse("0000", space).unwrap();
//! let peer = NodeId::parse("0A12", space).unwrap();
//!
//! assert_eq!(me.shared_prefix_length(&peer), 1);
//! assert_eq!(peer.digit(1), Some(0xA));
//! ```

mod error;
mod id;
mod space;

pub use error::{IdError, Result};
pub use id::NodeId;
pub use space::{IdSpace, DEFAULT_BASE, DEFAULT_LENGTH, MAX_BITS};
