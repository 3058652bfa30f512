//! Prefix table storage.
//!
//! `rows = L` (one per shared-prefix length) by `cols = B` (one per next
//! digit). A node sharing `r` leading digits with us, whose digit at `r` is
//! `c`, lives in `[r][c]`. Columns have no fixed capacity and are kept in
//! ascending proximity order.
//!
//! This type is plain data. The routing worker owns the only instance.

use pastry_id::NodeId;

use crate::error::{Error, Result};
use crate::node::Node;
use crate::proximity::ProximityMetric;

/// Where an insert landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// New entry.
    Inserted { row: usize, col: usize, entry: usize },
    /// Existing entry replaced and re-ranked.
    Updated { row: usize, col: usize, entry: usize },
    /// Our own identifier, or one from another space; not stored.
    Ignored,
}

/// Routing table rows, columns and entries.
#[derive(Debug, Clone)]
pub struct PrefixTable {
    origin: Node,
    metric: ProximityMetric,
    rows: Vec<Vec<Vec<Node>>>,
}

impl PrefixTable {
    /// Empty table for `origin`, sized by its identifier space.
    pub fn new(origin: Node, metric: ProximityMetric) -> Self {
        let space = origin.id.space();
        let rows = (0..space.length())
            .map(|_| vec![Vec::new(); space.base() as usize])
            .collect();
        Self {
            origin,
            metric,
            rows,
        }
    }

    /// The node this table belongs to.
    pub fn origin(&self) -> &Node {
        &self.origin
    }

    /// Number of rows (`L`).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns per row (`B`).
    pub fn col_count(&self) -> usize {
        self.origin.id.space().base() as usize
    }

    /// Row and column `id` belongs in, or `None` for our own identifier or
    /// one from another space.
    pub fn coordinates(&self, id: &NodeId) -> Option<(usize, usize)> {
        if id.space() != self.origin.id.space() {
            return None;
        }
        let row = self.origin.id.shared_prefix_length(id);
        if row >= self.row_count() {
            return None;
        }
        let col = id.digit(row)? as usize;
        Some((row, col))
    }

    /// Insert or update a node, keeping its column in proximity order.
    pub fn insert(&mut self, node: Node) -> Placement {
        let Some((row, col)) = self.coordinates(&node.id) else {
            return Placement::Ignored;
        };

        let metric = self.metric;
        let origin = &self.origin;
        let score = metric.score(origin, &node);
        let column = &mut self.rows[row][col];

        let existing = column.iter().position(|n| n.id == node.id);
        if let Some(pos) = existing {
            column.remove(pos);
        }

        let entry = column.partition_point(|n| metric.score(origin, n) < score);
        column.insert(entry, node);

        if existing.is_some() {
            Placement::Updated { row, col, entry }
        } else {
            Placement::Inserted { row, col, entry }
        }
    }

    /// Remove the entry for `id`, wherever it sits.
    pub fn evict(&mut self, id: &NodeId) -> Option<Node> {
        let (row, col) = self.coordinates(id)?;
        let column = &mut self.rows[row][col];
        let pos = column.iter().position(|n| n.id == *id)?;
        Some(column.remove(pos))
    }

    /// Point lookup. Any index outside the current bounds is `OutOfRange`.
    pub fn get(&self, row: usize, col: usize, entry: usize) -> Result<Node> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.get(entry))
            .cloned()
            .ok_or(Error::OutOfRange { row, col, entry })
    }

    /// A whole column, nearest first.
    pub fn column(&self, row: usize, col: usize) -> Option<&[Node]> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(Vec::as_slice)
    }

    /// Coordinates of the entry holding `id`.
    pub fn position_of(&self, id: &NodeId) -> Option<(usize, usize, usize)> {
        let (row, col) = self.coordinates(id)?;
        let entry = self.rows[row][col].iter().position(|n| n.id == *id)?;
        Some((row, col, entry))
    }

    /// Total entries across all columns.
    pub fn len(&self) -> usize {
        self.rows.iter().flatten().map(Vec::len).sum()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of non-empty columns in each row.
    pub fn occupied_columns(&self) -> Vec<usize> {
        self.rows
            .iter()
            .map(|row| row.iter().filter(|c| !c.is_empty()).count())
            .collect()
    }
}
