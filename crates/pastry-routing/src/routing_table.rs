//! The routing table actor.
//!
//! ## Actor Architecture
//!
//! - [`RoutingTable`]: cloneable handle used by every caller
//! - `RoutingWorker`: the only owner of the prefix table, leaf set and
//!   neighborhood set
//!
//! Callers never touch the storage. Inserts, evictions and lookups are sent
//! as commands through one bounded inbox and processed one at a time, so the
//! three structures observe every change in the same order without a lock.
//!
//! ## Shutdown
//!
//! [`RoutingTable::shutdown`] flips the shared [`WorkerState`] to `Stopped`.
//! Accessors check the state before sending. The worker closes its inbox and
//! drops whatever is still queued, so callers blocked on a reply resolve to
//! [`Error::Stopped`] instead of hanging.

use std::sync::Arc;
use std::time::Duration;

use pastry_id::{IdError, NodeId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::RoutingConfig;
use crate::error::{Error, Result};
use crate::leaf_set::LeafSet;
use crate::neighborhood::Neighborhood;
use crate::node::Node;
use crate::proximity::ProximityMetric;
use crate::table::{Placement, PrefixTable};

/// Lifecycle of the owning worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Processing commands.
    Running,
    /// Terminal. Every request is rejected.
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Point-in-time summary of the worker's structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    /// Entries across all routing table columns.
    pub entries: usize,
    /// Non-empty columns per row.
    pub occupied_columns: Vec<usize>,
    /// Leaf set members (both halves).
    pub leaf_set: usize,
    /// Neighborhood members.
    pub neighborhood: usize,
}

impl std::fmt::Display for TableStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows_in_use = self.occupied_columns.iter().filter(|&&c| c > 0).count();
        write!(
            f,
            "RoutingTable: {} entries over {} rows, {} leaves, {} neighbors",
            self.entries, rows_in_use, self.leaf_set, self.neighborhood
        )
    }
}

enum Command {
    // State updates
    Insert(Node),
    Evict(NodeId),

    // Queries
    GetNode {
        row: usize,
        col: usize,
        entry: usize,
        reply: oneshot::Sender<Result<Node>>,
    },
    Column {
        row: usize,
        col: usize,
        reply: oneshot::Sender<Option<Vec<Node>>>,
    },
    LeafSetMembers(oneshot::Sender<Vec<Node>>),
    IsResponsible(NodeId, oneshot::Sender<bool>),
    NeighborhoodMembers(oneshot::Sender<Vec<Node>>),
    Stats(oneshot::Sender<TableStats>),
}

/// Handle to a routing table owned by a background worker.
///
/// Cheap to clone; all clones talk to the same worker. Dropping every handle
/// stops the worker.
#[derive(Clone)]
pub struct RoutingTable {
    origin: Node,
    lookup_timeout: Duration,
    cmd_tx: mpsc::Sender<Command>,
    state: Arc<watch::Sender<WorkerState>>,
}

struct RoutingWorker {
    table: PrefixTable,
    leaf_set: LeafSet,
    neighborhood: Neighborhood,
    state: Arc<watch::Sender<WorkerState>>,
}

impl RoutingTable {
    /// Start a worker for `origin` on the current tokio runtime.
    pub fn spawn(origin: Node, config: RoutingConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        let (handle, worker, cmd_rx) = Self::build(origin, config)?;
        runtime.spawn(worker.run(cmd_rx));
        Ok(handle)
    }

    fn build(
        origin: Node,
        config: RoutingConfig,
    ) -> Result<(Self, RoutingWorker, mpsc::Receiver<Command>)> {
        config.validate()?;
        if origin.id.space() != config.space {
            return Err(Error::InvalidConfig(format!(
                "origin id is in space {}, config expects {}",
                origin.id.space(),
                config.space
            )));
        }

        let metric = ProximityMetric::from_config(&config)?;
        let (cmd_tx, cmd_rx) = mpsc::channel(config.inbox_capacity);
        let (state_tx, _) = watch::channel(WorkerState::Running);
        let state = Arc::new(state_tx);

        let worker = RoutingWorker {
            table: PrefixTable::new(origin.clone(), metric),
            leaf_set: LeafSet::new(origin.id, config.leaf_half_capacity),
            neighborhood: Neighborhood::new(origin.clone(), config.neighborhood_capacity, metric),
            state: Arc::clone(&state),
        };

        let handle = Self {
            origin,
            lookup_timeout: config.lookup_timeout,
            cmd_tx,
            state,
        };

        Ok((handle, worker, cmd_rx))
    }

    /// The node this table belongs to.
    pub fn origin(&self) -> &Node {
        &self.origin
    }

    /// Current worker state.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// True until shutdown.
    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    /// Queue a node for insertion.
    ///
    /// Returns once the request is enqueued. Our own identifier is dropped
    /// without being sent. Fails with `InvalidId` for an identifier from
    /// another space, `Stopped` after shutdown, or `Timeout` if the inbox
    /// stays full past the lookup deadline.
    pub async fn insert(&self, node: Node) -> Result<()> {
        self.ensure_running()?;
        self.ensure_space(&node.id)?;
        if node.id == self.origin.id {
            trace!(node = %node.id, "dropping insert of own id");
            return Ok(());
        }
        self.enqueue("Node insertion", Command::Insert(node)).await
    }

    /// Queue removal of `id` from every structure. A no-op if absent.
    pub async fn evict(&self, id: NodeId) -> Result<()> {
        self.ensure_running()?;
        self.ensure_space(&id)?;
        self.enqueue("Node eviction", Command::Evict(id)).await
    }

    /// Fetch entry `entry` of column `col` in row `row`.
    ///
    /// `OutOfRange` means there is no such slot right now. `Timeout` means the
    /// worker did not answer within the lookup deadline.
    pub async fn get_node(&self, row: usize, col: usize, entry: usize) -> Result<Node> {
        self.request("Node retrieval", |reply| Command::GetNode {
            row,
            col,
            entry,
            reply,
        })
        .await?
    }

    /// Snapshot of a whole column, nearest first.
    pub async fn column(&self, row: usize, col: usize) -> Result<Vec<Node>> {
        self.request("Column retrieval", |reply| Command::Column { row, col, reply })
            .await?
            .ok_or(Error::OutOfRange { row, col, entry: 0 })
    }

    /// Snapshot of the leaf set, left half then right half.
    pub async fn leaf_set_members(&self) -> Result<Vec<Node>> {
        self.request("Leaf set retrieval", Command::LeafSetMembers).await
    }

    /// Whether we are the final destination for `id`.
    pub async fn is_responsible(&self, id: NodeId) -> Result<bool> {
        self.ensure_space(&id)?;
        self.request("Responsibility check", |reply| Command::IsResponsible(id, reply))
            .await
    }

    /// Snapshot of the neighborhood set, nearest first.
    pub async fn neighborhood_members(&self) -> Result<Vec<Node>> {
        self.request("Neighborhood retrieval", Command::NeighborhoodMembers)
            .await
    }

    /// Summary counts.
    pub async fn stats(&self) -> Result<TableStats> {
        self.request("Stats retrieval", Command::Stats).await
    }

    /// Stop the worker. Idempotent.
    pub fn shutdown(&self) {
        let previous = self.state.send_replace(WorkerState::Stopped);
        if previous == WorkerState::Running {
            info!(origin = %self.origin.id, "routing table shutting down");
        }
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state() {
            WorkerState::Running => Ok(()),
            WorkerState::Stopped => Err(Error::Stopped),
        }
    }

    fn ensure_space(&self, id: &NodeId) -> Result<()> {
        let expected = self.origin.id.space();
        if id.space() == expected {
            return Ok(());
        }
        Err(IdError::SpaceMismatch {
            expected,
            actual: id.space(),
        }
        .into())
    }

    async fn enqueue(&self, action: &'static str, cmd: Command) -> Result<()> {
        match timeout(self.lookup_timeout, self.cmd_tx.send(cmd)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::Stopped),
            Err(_) => {
                warn!(action, timeout = ?self.lookup_timeout, "routing inbox full");
                Err(Error::timeout(action, self.lookup_timeout))
            }
        }
    }

    async fn request<T, F>(&self, action: &'static str, make: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        self.ensure_running()?;

        let (tx, rx) = oneshot::channel();
        let exchange = async {
            self.cmd_tx
                .send(make(tx))
                .await
                .map_err(|_| Error::Stopped)?;
            rx.await.map_err(|_| Error::Stopped)
        };

        match timeout(self.lookup_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(action, timeout = ?self.lookup_timeout, "routing worker did not answer in time");
                Err(Error::timeout(action, self.lookup_timeout))
            }
        }
    }
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("origin", &self.origin.id)
            .field("state", &self.state())
            .finish()
    }
}

impl RoutingWorker {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        info!(origin = %self.table.origin().id, "routing worker started");
        let mut state_rx = self.state.subscribe();

        loop {
            if *state_rx.borrow_and_update() == WorkerState::Stopped {
                break;
            }
            tokio::select! {
                biased;
                _ = state_rx.changed() => continue,
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }

        self.state.send_replace(WorkerState::Stopped);

        // Queued requests are rejected: dropping a reply slot wakes its caller.
        cmd_rx.close();
        let mut rejected = 0usize;
        while cmd_rx.try_recv().is_ok() {
            rejected += 1;
        }

        info!(
            origin = %self.table.origin().id,
            entries = self.table.len(),
            rejected,
            "routing worker stopped"
        );
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Insert(node) => self.insert(node),
            Command::Evict(id) => self.evict(&id),
            Command::GetNode {
                row,
                col,
                entry,
                reply,
            } => {
                if reply.is_closed() {
                    trace!(row, col, entry, "lookup abandoned by caller");
                    return;
                }
                let result = self.table.get(row, col, entry);
                trace!(row, col, entry, found = result.is_ok(), "node lookup");
                let _ = reply.send(result);
            }
            Command::Column { row, col, reply } => {
                let column = self.table.column(row, col).map(<[Node]>::to_vec);
                let _ = reply.send(column);
            }
            Command::LeafSetMembers(reply) => {
                let _ = reply.send(self.leaf_set.members());
            }
            Command::IsResponsible(id, reply) => {
                let _ = reply.send(self.leaf_set.is_responsible(&id));
            }
            Command::NeighborhoodMembers(reply) => {
                let _ = reply.send(self.neighborhood.members().to_vec());
            }
            Command::Stats(reply) => {
                let _ = reply.send(TableStats {
                    entries: self.table.len(),
                    occupied_columns: self.table.occupied_columns(),
                    leaf_set: self.leaf_set.len(),
                    neighborhood: self.neighborhood.len(),
                });
            }
        }
    }

    fn insert(&mut self, node: Node) {
        let id = node.id;
        let placement = self.table.insert(node.clone());
        if placement == Placement::Ignored {
            return;
        }
        let leaf = self.leaf_set.consider(node.clone());
        let near = self.neighborhood.consider(node);
        debug!(
            node = %id,
            ?placement,
            leaf_set = leaf,
            neighborhood = near,
            "node inserted"
        );
    }

    fn evict(&mut self, id: &NodeId) {
        let table = self.table.evict(id).is_some();
        let leaf = self.leaf_set.remove(id).is_some();
        let near = self.neighborhood.remove(id).is_some();
        if table || leaf || near {
            debug!(node = %id, table, leaf_set = leaf, neighborhood = near, "node evicted");
        }
    }
}

impl Drop for RoutingWorker {
    fn drop(&mut self) {
        // Also reached when a command handler panics.
        self.state.send_replace(WorkerState::Stopped);
    }
}

#[cfg(test)]
impl RoutingTable {
    /// A handle whose worker is built but never polled.
    fn detached(
        origin: Node,
        config: RoutingConfig,
    ) -> (Self, RoutingWorker, mpsc::Receiver<Command>) {
        Self::build(origin, config).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pastry_id::IdSpace;
    use std::net::{IpAddr, Ipv4Addr};

    fn space() -> IdSpace {
        IdSpace::new(16, 4).unwrap()
    }

    fn config() -> RoutingConfig {
        RoutingConfig::default()
            .with_space(space())
            .with_leaf_half_capacity(2)
            .with_neighborhood_capacity(3)
    }

    fn node(id: &str, region: &str, proximity: u64) -> Node {
        let id = NodeId::parse(id, space()).unwrap();
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Node::new(id, ip, ip, 9000, region).with_proximity(proximity)
    }

    fn id(text: &str) -> NodeId {
        NodeId::parse(text, space()).unwrap()
    }

    #[tokio::test]
    async fn insert_then_lookup() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();
        table.insert(node("0a12", "a", 10)).await.unwrap();

        let found = table.get_node(1, 0xa, 0).await.unwrap();
        assert_eq!(found.id, id("0a12"));
    }

    #[tokio::test]
    async fn lookups_outside_bounds() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();
        table.insert(node("0a12", "a", 10)).await.unwrap();
        table.insert(node("0a34", "a", 5)).await.unwrap();

        assert!(table.get_node(40, 0, 0).await.unwrap_err().is_out_of_range());
        assert!(table.get_node(4, 0, 0).await.unwrap_err().is_out_of_range());
        assert!(table.get_node(1, 16, 0).await.unwrap_err().is_out_of_range());
        assert_eq!(
            table.get_node(1, 0xa, 2).await,
            Err(Error::OutOfRange { row: 1, col: 0xa, entry: 2 })
        );

        // The worker keeps serving after rejecting bad indices.
        assert!(table.get_node(1, 0xa, 1).await.is_ok());
    }

    #[tokio::test]
    async fn own_id_is_dropped() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();
        table.insert(node("0000", "a", 1)).await.unwrap();

        let stats = table.stats().await.unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.leaf_set, 0);
        assert_eq!(stats.neighborhood, 0);
    }

    #[tokio::test]
    async fn insert_feeds_all_structures() {
        let table = RoutingTable::spawn(node("8000", "a", 0), config()).unwrap();
        for (text, proximity) in [("7000", 40), ("7f00", 30), ("8100", 20), ("9000", 10), ("0001", 5)] {
            table.insert(node(text, "a", proximity)).await.unwrap();
        }

        let stats = table.stats().await.unwrap();
        assert_eq!(stats.entries, 5);
        assert_eq!(stats.leaf_set, 4);
        assert_eq!(stats.neighborhood, 3);

        let leaves: Vec<_> = table.leaf_set_members().await.unwrap().iter().map(|n| n.id).collect();
        assert_eq!(leaves, vec![id("7f00"), id("7000"), id("8100"), id("9000")]);

        let near: Vec<_> = table
            .neighborhood_members()
            .await
            .unwrap()
            .iter()
            .map(|n| n.proximity)
            .collect();
        assert_eq!(near, vec![5, 10, 20]);

        assert!(table.is_responsible(id("7abc")).await.unwrap());
        assert!(!table.is_responsible(id("0002")).await.unwrap());
    }

    #[tokio::test]
    async fn evict_clears_every_structure() {
        let table = RoutingTable::spawn(node("8000", "a", 0), config()).unwrap();
        table.insert(node("8100", "a", 20)).await.unwrap();
        table.evict(id("8100")).await.unwrap();
        table.evict(id("8200")).await.unwrap();

        let stats = table.stats().await.unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.leaf_set, 0);
        assert_eq!(stats.neighborhood, 0);
    }

    #[tokio::test]
    async fn column_snapshot() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();
        table.insert(node("0a12", "a", 10)).await.unwrap();
        table.insert(node("0a34", "b", 4)).await.unwrap(); // 8 after penalty

        let column = table.column(1, 0xa).await.unwrap();
        let ids: Vec<_> = column.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![id("0a34"), id("0a12")]);

        assert!(table.column(1, 0xb).await.unwrap().is_empty());
        assert!(table.column(9, 0).await.unwrap_err().is_out_of_range());
    }

    #[tokio::test]
    async fn concurrent_inserts_all_land() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();

        let mut tasks = Vec::new();
        for value in 1u128..=64 {
            let table = table.clone();
            tasks.push(tokio::spawn(async move {
                let id = NodeId::from_value(value * 977, space());
                let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
                table
                    .insert(Node::new(id, ip, ip, 9000, "a").with_proximity(value as u64))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(table.stats().await.unwrap().entries, 64);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_worker_times_out() {
        let (table, _worker, _inbox) = RoutingTable::detached(node("0000", "a", 0), config());

        let started = tokio::time::Instant::now();
        let err = table.get_node(0, 0, 0).await.unwrap_err();
        let waited = started.elapsed();

        assert_eq!(
            err,
            Error::Timeout {
                action: "Node retrieval",
                timeout: Duration::from_secs(1),
            }
        );
        assert!(!err.is_out_of_range());
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_lookup_does_not_block_worker() {
        let (table, worker, inbox) = RoutingTable::detached(node("0000", "a", 0), config());

        // Queued while nobody is serving; the caller gives up.
        assert!(table.get_node(0, 0, 0).await.unwrap_err().is_timeout());
        table.insert(node("0a12", "a", 10)).await.unwrap();
        assert_eq!(inbox.len(), 2);

        tokio::spawn(worker.run(inbox));

        let found = table.get_node(1, 0xa, 0).await.unwrap();
        assert_eq!(found.id, id("0a12"));
        assert_eq!(table.stats().await.unwrap().entries, 1);
        assert!(table.is_running());
    }

    #[tokio::test]
    async fn foreign_space_rejected_before_enqueue() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();
        let wide = NodeId::from_value(u128::MAX, IdSpace::CANONICAL);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let mismatch = Error::InvalidId(IdError::SpaceMismatch {
            expected: space(),
            actual: IdSpace::CANONICAL,
        });

        assert_eq!(
            table.insert(Node::new(wide, ip, ip, 9000, "a")).await,
            Err(mismatch.clone())
        );
        assert_eq!(table.evict(wide).await, Err(mismatch.clone()));
        assert_eq!(table.is_responsible(wide).await, Err(mismatch));

        // The worker is untouched and keeps serving.
        table.insert(node("0a12", "a", 10)).await.unwrap();
        assert_eq!(table.get_node(1, 0xa, 0).await.unwrap().id, id("0a12"));
        assert_eq!(table.state(), WorkerState::Running);
    }

    #[tokio::test]
    async fn worker_exit_marks_stopped() {
        let (table, worker, _inbox) = RoutingTable::detached(node("0000", "a", 0), config());
        assert!(table.is_running());

        drop(worker);

        assert_eq!(table.state(), WorkerState::Stopped);
        assert_eq!(table.get_node(0, 0, 0).await, Err(Error::Stopped));
    }

    #[tokio::test]
    async fn shutdown_rejects_new_calls() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();
        table.insert(node("0a12", "a", 10)).await.unwrap();

        table.shutdown();
        assert_eq!(table.state(), WorkerState::Stopped);

        assert_eq!(table.insert(node("0a34", "a", 1)).await, Err(Error::Stopped));
        assert_eq!(table.evict(id("0a12")).await, Err(Error::Stopped));
        assert_eq!(table.get_node(1, 0xa, 0).await, Err(Error::Stopped));
        assert_eq!(table.stats().await, Err(Error::Stopped));

        // Idempotent.
        table.shutdown();
    }

    #[tokio::test]
    async fn shutdown_releases_pending_callers() {
        let (table, worker, inbox) = RoutingTable::detached(node("0000", "a", 0), config());

        let caller = {
            let table = table.clone();
            tokio::spawn(async move { table.get_node(0, 0, 0).await })
        };
        // Let the request reach the inbox before stopping.
        while inbox.is_empty() {
            tokio::task::yield_now().await;
        }

        table.shutdown();
        tokio::spawn(worker.run(inbox));

        assert_eq!(caller.await.unwrap(), Err(Error::Stopped));
    }

    #[tokio::test]
    async fn dropping_handles_stops_worker() {
        let table = RoutingTable::spawn(node("0000", "a", 0), config()).unwrap();
        let state = Arc::clone(&table.state);
        let mut watcher = state.subscribe();
        drop(table);

        watcher
            .wait_for(|s| *s == WorkerState::Stopped)
            .await
            .unwrap();
    }

    #[test]
    fn spawn_requires_runtime() {
        let result = RoutingTable::spawn(node("0000", "a", 0), config());
        assert!(matches!(result, Err(Error::Runtime(_))));
    }

    #[test]
    fn spawn_rejects_space_mismatch() {
        let canonical = NodeId::from_value(7, IdSpace::CANONICAL);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let origin = Node::new(canonical, ip, ip, 9000, "a");
        assert!(matches!(
            RoutingTable::build(origin, config()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
