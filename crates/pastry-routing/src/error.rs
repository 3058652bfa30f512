//! Error types for pastry-routing.

use std::time::Duration;

use pastry_id::IdError;
use thiserror::Error;

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned to callers of the routing structures.
///
/// `OutOfRange` is an ordinary "nothing there" answer. `Timeout` and
/// `Stopped` mean the owning worker could not answer at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed identifier.
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// Lookup indices outside the table or past the end of a column.
    #[error("no entry at row {row}, column {col}, entry {entry}")]
    OutOfRange { row: usize, col: usize, entry: usize },

    /// The worker did not answer within the deadline.
    #[error("Timeout error: {action} took more than {} seconds.", .timeout.as_secs_f64())]
    Timeout {
        action: &'static str,
        timeout: Duration,
    },

    /// The worker has been shut down.
    #[error("routing table worker has stopped")]
    Stopped,

    /// No tokio runtime to host the worker.
    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    /// Configuration values that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for the expected empty-slot answer.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::OutOfRange { .. })
    }

    /// True when the caller's wait hit the deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub(crate) fn timeout(action: &'static str, timeout: Duration) -> Self {
        Error::Timeout { action, timeout }
    }
}
