//! Routing configuration.
//!
//! Every parameter of the overlay can be changed without touching code so
//! tests can run against small identifier spaces and short deadlines.

use std::str::FromStr;
use std::time::Duration;

use pastry_id::IdSpace;

use crate::error::{Error, Result};
use crate::proximity::ProximityMetric;

/// Nodes kept on each side of the leaf set.
pub const DEFAULT_LEAF_HALF_CAPACITY: usize = 16;

/// Nodes kept in the neighborhood set.
pub const DEFAULT_NEIGHBORHOOD_CAPACITY: usize = 32;

/// Latency multiplier applied to peers in another region.
pub const DEFAULT_REGION_PENALTY: f64 = 2.0;

/// How long a caller waits for the worker to answer.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Pending requests buffered in front of the worker.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Configuration for a routing table and the sets it maintains.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    /// Identifier space (digit base and length).
    pub space: IdSpace,

    /// Capacity of each half (left and right) of the leaf set.
    pub leaf_half_capacity: usize,

    /// Capacity of the neighborhood set.
    pub neighborhood_capacity: usize,

    /// Multiplier (> 1) applied to the latency of peers in a different region.
    pub region_penalty: f64,

    /// Deadline for request/response calls into the worker.
    pub lookup_timeout: Duration,

    /// Bound of the worker's inbox.
    pub inbox_capacity: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            space: IdSpace::CANONICAL,
            leaf_half_capacity: DEFAULT_LEAF_HALF_CAPACITY,
            neighborhood_capacity: DEFAULT_NEIGHBORHOOD_CAPACITY,
            region_penalty: DEFAULT_REGION_PENALTY,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl RoutingConfig {
    /// Create config from environment variables, falling back to defaults.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `PASTRY_ID_BASE` | `space.base` |
    /// | `PASTRY_ID_LENGTH` | `space.length` |
    /// | `PASTRY_LEAF_HALF_CAPACITY` | `leaf_half_capacity` |
    /// | `PASTRY_NEIGHBORHOOD_CAPACITY` | `neighborhood_capacity` |
    /// | `PASTRY_REGION_PENALTY` | `region_penalty` |
    /// | `PASTRY_LOOKUP_TIMEOUT_MS` | `lookup_timeout` |
    /// | `PASTRY_INBOX_CAPACITY` | `inbox_capacity` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base = parse_var(&lookup, "PASTRY_ID_BASE", defaults.space.base())?;
        let length = parse_var(&lookup, "PASTRY_ID_LENGTH", defaults.space.length())?;
        let space = IdSpace::new(base, length)?;

        let timeout_ms = parse_var(
            &lookup,
            "PASTRY_LOOKUP_TIMEOUT_MS",
            defaults.lookup_timeout.as_millis() as u64,
        )?;

        let config = Self {
            space,
            leaf_half_capacity: parse_var(
                &lookup,
                "PASTRY_LEAF_HALF_CAPACITY",
                defaults.leaf_half_capacity,
            )?,
            neighborhood_capacity: parse_var(
                &lookup,
                "PASTRY_NEIGHBORHOOD_CAPACITY",
                defaults.neighborhood_capacity,
            )?,
            region_penalty: parse_var(&lookup, "PASTRY_REGION_PENALTY", defaults.region_penalty)?,
            lookup_timeout: Duration::from_millis(timeout_ms),
            inbox_capacity: parse_var(&lookup, "PASTRY_INBOX_CAPACITY", defaults.inbox_capacity)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the structures unusable.
    pub fn validate(&self) -> Result<()> {
        ProximityMetric::new(self.region_penalty)?;
        if self.leaf_half_capacity == 0 {
            return Err(Error::InvalidConfig("leaf set half capacity must be non-zero".into()));
        }
        if self.neighborhood_capacity == 0 {
            return Err(Error::InvalidConfig("neighborhood capacity must be non-zero".into()));
        }
        if self.lookup_timeout.is_zero() {
            return Err(Error::InvalidConfig("lookup timeout must be non-zero".into()));
        }
        if self.inbox_capacity == 0 {
            return Err(Error::InvalidConfig("inbox capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Set the identifier space.
    #[must_use]
    pub fn with_space(mut self, space: IdSpace) -> Self {
        self.space = space;
        self
    }

    /// Set the capacity of each leaf set half.
    #[must_use]
    pub fn with_leaf_half_capacity(mut self, capacity: usize) -> Self {
        self.leaf_half_capacity = capacity;
        self
    }

    /// Set the neighborhood capacity.
    #[must_use]
    pub fn with_neighborhood_capacity(mut self, capacity: usize) -> Self {
        self.neighborhood_capacity = capacity;
        self
    }

    /// Set the cross-region latency multiplier.
    #[must_use]
    pub fn with_region_penalty(mut self, penalty: f64) -> Self {
        self.region_penalty = penalty;
        self
    }

    /// Set the lookup deadline.
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Set the inbox bound.
    #[must_use]
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| {
            Error::InvalidConfig(format!("{}={:?}: {}", name, raw, e))
        }),
    }
}
