//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a connection pool taken by `ConnectionPool::stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Connections sitting idle in the pool
    pub idle: usize,
    /// Connections currently leased to callers
    pub leased: usize,
    /// Callers waiting for a lease
    pub waiting: usize,
    /// Configured upper bound on open connections
    pub max_size: usize,
    /// Connections opened through the factory since the pool was created
    pub opened: u64,
    /// Idle connections discarded for age, idleness or failed validation
    pub discarded: u64,
}

impl PoolStats {
    /// Open connections (idle + leased)
    pub fn open(&self) -> usize {
        self.idle + self.leased
    }

    /// Leased share of the configured maximum (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        self.leased as f64 / self.max_size as f64
    }

    /// Whether every permitted connection is leased out
    pub fn is_exhausted(&self) -> bool {
        self.max_size > 0 && self.leased >= self.max_size
    }
}
