//! Pool configuration types

use std::time::Duration;

use procall_core::{ProcallError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pool sizing, lease wait limits, validation and connection
/// lifecycle. Every field is optional when deserialized; missing fields take
/// the values of [`PoolConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of connections opened eagerly by `warm_up`
    min_size: usize,
    /// Maximum number of connections allowed in the pool
    max_size: usize,
    /// Maximum wait in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
    /// Timeout in milliseconds before an idle connection is closed
    idle_timeout_ms: u64,
    /// Maximum lifetime of a connection in milliseconds before it's recycled
    max_lifetime_ms: Option<u64>,
    /// Query run against an idle connection before it is lent out
    validation_query: Option<String>,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        assert!(
            min_size <= max_size,
            "min_size ({}) cannot exceed max_size ({})",
            min_size,
            max_size
        );

        Self {
            min_size,
            max_size,
            acquire_timeout_ms: 500,
            idle_timeout_ms: 600_000, // 10 minutes
            max_lifetime_ms: None,
            validation_query: None,
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the maximum connection lifetime in milliseconds
    pub fn with_max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    /// Set the query used to validate idle connections before lending them
    pub fn with_validation_query(mut self, query: impl Into<String>) -> Self {
        self.validation_query = Some(query.into());
        self
    }

    /// Check sizing invariants of a deserialized configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(ProcallError::Configuration(
                "pool max_size must be greater than 0".into(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(ProcallError::Configuration(format!(
                "pool min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Get the maximum lifetime as a Duration if set
    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    /// Get the validation query, treating a blank query as absent
    pub fn validation_query(&self) -> Option<&str> {
        self.validation_query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_size: 0
    /// - max_size: 8
    /// - acquire_timeout: 500 milliseconds
    /// - idle_timeout: 10 minutes
    /// - max_lifetime: None
    /// - validation_query: None
    fn default() -> Self {
        Self::new(0, 8)
    }
}
