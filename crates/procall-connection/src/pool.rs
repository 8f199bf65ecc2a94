//! Connection pooling for database connections
//!
//! This module provides connection pooling functionality with configurable
//! pool sizes, lease wait limits, validation and statistics tracking.
//!
//! # Example
//!
//! ```ignore
//! use procall_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(0, 8)
//!     .with_acquire_timeout_ms(500)
//!     .with_validation_query("SELECT 1 FROM DUAL");
//!
//! let pool = ConnectionPool::new(config, connection_factory);
//! let conn = pool.get().await?;
//! // Use connection...
//! // Connection returned to pool on drop
//! ```

mod config;
mod pool;
mod stats;

#[cfg(test)]
mod tests;

pub use config::PoolConfig;
pub use pool::{ConnectionFactory, ConnectionPool, PooledConnection};
pub use stats::PoolStats;
