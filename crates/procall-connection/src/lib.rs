//! Procall Connection - Connection pooling
//!
//! This crate lends live database connections to invocations and takes them
//! back when the lease is dropped.

pub mod pool;

pub use pool::{ConnectionFactory, ConnectionPool, PoolConfig, PoolStats, PooledConnection};
