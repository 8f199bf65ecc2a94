//! Connection pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use procall_core::{Connection, ProcallError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::config::PoolConfig;
use super::stats::PoolStats;

/// Factory trait for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Validate that an idle connection is still usable before lending it
    ///
    /// Default implementation delegates to `Connection::is_valid`.
    async fn validate(&self, conn: &dyn Connection, validation_query: Option<&str>) -> bool {
        conn.is_valid(validation_query).await
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection, validation_query: Option<&str>) -> bool {
        (**self).validate(conn, validation_query).await
    }
}

/// Idle pool entry with lifecycle timestamps
struct IdleEntry {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    last_used_at: Instant,
}

/// A connection pool that lends database connections to invocations
///
/// The pool bounds the number of open connections, waits a limited time for
/// a free slot, and validates idle connections before handing them out.
/// Connections are returned automatically when the `PooledConnection` lease
/// is dropped.
pub struct ConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<VecDeque<IdleEntry>>,
    /// Limits total open connections
    semaphore: Arc<Semaphore>,
    leased: AtomicUsize,
    waiting: AtomicUsize,
    opened: AtomicU64,
    discarded: AtomicU64,
}

impl ConnectionPool {
    /// Create a new connection pool with the given configuration and factory
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            semaphore,
            leased: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            opened: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Open connections until `min_size` are idle
    pub async fn warm_up(&self) -> Result<()> {
        let missing = self
            .config
            .min_size()
            .saturating_sub(self.idle.lock().len());
        for _ in 0..missing {
            let connection = self.open().await?;
            self.idle.lock().push_back(IdleEntry {
                connection,
                created_at: Instant::now(),
                last_used_at: Instant::now(),
            });
        }
        tracing::debug!(opened = missing, "connection pool warmed up");
        Ok(())
    }

    /// Lease a connection from the pool
    ///
    /// This will:
    /// 1. Wait for a free slot (bounded by the acquire timeout)
    /// 2. Reuse a valid idle connection if one is available
    /// 3. Otherwise open a new connection through the factory
    ///
    /// Returns `ProcallError::Timeout` if the wait exceeds the acquire timeout.
    pub async fn get(&self) -> Result<PooledConnection<'_>> {
        self.waiting.fetch_add(1, Ordering::SeqCst);

        let permit = tokio::time::timeout(
            self.config.acquire_timeout(),
            self.semaphore.clone().acquire_owned(),
        )
        .await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        let permit = match permit {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ProcallError::Connection("Pool semaphore closed".into())),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.acquire_timeout().as_millis() as u64,
                    "timed out waiting for a pooled connection"
                );
                return Err(ProcallError::Timeout(format!(
                    "Timed out waiting for connection (timeout: {:?})",
                    self.config.acquire_timeout()
                )));
            }
        };

        let (connection, created_at) = match self.take_idle().await {
            Some(entry) => (entry.connection, entry.created_at),
            None => (self.open().await?, Instant::now()),
        };

        self.leased.fetch_add(1, Ordering::SeqCst);
        Ok(PooledConnection {
            connection,
            created_at,
            pool: self,
            _permit: permit,
        })
    }

    async fn open(&self) -> Result<Arc<dyn Connection>> {
        let connection = self.factory.create().await?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(driver = %connection.driver_name(), "opened pooled connection");
        Ok(connection)
    }

    /// Pop idle connections until one passes the lifetime, idle and validation checks
    async fn take_idle(&self) -> Option<IdleEntry> {
        loop {
            let entry = { self.idle.lock().pop_front() }?;

            let expired = self
                .config
                .max_lifetime()
                .is_some_and(|max| entry.created_at.elapsed() > max);
            let stale = entry.last_used_at.elapsed() > self.config.idle_timeout();

            if !expired
                && !stale
                && self
                    .factory
                    .validate(&*entry.connection, self.config.validation_query())
                    .await
            {
                return Some(entry);
            }

            tracing::debug!(expired, stale, "discarding idle connection");
            self.discarded.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = entry.connection.close().await {
                tracing::warn!(error = %e, "failed to close discarded connection");
            }
        }
    }

    fn return_connection(&self, connection: Arc<dyn Connection>, created_at: Instant) {
        self.leased.fetch_sub(1, Ordering::SeqCst);

        if connection.is_closed() {
            return;
        }

        self.idle.lock().push_back(IdleEntry {
            connection,
            created_at,
            last_used_at: Instant::now(),
        });
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().len(),
            leased: self.leased.load(Ordering::SeqCst),
            waiting: self.waiting.load(Ordering::SeqCst),
            max_size: self.config.max_size(),
            opened: self.opened.load(Ordering::SeqCst),
            discarded: self.discarded.load(Ordering::SeqCst),
        }
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Close all idle connections in the pool
    pub async fn close_idle(&self) {
        let entries: Vec<_> = { self.idle.lock().drain(..).collect() };

        for entry in entries {
            if let Err(e) = entry.connection.close().await {
                tracing::warn!(error = %e, "failed to close idle connection");
            }
        }
    }
}

/// A connection leased from the pool
///
/// When dropped, the connection is returned to the pool.
pub struct PooledConnection<'a> {
    connection: Arc<dyn Connection>,
    created_at: Instant,
    pool: &'a ConnectionPool,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        self.pool
            .return_connection(Arc::clone(&self.connection), self.created_at);
    }
}

impl PooledConnection<'_> {
    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.connection
    }
}
