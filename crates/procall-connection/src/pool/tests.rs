//! Tests for connection pool functionality

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use procall_core::{CallableStatement, Connection, LargeObject, ProcallError, Result};

use super::config::PoolConfig;
use super::pool::{ConnectionFactory, ConnectionPool};
use super::stats::PoolStats;

/// Mock connection for testing
struct MockConnection {
    closed: AtomicBool,
    healthy: Arc<AtomicBool>,
    validations: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn prepare_call(&self, _sql: &str) -> Result<Box<dyn CallableStatement>> {
        Err(ProcallError::NotSupported("calls not supported in mock".into()))
    }

    async fn create_clob(&self, _national: bool) -> Result<Arc<dyn LargeObject>> {
        Err(ProcallError::NotSupported("lobs not supported in mock".into()))
    }

    async fn is_valid(&self, validation_query: Option<&str>) -> bool {
        if validation_query.is_some() {
            self.validations.fetch_add(1, Ordering::SeqCst);
        }
        self.healthy.load(Ordering::SeqCst) && !self.is_closed()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock factory that counts connections created
struct MockConnectionFactory {
    counter: AtomicUsize,
    healthy: Arc<AtomicBool>,
    validations: Arc<AtomicUsize>,
    fail: AtomicBool,
}

impl MockConnectionFactory {
    fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            healthy: Arc::new(AtomicBool::new(true)),
            validations: Arc::new(AtomicUsize::new(0)),
            fail: AtomicBool::new(false),
        }
    }

    fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProcallError::Connection("database unreachable".into()));
        }
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            closed: AtomicBool::new(false),
            healthy: self.healthy.clone(),
            validations: self.validations.clone(),
        }))
    }
}

// =============================================================================
// PoolConfig tests
// =============================================================================

#[test]
fn test_pool_config_defaults() {
    let config = PoolConfig::default();
    assert_eq!(config.min_size(), 0);
    assert_eq!(config.max_size(), 8);
    assert_eq!(config.acquire_timeout(), Duration::from_millis(500));
    assert_eq!(config.idle_timeout(), Duration::from_millis(600_000));
    assert!(config.max_lifetime().is_none());
    assert!(config.validation_query().is_none());
}

#[test]
fn test_pool_config_builders() {
    let config = PoolConfig::new(1, 5)
        .with_acquire_timeout_ms(5000)
        .with_idle_timeout_ms(60000)
        .with_max_lifetime_ms(3600000)
        .with_validation_query("SELECT 1");

    assert_eq!(config.acquire_timeout(), Duration::from_millis(5000));
    assert_eq!(config.idle_timeout(), Duration::from_millis(60000));
    assert_eq!(config.max_lifetime(), Some(Duration::from_millis(3600000)));
    assert_eq!(config.validation_query(), Some("SELECT 1"));
}

#[test]
fn test_blank_validation_query_is_absent() {
    let config = PoolConfig::default().with_validation_query("   ");
    assert!(config.validation_query().is_none());
}

#[test]
#[should_panic(expected = "max_size must be greater than 0")]
fn test_pool_config_invalid_max_size() {
    PoolConfig::new(0, 0);
}

#[test]
#[should_panic(expected = "min_size (10) cannot exceed max_size (5)")]
fn test_pool_config_min_exceeds_max() {
    PoolConfig::new(10, 5);
}

#[test]
fn test_pool_config_partial_toml_uses_defaults() {
    let config: PoolConfig = toml::from_str(
        r#"
        max_size = 4
        validation_query = "SELECT 1 FROM DUAL"
        "#,
    )
    .expect("deserialize");

    assert_eq!(config.max_size(), 4);
    assert_eq!(config.acquire_timeout(), Duration::from_millis(500));
    assert_eq!(config.validation_query(), Some("SELECT 1 FROM DUAL"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_pool_config_validate_rejects_bad_sizes() {
    let config: PoolConfig = toml::from_str("min_size = 3\nmax_size = 2").expect("deserialize");
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("cannot exceed"));

    let config: PoolConfig = toml::from_str("max_size = 0").expect("deserialize");
    assert!(config.validate().is_err());
}

#[test]
fn test_pool_config_json_roundtrip() {
    let config = PoolConfig::new(2, 10).with_max_lifetime_ms(3600000);
    let json = serde_json::to_string(&config).expect("serialize");
    let deserialized: PoolConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(config, deserialized);
}

// =============================================================================
// PoolStats tests
// =============================================================================

#[test]
fn test_pool_stats_utilization() {
    let stats = PoolStats {
        idle: 2,
        leased: 4,
        max_size: 8,
        ..Default::default()
    };
    assert_eq!(stats.open(), 6);
    assert!((stats.utilization() - 0.5).abs() < 0.001);
    assert!(!stats.is_exhausted());

    let empty = PoolStats::default();
    assert!((empty.utilization() - 0.0).abs() < 0.001);
    assert!(!empty.is_exhausted());
}

#[test]
fn test_pool_stats_exhausted() {
    let stats = PoolStats {
        leased: 8,
        waiting: 3,
        max_size: 8,
        ..Default::default()
    };
    assert!(stats.is_exhausted());
}

// =============================================================================
// ConnectionPool tests
// =============================================================================

#[tokio::test]
async fn test_pool_get_connection() {
    let pool = ConnectionPool::new(PoolConfig::new(0, 5), MockConnectionFactory::new());

    let conn = pool.get().await.expect("get connection");
    assert_eq!(conn.driver_name(), "mock");

    let stats = pool.stats();
    assert_eq!(stats.leased, 1);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.opened, 1);
}

#[tokio::test]
async fn test_pool_connection_return() {
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = ConnectionPool::new(PoolConfig::new(0, 5), factory.clone());

    {
        let _conn = pool.get().await.expect("get connection");
        assert_eq!(pool.stats().leased, 1);
    }

    assert_eq!(pool.stats().leased, 0);
    assert_eq!(pool.stats().idle, 1);

    // Reuses the idle connection
    let _conn2 = pool.get().await.expect("get connection");
    assert_eq!(factory.count(), 1);
}

#[tokio::test]
async fn test_pool_max_wait_exceeded() {
    let config = PoolConfig::new(0, 2).with_acquire_timeout_ms(50);
    let pool = ConnectionPool::new(config, MockConnectionFactory::new());

    let conn1 = pool.get().await.expect("get connection 1");
    let conn2 = pool.get().await.expect("get connection 2");
    assert!(pool.stats().is_exhausted());

    let err = pool.get().await.err().expect("third lease must time out");
    assert!(matches!(err, ProcallError::Timeout(_)));
    assert_eq!(pool.stats().waiting, 0);

    drop(conn1);
    drop(conn2);
    assert!(pool.get().await.is_ok());
}

#[tokio::test]
async fn test_pool_waiter_gets_returned_connection() {
    let config = PoolConfig::new(0, 1).with_acquire_timeout_ms(1000);
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = Arc::new(ConnectionPool::new(config, factory.clone()));

    let conn = pool.get().await.expect("get");
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.get().await.map(|c| c.driver_name().to_string()) })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(conn);

    let driver = waiter.await.expect("join").expect("lease");
    assert_eq!(driver, "mock");
    assert_eq!(factory.count(), 1);
}

#[tokio::test]
async fn test_pool_factory_failure_releases_slot() {
    let config = PoolConfig::new(0, 1).with_acquire_timeout_ms(50);
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = ConnectionPool::new(config, factory.clone());

    factory.fail.store(true, Ordering::SeqCst);
    let err = pool.get().await.err().expect("factory failure");
    assert!(matches!(err, ProcallError::Connection(_)));

    factory.fail.store(false, Ordering::SeqCst);
    assert!(pool.get().await.is_ok());
    assert_eq!(pool.stats().waiting, 0);
}

#[tokio::test]
async fn test_pool_discards_invalid_idle_connection() {
    let config = PoolConfig::new(0, 2).with_validation_query("SELECT 1");
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = ConnectionPool::new(config, factory.clone());

    drop(pool.get().await.expect("get"));
    assert_eq!(pool.stats().idle, 1);

    factory.set_healthy(false);
    let _conn = pool.get().await.expect("get");

    let stats = pool.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.opened, 2);
    assert_eq!(factory.validations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pool_discards_expired_connection() {
    let config = PoolConfig::new(0, 2).with_max_lifetime_ms(10);
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = ConnectionPool::new(config, factory.clone());

    drop(pool.get().await.expect("get"));
    tokio::time::sleep(Duration::from_millis(30)).await;

    let _conn = pool.get().await.expect("get");
    assert_eq!(factory.count(), 2);
    assert_eq!(pool.stats().discarded, 1);
}

#[tokio::test]
async fn test_pool_warm_up_and_close_idle() {
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = ConnectionPool::new(PoolConfig::new(3, 5), factory.clone());

    pool.warm_up().await.expect("warm up");
    assert_eq!(pool.stats().idle, 3);
    assert_eq!(factory.count(), 3);

    pool.close_idle().await;
    assert_eq!(pool.stats().idle, 0);
}
