//! Tests for data source pool functionality

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coshard_config::{DataNodeConfig, PoolSettings};
use coshard_core::{Connection, ConnectionFactory, CoshardError, Endpoint, Result};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::*;

/// Mock connection for testing
struct MockConnection {
    id: usize,
    closed: AtomicBool,
    healthy: AtomicBool,
}

impl MockConnection {
    fn new(id: usize) -> Self {
        Self {
            id,
            closed: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
        }
    }

    /// Make pings fail without marking the handle closed
    fn break_silently(&self) {
        self.healthy.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn ping(&self) -> Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CoshardError::Connection(format!(
                "mock connection {} lost",
                self.id
            )))
        }
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
    fail: AtomicBool,
    delay: Option<Duration>,
    created: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockConnectionFactory {
    fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: None,
            created: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn created(&self, index: usize) -> Arc<MockConnection> {
        self.created.lock()[index].clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Connection>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoshardError::Connection(format!(
                "connection refused: {}",
                endpoint.address
            )));
        }
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(MockConnection::new(id));
        self.created.lock().push(conn.clone());
        Ok(conn)
    }
}

fn endpoint() -> Endpoint {
    Endpoint::new("127.0.0.1:3306", "root", "secret")
}

async fn open_pool(config: PoolConfig) -> (DataSource, Arc<MockConnectionFactory>) {
    let factory = Arc::new(MockConnectionFactory::new());
    let pool = DataSource::connect(endpoint(), config, factory.clone())
        .await
        .expect("pool should open");
    (pool, factory)
}

#[test]
fn test_pool_config_defaults() {
    let config = PoolConfig::default();
    assert_eq!(config.min_size(), 1);
    assert_eq!(config.max_size(), 10);
    assert_eq!(config.acquire_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    assert_eq!(config.reap_interval(), Duration::from_secs(60));
    assert!(!config.test_on_acquire());
}

#[test]
fn test_pool_config_builder() {
    let config = PoolConfig::new(2, 20)
        .with_acquire_timeout_ms(5000)
        .with_idle_timeout_ms(120_000)
        .with_reap_interval_ms(10_000)
        .with_test_on_acquire(true);

    assert_eq!(config.min_size(), 2);
    assert_eq!(config.max_size(), 20);
    assert_eq!(config.acquire_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.idle_timeout(), Duration::from_secs(120));
    assert_eq!(config.reap_interval(), Duration::from_secs(10));
    assert!(config.test_on_acquire());
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_acquire_timeout_means_no_deadline() {
    let config = PoolConfig::new(1, 2).with_acquire_timeout_ms(0);
    assert_eq!(config.acquire_timeout(), None);
    assert_eq!(config, PoolConfig::new(1, 2).without_acquire_timeout());
}

#[test]
fn test_pool_config_from_settings() {
    let settings = PoolSettings {
        idle_timeout_ms: 1_000,
        reap_interval_ms: 500,
        acquire_timeout_ms: 0,
        test_on_acquire: true,
    };
    let config = PoolConfig::from_settings(1, 4, &settings);
    assert_eq!(config.idle_timeout(), Duration::from_secs(1));
    assert_eq!(config.reap_interval(), Duration::from_millis(500));
    assert_eq!(config.acquire_timeout(), None);
    assert!(config.test_on_acquire());
}

#[test]
fn test_pool_config_validation() {
    assert!(PoolConfig::new(0, 1).validate().is_ok());
    assert!(PoolConfig::new(5, 5).validate().is_ok());

    let err = PoolConfig::new(0, 0).validate().unwrap_err();
    assert!(matches!(err, CoshardError::Configuration(_)));

    let err = PoolConfig::new(3, 2).validate().unwrap_err();
    assert!(err.to_string().contains("cannot exceed"));

    let err = PoolConfig::new(1, 2)
        .with_reap_interval_ms(0)
        .validate()
        .unwrap_err();
    assert!(matches!(err, CoshardError::Configuration(_)));
}

#[test]
fn test_pool_stats() {
    let stats = PoolStats::new(10, 3, 7, 1, 2);
    assert_eq!(stats.total(), 10);
    assert_eq!(stats.idle(), 3);
    assert_eq!(stats.active(), 7);
    assert_eq!(stats.pending(), 1);
    assert_eq!(stats.waiting(), 2);
    assert!((stats.utilization() - 0.7).abs() < 0.001);
    assert!(!stats.is_full());
    assert!(PoolStats::new(4, 0, 4, 0, 1).is_full());

    let empty = PoolStats::default();
    assert_eq!(empty.utilization(), 0.0);
}

#[tokio::test]
async fn test_warm_up_creates_min_connections() {
    let (pool, factory) = open_pool(PoolConfig::new(2, 5)).await;

    assert_eq!(factory.count(), 2);
    let stats = pool.stats();
    assert_eq!(stats.total(), 2);
    assert_eq!(stats.idle(), 2);
    assert_eq!(stats.active(), 0);
}

#[tokio::test]
async fn test_warm_up_failure_does_not_abort() {
    let factory = Arc::new(MockConnectionFactory::new());
    factory.set_failing(true);

    let pool = DataSource::connect(endpoint(), PoolConfig::new(2, 5), factory.clone())
        .await
        .expect("warm-up failures are not fatal");
    assert_eq!(pool.stats().total(), 0);

    factory.set_failing(false);
    let conn = pool.acquire().await.unwrap();
    assert_eq!(pool.stats().active(), 1);
    conn.release();
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let factory = Arc::new(MockConnectionFactory::new());

    let err = DataSource::connect(endpoint(), PoolConfig::new(0, 0), factory.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, CoshardError::Configuration(_)));

    let err = DataSource::connect(endpoint(), PoolConfig::new(4, 2), factory.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, CoshardError::Configuration(_)));
    assert_eq!(factory.count(), 0);
}

#[tokio::test]
async fn test_reuses_released_connection() {
    let (pool, factory) = open_pool(PoolConfig::new(1, 5)).await;

    let conn = pool.acquire().await.unwrap();
    let first_id = conn.id();
    assert_eq!(pool.stats().active(), 1);
    pool.release(conn);

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.id(), first_id);
    assert_eq!(factory.count(), 1);
    conn.release();

    assert_eq!(pool.stats().idle(), 1);
}

#[tokio::test]
async fn test_grows_until_max_size() {
    let (pool, factory) = open_pool(PoolConfig::new(0, 3)).await;
    assert_eq!(factory.count(), 0);

    let conns = join_all((0..3).map(|_| pool.acquire())).await;
    let conns: Vec<_> = conns.into_iter().map(|c| c.unwrap()).collect();

    assert_eq!(factory.count(), 3);
    let stats = pool.stats();
    assert_eq!(stats.total(), 3);
    assert_eq!(stats.active(), 3);
    assert!(stats.is_full());

    drop(conns);
    assert_eq!(pool.stats().idle(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_timeout_when_exhausted() {
    let (pool, _factory) = open_pool(PoolConfig::new(1, 1).with_acquire_timeout_ms(50)).await;

    let held = pool.acquire().await.unwrap();
    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, CoshardError::Timeout(_)));

    let stats = pool.stats();
    assert_eq!(stats.total(), 1);
    assert_eq!(stats.pending(), 0);
    assert_eq!(stats.waiting(), 0);
    held.release();
}

#[tokio::test(start_paused = true)]
async fn test_zero_acquire_timeout_waits_for_release() {
    let config = PoolConfig::new(1, 1).with_acquire_timeout_ms(0);
    let (pool, _factory) = open_pool(config).await;
    let held = pool.acquire().await.unwrap();
    let held_id = held.id();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(!waiter.is_finished());

    held.release();
    let conn = waiter.await.unwrap().unwrap();
    assert_eq!(conn.id(), held_id);
    conn.release();
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_blocks_until_release() {
    let (pool, factory) = open_pool(PoolConfig::new(1, 1)).await;

    let held = pool.acquire().await.unwrap();
    let held_id = held.id();

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await.map(|conn| conn.id()) }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());
    assert_eq!(pool.stats().waiting(), 1);

    held.release();
    let id = waiter.await.unwrap().unwrap();
    assert_eq!(id, held_id);
    assert_eq!(factory.count(), 1);
    assert_eq!(pool.stats().waiting(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_six_callers_share_five_connections() {
    let (pool, factory) = open_pool(PoolConfig::new(1, 5)).await;

    let conns = join_all((0..5).map(|_| pool.acquire())).await;
    let mut conns: Vec<_> = conns.into_iter().map(|c| c.unwrap()).collect();
    assert_eq!(factory.count(), 5);

    let sixth = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!sixth.is_finished());

    conns.pop().unwrap().release();
    let sixth = sixth.await.unwrap().unwrap();
    conns.push(sixth);

    for conn in conns {
        conn.release();
    }

    assert_eq!(factory.count(), 5);
    let stats = pool.stats();
    assert_eq!(stats.total(), 5);
    assert_eq!(stats.idle(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_respects_max_size() {
    let (pool, factory) = open_pool(PoolConfig::new(0, 3)).await;
    let in_use = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let borrowed = Arc::new(Mutex::new(HashSet::new()));

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let pool = pool.clone();
            let in_use = in_use.clone();
            let peak = peak.clone();
            let borrowed = borrowed.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    let conn = pool.acquire().await.unwrap();
                    assert!(borrowed.lock().insert(conn.id()), "double borrow");

                    let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    in_use.fetch_sub(1, Ordering::SeqCst);

                    assert!(borrowed.lock().remove(&conn.id()));
                    conn.release();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(factory.count() <= 3);
    let stats = pool.stats();
    assert!(stats.total() <= 3);
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.pending(), 0);
}

#[tokio::test]
async fn test_dial_failure_leaves_no_phantom_member() {
    let (pool, factory) = open_pool(PoolConfig::new(0, 1)).await;
    factory.set_failing(true);

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, CoshardError::Connection(_)));
    let stats = pool.stats();
    assert_eq!(stats.total(), 0);
    assert_eq!(stats.pending(), 0);

    factory.set_failing(false);
    let conn = pool.acquire().await.unwrap();
    assert_eq!(pool.stats().total(), 1);
    conn.release();
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_dial_releases_reservation() {
    let factory = Arc::new(MockConnectionFactory::new().with_delay(Duration::from_secs(1)));
    let pool = DataSource::connect(endpoint(), PoolConfig::new(0, 1), factory.clone())
        .await
        .unwrap();

    let deadline = Instant::now() + Duration::from_millis(10);
    let err = pool.acquire_by(Some(deadline)).await.unwrap_err();
    assert!(matches!(err, CoshardError::Timeout(_)));
    assert_eq!(pool.stats().pending(), 0);
    assert_eq!(pool.stats().total(), 0);

    // The freed slot is usable again.
    let conn = pool.acquire().await.unwrap();
    assert_eq!(factory.count(), 1);
    conn.release();
}

#[tokio::test(start_paused = true)]
async fn test_close_wakes_waiters_and_rejects_acquire() {
    let (pool, _factory) = open_pool(PoolConfig::new(1, 1)).await;
    let held = pool.acquire().await.unwrap();

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await.map(|conn| conn.id()) }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pool.stats().waiting(), 1);

    pool.close().await;
    assert!(pool.is_closed());

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, CoshardError::PoolClosed));

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, CoshardError::PoolClosed));

    held.release();
    assert_eq!(pool.stats().total(), 0);
}

#[tokio::test]
async fn test_close_closes_every_member() {
    let (pool, factory) = open_pool(PoolConfig::new(2, 3)).await;
    let held = pool.acquire().await.unwrap();

    pool.close().await;

    assert!(factory.created(0).is_closed());
    assert!(factory.created(1).is_closed());
    assert_eq!(pool.stats().idle(), 0);

    // Released after close: dropped from the pool rather than requeued.
    pool.release(held);
    let stats = pool.stats();
    assert_eq!(stats.total(), 0);
    assert_eq!(stats.idle(), 0);
}

#[tokio::test]
async fn test_double_close_is_noop() {
    let (pool, _factory) = open_pool(PoolConfig::new(1, 2)).await;

    pool.close().await;
    pool.close().await;

    assert!(pool.is_closed());
    assert_eq!(pool.stats().total(), 0);
}

#[tokio::test]
async fn test_release_drops_closed_connection() {
    let (pool, factory) = open_pool(PoolConfig::new(0, 2)).await;

    let conn = pool.acquire().await.unwrap();
    conn.close().await.unwrap();
    conn.release();

    assert_eq!(pool.stats().total(), 0);

    let conn = pool.acquire().await.unwrap();
    assert!(!conn.is_closed());
    assert_eq!(factory.count(), 2);
    conn.release();
}

#[tokio::test]
async fn test_drop_returns_connection() {
    let (pool, _factory) = open_pool(PoolConfig::new(0, 2)).await;

    {
        let _conn = pool.acquire().await.unwrap();
        assert_eq!(pool.stats().active(), 1);
    }

    let stats = pool.stats();
    assert_eq!(stats.active(), 0);
    assert_eq!(stats.idle(), 1);
}

#[tokio::test]
async fn test_test_on_acquire_discards_unhealthy() {
    let (pool, factory) = open_pool(PoolConfig::new(1, 2).with_test_on_acquire(true)).await;
    let stale = factory.created(0);
    stale.break_silently();

    let conn = pool.acquire().await.unwrap();

    assert!(stale.is_closed());
    assert_eq!(factory.count(), 2);
    assert!(conn.ping().await.is_ok());
    let stats = pool.stats();
    assert_eq!(stats.total(), 1);
    assert_eq!(stats.active(), 1);
    conn.release();
}

#[tokio::test(start_paused = true)]
async fn test_reap_evicts_expired_above_floor() {
    let config = PoolConfig::new(1, 5)
        .with_idle_timeout_ms(1_000)
        .with_reap_interval_ms(3_600_000);
    let (pool, factory) = open_pool(config).await;

    let conns = join_all((0..3).map(|_| pool.acquire())).await;
    for conn in conns {
        conn.unwrap().release();
    }
    assert_eq!(pool.stats().total(), 3);

    tokio::time::advance(Duration::from_millis(1_500)).await;
    let report = pool.reap().await;

    assert_eq!(report, ReapReport { evicted: 2, replenished: 0 });
    let stats = pool.stats();
    assert_eq!(stats.total(), 1);
    assert_eq!(stats.idle(), 1);

    let closed = (0..3).filter(|&i| factory.created(i).is_closed()).count();
    assert_eq!(closed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_reap_retains_recent_connections() {
    let config = PoolConfig::new(1, 5)
        .with_idle_timeout_ms(1_000)
        .with_reap_interval_ms(3_600_000);
    let (pool, _factory) = open_pool(config).await;

    let conns = join_all((0..3).map(|_| pool.acquire())).await;
    for conn in conns {
        conn.unwrap().release();
    }

    tokio::time::advance(Duration::from_millis(500)).await;
    let report = pool.reap().await;

    assert_eq!(report, ReapReport::default());
    assert_eq!(pool.stats().total(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_reap_never_touches_borrowed() {
    let config = PoolConfig::new(0, 2)
        .with_idle_timeout_ms(1_000)
        .with_reap_interval_ms(3_600_000);
    let (pool, _factory) = open_pool(config).await;

    let held = pool.acquire().await.unwrap();
    tokio::time::advance(Duration::from_secs(10)).await;

    assert_eq!(pool.reap().await.evicted, 0);
    assert_eq!(pool.stats().active(), 1);
    held.release();
}

#[tokio::test(start_paused = true)]
async fn test_background_reaper_evicts_idle() {
    let config = PoolConfig::new(0, 3)
        .with_idle_timeout_ms(50)
        .with_reap_interval_ms(100);
    let (pool, factory) = open_pool(config).await;

    let conns = join_all((0..2).map(|_| pool.acquire())).await;
    drop(conns);
    assert_eq!(pool.stats().idle(), 2);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(pool.stats().total(), 0);
    assert!(factory.created(0).is_closed());
    assert!(factory.created(1).is_closed());
}

#[tokio::test]
async fn test_reaper_evicts_dead_and_replenishes_floor() {
    let (pool, factory) = open_pool(PoolConfig::new(2, 4)).await;
    factory.created(0).close().await.unwrap();

    let report = pool.reap().await;

    assert_eq!(report, ReapReport { evicted: 1, replenished: 1 });
    assert_eq!(factory.count(), 3);
    let stats = pool.stats();
    assert_eq!(stats.total(), 2);
    assert_eq!(stats.idle(), 2);
}

#[tokio::test]
async fn test_reaper_evicts_connection_that_fails_ping() {
    let (pool, factory) = open_pool(PoolConfig::new(1, 2)).await;
    let broken = factory.created(0);
    broken.break_silently();
    assert!(!broken.is_closed());

    let report = pool.reap().await;

    assert_eq!(report, ReapReport { evicted: 1, replenished: 1 });
    assert!(broken.is_closed());
    let stats = pool.stats();
    assert_eq!(stats.total(), 1);
    assert_eq!(stats.idle(), 1);

    let conn = pool.acquire().await.unwrap();
    assert!(conn.is_healthy().await);
    assert_eq!(factory.count(), 2);
    conn.release();
}

#[tokio::test(start_paused = true)]
async fn test_reaper_health_check_keeps_idle_age() {
    let config = PoolConfig::new(1, 3)
        .with_idle_timeout_ms(1_000)
        .with_reap_interval_ms(3_600_000);
    let (pool, _factory) = open_pool(config).await;

    let conns = join_all((0..2).map(|_| pool.acquire())).await;
    for conn in conns {
        conn.unwrap().release();
    }

    tokio::time::advance(Duration::from_millis(600)).await;
    assert_eq!(pool.reap().await, ReapReport::default());
    assert_eq!(pool.stats().idle(), 2);

    tokio::time::advance(Duration::from_millis(600)).await;
    assert_eq!(pool.reap().await.evicted, 1);
    assert_eq!(pool.stats().total(), 1);
}

#[tokio::test]
async fn test_reaper_restores_floor_after_failed_warm_up() {
    let factory = Arc::new(MockConnectionFactory::new());
    factory.set_failing(true);
    let pool = DataSource::connect(endpoint(), PoolConfig::new(2, 4), factory.clone())
        .await
        .unwrap();

    let report = pool.reap().await;
    assert_eq!(report.replenished, 0);

    factory.set_failing(false);
    let report = pool.reap().await;
    assert_eq!(report.replenished, 2);
    assert_eq!(pool.stats().idle(), 2);
}

#[tokio::test]
async fn test_reap_on_closed_pool_is_noop() {
    let (pool, factory) = open_pool(PoolConfig::new(1, 2)).await;
    pool.close().await;

    assert_eq!(pool.reap().await, ReapReport::default());
    assert_eq!(factory.count(), 1);
}

fn data_nodes() -> Vec<DataNodeConfig> {
    serde_json::from_value(serde_json::json!([
        {
            "name": "dn1",
            "min_connection": 1,
            "max_connection": 2,
            "user": "root",
            "password": "secret",
            "type": "split",
            "dataServers": [
                { "name": "m1", "type": "normal", "ip": "10.0.0.1", "port": 3306 },
                { "name": "s1", "type": "read", "ip": "10.0.0.2", "port": 3306 }
            ]
        },
        {
            "name": "dn2",
            "min_connection": 1,
            "max_connection": 2,
            "user": "root",
            "password": "secret",
            "dataServers": [
                { "name": "s2", "type": "read", "ip": "10.0.0.3", "port": 3306 }
            ]
        }
    ]))
    .unwrap()
}

#[tokio::test]
async fn test_registry_from_config() {
    let factory = Arc::new(MockConnectionFactory::new());
    let registry = PoolRegistry::from_config(&data_nodes(), &PoolSettings::default(), factory.clone())
        .await
        .unwrap();

    assert_eq!(registry.len(), 1);
    assert!(registry.contains("dn1"));
    assert!(!registry.contains("dn2"));
    assert_eq!(registry.names(), vec!["dn1"]);

    let node = registry.get("dn1").unwrap();
    assert_eq!(node.name(), "dn1");
    assert_eq!(node.write_sources().len(), 1);
    assert_eq!(node.primary().endpoint().address, "10.0.0.1:3306");
    assert_eq!(factory.count(), 1);

    let conn = node.acquire().await.unwrap();
    conn.release();

    let err = registry.get("dn2").unwrap_err();
    assert!(matches!(err, CoshardError::NotFound(_)));

    registry.close_all().await;
    assert!(node.primary().is_closed());
}

#[tokio::test]
async fn test_db_pool_opens_every_write_server() {
    let mut nodes = data_nodes();
    let mut node = nodes.remove(0);
    node.data_servers[1].kind = coshard_config::DataServerType::Normal;

    let factory = Arc::new(MockConnectionFactory::new());
    let pool = DbPool::connect(&node, &PoolSettings::default(), factory.clone())
        .await
        .unwrap();

    assert_eq!(pool.write_sources().len(), 2);
    assert_eq!(factory.count(), 2);
    pool.close().await;
}

#[tokio::test]
async fn test_db_pool_requires_write_server() {
    let node = data_nodes().remove(1);
    let factory = Arc::new(MockConnectionFactory::new());

    let err = DbPool::connect(&node, &PoolSettings::default(), factory)
        .await
        .unwrap_err();
    assert!(matches!(err, CoshardError::Configuration(_)));
}
