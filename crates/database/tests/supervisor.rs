//! Lifecycle tests for `ConnectionSupervisor` against the scripted backend.
//!
//! Time is paused so retry delays and timeouts elapse instantly.

use configuration::{ConnectionConfig, Secret};
use database::testing::ScriptedConnector;
use database::{ConnectionSupervisor, DbError, PoolState};
use futures::future::join_all;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn config_with_attempts(max_attempts: u32) -> ConnectionConfig {
    let mut config = ConnectionConfig::default();
    config.retry.max_attempts = max_attempts;
    config
}

fn supervisor(connector: &ScriptedConnector, config: ConnectionConfig) -> Arc<ConnectionSupervisor> {
    Arc::new(ConnectionSupervisor::new(config, Arc::new(connector.clone())))
}

#[tokio::test(start_paused = true)]
async fn starts_uninitialized_and_becomes_ready() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));

    assert_eq!(supervisor.state().await, PoolState::Uninitialized);
    supervisor.connect().await.unwrap();
    assert_eq!(supervisor.state().await, PoolState::Ready);
    assert_eq!(connector.open_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_when_ready_returns_the_same_pool() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));

    let first = supervisor.connect().await.unwrap();
    let second = supervisor.connect().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.open_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_connects_collapse_into_one_attempt() {
    let connector = ScriptedConnector::new().with_open_delay(Duration::from_millis(250));
    let supervisor = supervisor(&connector, config_with_attempts(3));

    let results = join_all((0..16).map(|_| supervisor.connect())).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(connector.open_calls(), 1);
    assert_eq!(supervisor.state().await, PoolState::Ready);
}

#[tokio::test(start_paused = true)]
async fn unreachable_host_ends_in_connection_exhausted() {
    let connector = ScriptedConnector::new().unreachable();
    let supervisor = supervisor(&connector, config_with_attempts(3));
    let started = Instant::now();

    let err = supervisor.connect().await.err().unwrap();

    match err {
        DbError::ConnectionExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("connection refused"));
        }
        other => panic!("expected ConnectionExhausted, got {other:?}"),
    }
    assert_eq!(connector.open_calls(), 3);
    // Two fixed pauses between three attempts.
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert!(matches!(supervisor.state().await, PoolState::Degraded { .. }));
}

fn config_with_credentials(user: &str, password: &str) -> ConnectionConfig {
    let mut config = config_with_attempts(2);
    config.user = user.to_string();
    config.password = Secret::new(password);
    config
}

#[tokio::test(start_paused = true)]
async fn driver_errors_echoing_the_password_are_masked() {
    let connector = ScriptedConnector::new()
        .unreachable()
        .with_open_error("password authentication failed (password=hunter2)");
    let supervisor = supervisor(&connector, config_with_credentials("sales_reader", "hunter2"));

    match supervisor.connect().await.err().unwrap() {
        DbError::ConnectionExhausted { last_error, .. } => {
            assert!(!last_error.contains("hunter2"), "{last_error}");
            assert!(last_error.contains("password=***"));
        }
        other => panic!("expected ConnectionExhausted, got {other:?}"),
    }
    match supervisor.state().await {
        PoolState::Degraded { last_error } => {
            assert!(!last_error.contains("hunter2"), "{last_error}");
            assert!(last_error.contains("***"));
        }
        other => panic!("expected Degraded, got {other:?}"),
    }
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn connect_logs_name_the_database_but_not_the_credentials() {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _default = tracing::subscriber::set_default(subscriber);

    let connector = ScriptedConnector::new().failing(1);
    let supervisor = supervisor(&connector, config_with_credentials("sales_reader", "hunter2"));
    supervisor.connect().await.unwrap();

    let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Connecting to database"), "{output}");
    assert!(output.contains("localhost:5432/adventureworks"));
    assert!(!output.contains("sales_reader"), "{output}");
    assert!(!output.contains("hunter2"), "{output}");
}

#[tokio::test(start_paused = true)]
async fn waiters_share_the_failure_of_the_attempt_they_joined() {
    let connector = ScriptedConnector::new().unreachable();
    let supervisor = supervisor(&connector, config_with_attempts(3));

    let results = join_all((0..5).map(|_| supervisor.connect())).await;

    for result in results {
        assert!(matches!(
            result,
            Err(DbError::ConnectionExhausted { attempts: 3, .. })
        ));
    }
    assert_eq!(connector.open_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_ready() {
    let connector = ScriptedConnector::new().failing(2);
    let supervisor = supervisor(&connector, config_with_attempts(3));

    supervisor.connect().await.unwrap();

    assert_eq!(connector.open_calls(), 3);
    assert_eq!(supervisor.state().await, PoolState::Ready);
}

#[tokio::test(start_paused = true)]
async fn degraded_supervisor_can_be_connected_again() {
    let connector = ScriptedConnector::new().failing(2);
    let supervisor = supervisor(&connector, config_with_attempts(2));

    assert!(supervisor.connect().await.is_err());
    assert!(matches!(supervisor.state().await, PoolState::Degraded { .. }));

    supervisor.connect().await.unwrap();
    assert_eq!(supervisor.state().await, PoolState::Ready);
    assert_eq!(connector.open_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_opens_count_as_failed_attempts() {
    let connector = ScriptedConnector::new().with_open_delay(Duration::from_secs(5));
    let mut config = config_with_attempts(2);
    config.connect_timeout_ms = 1_000;
    let supervisor = supervisor(&connector, config);

    let err = supervisor.connect().await.err().unwrap();

    match err {
        DbError::ConnectionExhausted { attempts, last_error } => {
            assert_eq!(attempts, 2);
            assert!(last_error.contains("timed out"));
        }
        other => panic!("expected ConnectionExhausted, got {other:?}"),
    }
    assert_eq!(connector.open_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn acquire_never_connects() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));

    assert!(matches!(supervisor.acquire().await, Err(DbError::NotConnected)));
    assert_eq!(connector.open_calls(), 0);
    assert_eq!(supervisor.state().await, PoolState::Uninitialized);
}

#[tokio::test(start_paused = true)]
async fn acquire_times_out_when_the_pool_is_exhausted() {
    let connector = ScriptedConnector::new();
    let mut config = config_with_attempts(1);
    config.pool.max_connections = 1;
    config.pool.acquire_timeout_ms = 500;
    let supervisor = supervisor(&connector, config);
    supervisor.connect().await.unwrap();

    let held = supervisor.acquire().await.unwrap();
    assert!(matches!(
        supervisor.acquire().await,
        Err(DbError::AcquireTimeout(_))
    ));

    drop(held);
    assert!(supervisor.acquire().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn failing_health_check_leaves_ready_pool_ready() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));
    supervisor.connect().await.unwrap();
    assert!(supervisor.health_check().await);

    connector.set_online(false);

    assert!(!supervisor.health_check().await);
    assert_eq!(supervisor.state().await, PoolState::Ready);
    assert_eq!(connector.open_calls(), 1);
    // No demotion: handles are still handed out and fail on use instead.
    assert!(supervisor.acquire().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn health_check_without_a_pool_uses_a_probe_connection() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));

    assert!(supervisor.health_check().await);
    connector.set_online(false);
    assert!(!supervisor.health_check().await);

    assert_eq!(connector.probe_calls(), 2);
    assert_eq!(connector.open_calls(), 0);
    assert_eq!(supervisor.state().await, PoolState::Uninitialized);
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));
    supervisor.connect().await.unwrap();

    supervisor.shutdown().await;
    supervisor.shutdown().await;

    assert_eq!(supervisor.state().await, PoolState::Closed);
    assert_eq!(connector.pools_closed(), 1);
    assert!(supervisor.pool_status().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_without_a_pool_still_closes() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));

    supervisor.shutdown().await;

    assert_eq!(supervisor.state().await, PoolState::Closed);
    assert_eq!(connector.pools_closed(), 0);
}

#[tokio::test(start_paused = true)]
async fn closed_supervisor_refuses_connect_and_acquire() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));
    supervisor.connect().await.unwrap();
    supervisor.shutdown().await;

    assert!(matches!(supervisor.connect().await, Err(DbError::Closed)));
    assert!(matches!(supervisor.acquire().await, Err(DbError::NotConnected)));
    assert_eq!(connector.open_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn pool_opened_after_shutdown_is_closed_not_installed() {
    let connector = ScriptedConnector::new().with_open_delay(Duration::from_secs(1));
    let supervisor = supervisor(&connector, config_with_attempts(3));

    let pending = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.connect().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    supervisor.shutdown().await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DbError::Closed)));
    assert_eq!(supervisor.state().await, PoolState::Closed);
    assert_eq!(connector.pools_closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn pool_status_reports_occupancy() {
    let connector = ScriptedConnector::new();
    let supervisor = supervisor(&connector, config_with_attempts(3));
    assert!(supervisor.pool_status().await.is_none());

    supervisor.connect().await.unwrap();
    let _handle = supervisor.acquire().await.unwrap();

    let status = supervisor.pool_status().await.unwrap();
    assert_eq!(status.size, 5);
    assert_eq!(status.idle, 4);
}
