//! Lifecycle of the process-wide connection pool.
//!
//! ```text
//! Uninitialized ──connect──▶ Connecting ──ok──▶ Ready ──shutdown──▶ Closed
//!                              │    ▲
//!                          fail│    │retry (fixed delay, bounded attempts)
//!                              ▼    │
//!                            Degraded ──attempts exhausted──▶ ConnectionExhausted
//! ```
//!
//! Only `connect` moves the state forward and only `shutdown` closes it.
//! Request-path code calls `acquire`, which never connects: a broken handle
//! surfaces to the caller and `Ready` is never demoted behind its back.

use crate::backend::{Connector, Handle, PoolStatus, SharedPool};
use crate::connection::PgConnector;
use crate::error::DbError;
use configuration::{ConnectionConfig, RetryConfig};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Where the pool is in its lifecycle. There is exactly one per supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PoolState {
    Uninitialized,
    Connecting,
    Ready,
    /// The last connect attempt failed; the message is already redacted.
    Degraded { last_error: String },
    Closed,
}

impl PoolState {
    pub fn name(&self) -> &'static str {
        match self {
            PoolState::Uninitialized => "uninitialized",
            PoolState::Connecting => "connecting",
            PoolState::Ready => "ready",
            PoolState::Degraded { .. } => "degraded",
            PoolState::Closed => "closed",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the connect phase retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: config.delay(),
        }
    }
}

/// Outcome shared by every caller waiting on the same connect attempt.
#[derive(Debug, Clone)]
enum ConnectFailure {
    Exhausted { attempts: u32, last_error: String },
    Closed,
}

impl From<ConnectFailure> for DbError {
    fn from(failure: ConnectFailure) -> Self {
        match failure {
            ConnectFailure::Exhausted { attempts, last_error } => {
                DbError::ConnectionExhausted { attempts, last_error }
            }
            ConnectFailure::Closed => DbError::Closed,
        }
    }
}

type ConnectAttempt = Shared<BoxFuture<'static, Result<SharedPool, ConnectFailure>>>;

struct Slot {
    state: PoolState,
    pool: Option<SharedPool>,
    in_flight: Option<ConnectAttempt>,
}

struct Inner {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    slot: Mutex<Slot>,
}

/// Owns the connection pool: opens it with bounded retries, hands out
/// connections, checks health and closes it on shutdown.
///
/// Create one per process and share it behind an `Arc`.
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("target", &self.inner.config.describe())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl ConnectionSupervisor {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let policy = RetryPolicy::from(&config.retry);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                policy,
                slot: Mutex::new(Slot {
                    state: PoolState::Uninitialized,
                    pool: None,
                    in_flight: None,
                }),
            }),
        }
    }

    /// A supervisor backed by the PostgreSQL driver.
    pub fn postgres(config: ConnectionConfig) -> Self {
        Self::new(config, Arc::new(PgConnector))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Snapshot of the current lifecycle state.
    pub async fn state(&self) -> PoolState {
        self.inner.slot.lock().await.state.clone()
    }

    /// Opens the pool, or returns it if it is already open.
    ///
    /// Concurrent callers share a single in-flight attempt and all observe its
    /// outcome. Each failed attempt leaves the state `Degraded`; after
    /// `max_attempts` failures the call ends with `ConnectionExhausted`.
    pub async fn connect(&self) -> Result<SharedPool, DbError> {
        let attempt = {
            let mut slot = self.inner.slot.lock().await;
            match (&slot.state, &slot.pool) {
                (PoolState::Ready, Some(pool)) => return Ok(pool.clone()),
                (PoolState::Closed, _) => return Err(DbError::Closed),
                _ => {}
            }

            if let Some(attempt) = slot.in_flight.clone() {
                debug!("Joining in-flight connect attempt");
                attempt
            } else {
                slot.state = PoolState::Connecting;
                let attempt = establish(self.inner.clone()).boxed().shared();
                slot.in_flight = Some(attempt.clone());
                attempt
            }
        };

        attempt.await.map_err(DbError::from)
    }

    /// Checks out one connection. Fails with `NotConnected` unless the pool is
    /// `Ready`; it never triggers a connect.
    pub async fn acquire(&self) -> Result<Handle, DbError> {
        let pool = self.ready_pool().await?;
        pool.acquire().await
    }

    /// Runs a trivial round trip with a short timeout.
    ///
    /// Uses the pool when it is `Ready` and a throwaway probe connection
    /// otherwise. The lifecycle state is never changed, whatever the outcome.
    pub async fn health_check(&self) -> bool {
        let pool = self.ready_pool().await.ok();
        let timeout = self.inner.config.health_check_timeout();

        let round_trip = async {
            match &pool {
                Some(pool) => pool.ping().await,
                None => self.inner.connector.probe(&self.inner.config).await,
            }
        };

        match tokio::time::timeout(timeout, round_trip).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %self.inner.config.redact(&e.to_string()), "Database health check failed");
                false
            }
            Err(_) => {
                warn!(?timeout, "Database health check timed out");
                false
            }
        }
    }

    /// Occupancy of the open pool, if there is one.
    pub async fn pool_status(&self) -> Option<PoolStatus> {
        let slot = self.inner.slot.lock().await;
        slot.pool.as_ref().map(|pool| pool.status())
    }

    /// Drains and closes the pool and moves to `Closed`.
    ///
    /// Safe to call any number of times, including before the pool was ever
    /// opened. A connect attempt still running is abandoned.
    pub async fn shutdown(&self) {
        let pool = {
            let mut slot = self.inner.slot.lock().await;
            if slot.state == PoolState::Closed {
                debug!("Shutdown requested but the pool is already closed");
                return;
            }
            slot.state = PoolState::Closed;
            slot.in_flight = None;
            slot.pool.take()
        };

        let Some(pool) = pool else {
            info!("Connection supervisor closed; no pool was open");
            return;
        };

        info!(database = %self.inner.config.describe(), "Closing database connection pool");
        let timeout = self.inner.config.shutdown_timeout();
        match tokio::time::timeout(timeout, pool.close()).await {
            Ok(()) => info!("Database connection pool closed"),
            Err(_) => warn!(?timeout, "Timed out waiting for database connections to close"),
        }
    }

    async fn ready_pool(&self) -> Result<SharedPool, DbError> {
        let slot = self.inner.slot.lock().await;
        match (&slot.state, &slot.pool) {
            (PoolState::Ready, Some(pool)) => Ok(pool.clone()),
            _ => Err(DbError::NotConnected),
        }
    }
}

/// The bounded retry loop behind `connect`. Runs once per in-flight attempt.
async fn establish(inner: Arc<Inner>) -> Result<SharedPool, ConnectFailure> {
    let policy = inner.policy;
    let connect_timeout = inner.config.connect_timeout();
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        info!(
            attempt,
            max_attempts = policy.max_attempts,
            database = %inner.config.describe(),
            "Connecting to database"
        );

        let opened = match tokio::time::timeout(connect_timeout, inner.connector.open(&inner.config)).await {
            Ok(result) => result,
            Err(_) => Err(DbError::ConnectTimeout(connect_timeout)),
        };

        match opened {
            Ok(pool) => return inner.install(pool).await,
            Err(e) => {
                last_error = inner.config.redact(&e.to_string());
                warn!(attempt, error = %last_error, "Database connection attempt failed");
                if !inner.degrade(&last_error).await {
                    return Err(ConnectFailure::Closed);
                }
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay).await;
            if !inner.mark_connecting().await {
                return Err(ConnectFailure::Closed);
            }
        }
    }

    error!(
        attempts = policy.max_attempts,
        error = %last_error,
        "Giving up on the database connection"
    );
    inner.slot.lock().await.in_flight = None;
    Err(ConnectFailure::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}

impl Inner {
    /// Publishes a freshly opened pool, unless shutdown won the race.
    async fn install(&self, pool: SharedPool) -> Result<SharedPool, ConnectFailure> {
        {
            let mut slot = self.slot.lock().await;
            slot.in_flight = None;
            if slot.state != PoolState::Closed {
                slot.state = PoolState::Ready;
                slot.pool = Some(pool.clone());
                info!(database = %self.config.describe(), "Connected to database");
                return Ok(pool);
            }
        }
        warn!("Pool opened after shutdown began; closing it");
        pool.close().await;
        Err(ConnectFailure::Closed)
    }

    /// Records a failed attempt. Returns false when the supervisor was closed meanwhile.
    async fn degrade(&self, last_error: &str) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.state == PoolState::Closed {
            slot.in_flight = None;
            return false;
        }
        slot.state = PoolState::Degraded {
            last_error: last_error.to_string(),
        };
        true
    }

    async fn mark_connecting(&self) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.state == PoolState::Closed {
            slot.in_flight = None;
            return false;
        }
        slot.state = PoolState::Connecting;
        true
    }
}
