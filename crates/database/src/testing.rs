//! A scripted, in-memory backend for tests.
//!
//! `ScriptedConnector` stands in for a real server: it counts how many pools
//! were opened, can fail or stall on open, can go offline, and answers
//! statements through a user-supplied responder. Handles check a permit out of
//! a semaphore sized like the configured pool, so acquire timeouts behave like
//! the real thing.

use crate::backend::{BoundStatement, Connector, DatabaseHandle, DatabasePool, Handle, PoolStatus, SharedPool};
use crate::error::DbError;
use async_trait::async_trait;
use configuration::ConnectionConfig;
use core_types::Row;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Produces the rows for a statement.
pub type Responder = Arc<dyn Fn(&BoundStatement) -> Result<Vec<Row>, DbError> + Send + Sync>;

/// Builds a row from a JSON object literal.
///
/// # Panics
/// When `value` is not an object.
pub fn row(value: JsonValue) -> Row {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("row() expects a JSON object, got {other}"),
    }
}

struct Script {
    failures_left: AtomicUsize,
    open_delay_ms: AtomicU64,
    query_delay_ms: AtomicU64,
    online: AtomicBool,
    responder: RwLock<Responder>,
    open_error: RwLock<Option<String>>,

    open_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    handles_acquired: AtomicUsize,
    handles_released: AtomicUsize,
    pools_closed: AtomicUsize,
    statements: Mutex<Vec<BoundStatement>>,
}

/// A `Connector` whose behaviour is set up by the test.
#[derive(Clone)]
pub struct ScriptedConnector {
    script: Arc<Script>,
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedConnector {
    /// Opens successfully and answers every statement with no rows.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script {
                failures_left: AtomicUsize::new(0),
                open_delay_ms: AtomicU64::new(0),
                query_delay_ms: AtomicU64::new(0),
                online: AtomicBool::new(true),
                responder: RwLock::new(Arc::new(|_| Ok(Vec::new()))),
                open_error: RwLock::new(None),
                open_calls: AtomicUsize::new(0),
                probe_calls: AtomicUsize::new(0),
                handles_acquired: AtomicUsize::new(0),
                handles_released: AtomicUsize::new(0),
                pools_closed: AtomicUsize::new(0),
                statements: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The first `count` opens fail.
    pub fn failing(self, count: usize) -> Self {
        self.script.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Every open fails, like an unreachable host.
    pub fn unreachable(self) -> Self {
        self.failing(usize::MAX)
    }

    /// Failed opens report `message` instead of a generic refusal.
    pub fn with_open_error(self, message: impl Into<String>) -> Self {
        if let Ok(mut slot) = self.script.open_error.write() {
            *slot = Some(message.into());
        }
        self
    }

    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.script.open_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn with_query_delay(self, delay: Duration) -> Self {
        self.script.query_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: Fn(&BoundStatement) -> Result<Vec<Row>, DbError> + Send + Sync + 'static,
    {
        self.set_responder(responder);
        self
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&BoundStatement) -> Result<Vec<Row>, DbError> + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.script.responder.write() {
            *slot = Arc::new(responder);
        }
    }

    /// Takes the server up or down. While down, pings, probes and statements fail.
    pub fn set_online(&self, online: bool) {
        self.script.online.store(online, Ordering::SeqCst);
    }

    pub fn open_calls(&self) -> usize {
        self.script.open_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.script.probe_calls.load(Ordering::SeqCst)
    }

    pub fn handles_acquired(&self) -> usize {
        self.script.handles_acquired.load(Ordering::SeqCst)
    }

    pub fn handles_released(&self) -> usize {
        self.script.handles_released.load(Ordering::SeqCst)
    }

    pub fn pools_closed(&self) -> usize {
        self.script.pools_closed.load(Ordering::SeqCst)
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<BoundStatement> {
        self.script
            .statements
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn is_online(&self) -> bool {
        self.script.online.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<SharedPool, DbError> {
        self.script.open_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.script.open_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let should_fail = self
            .script
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if should_fail || !self.is_online() {
            let scripted = self.script.open_error.read().ok().and_then(|slot| slot.clone());
            return Err(DbError::Backend(scripted.unwrap_or_else(|| {
                format!("could not connect to server at {}: connection refused", config.describe())
            })));
        }

        let max = config.pool.max_connections.max(1);
        Ok(Arc::new(MemoryPool {
            script: self.script.clone(),
            permits: Arc::new(Semaphore::new(max as usize)),
            max_connections: max,
            acquire_timeout: config.pool.acquire_timeout(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn probe(&self, config: &ConnectionConfig) -> Result<(), DbError> {
        self.script.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_online() {
            Ok(())
        } else {
            Err(DbError::Backend(format!("server at {} is unreachable", config.describe())))
        }
    }
}

/// The pool handed out by [`ScriptedConnector`].
pub struct MemoryPool {
    script: Arc<Script>,
    permits: Arc<Semaphore>,
    max_connections: u32,
    acquire_timeout: Duration,
    closed: AtomicBool,
}

#[async_trait]
impl DatabasePool for MemoryPool {
    async fn acquire(&self) -> Result<Handle, DbError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Closed);
        }
        let permit = match tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(DbError::Closed),
            Err(_) => return Err(DbError::AcquireTimeout(self.acquire_timeout)),
        };
        self.script.handles_acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryHandle {
            script: self.script.clone(),
            _permit: permit,
        }))
    }

    async fn ping(&self) -> Result<(), DbError> {
        if self.script.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::Backend("connection reset by peer".into()))
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.permits.close();
            self.script.pools_closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.max_connections,
            idle: self.permits.available_permits() as u32,
        }
    }
}

struct MemoryHandle {
    script: Arc<Script>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl DatabaseHandle for MemoryHandle {
    async fn fetch_all(&mut self, statement: &BoundStatement) -> Result<Vec<Row>, DbError> {
        if let Ok(mut log) = self.script.statements.lock() {
            log.push(statement.clone());
        }

        let delay = self.script.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if !self.script.online.load(Ordering::SeqCst) {
            return Err(DbError::Backend("connection reset by peer".into()));
        }

        let responder = self
            .script
            .responder
            .read()
            .map(|r| r.clone())
            .map_err(|_| DbError::Backend("responder lock poisoned".into()))?;
        responder(statement)
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.script.handles_released.fetch_add(1, Ordering::SeqCst);
    }
}
