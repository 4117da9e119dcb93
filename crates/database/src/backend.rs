//! The seams between the supervisor and a concrete driver.
//!
//! `Connector` opens pools, `DatabasePool` hands out connections and
//! `DatabaseHandle` runs statements on one checked-out connection. The
//! PostgreSQL implementation lives in `connection`; tests use `testing`.

use crate::error::DbError;
use async_trait::async_trait;
use configuration::ConnectionConfig;
use core_types::{ParamValue, Row};
use serde::Serialize;
use std::sync::Arc;

/// A statement with its arguments, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    /// Logical operation name, for logs.
    pub operation: String,
    pub sql: String,
    /// Positional arguments: `params[0]` binds to `$1`.
    pub params: Vec<ParamValue>,
}

/// Occupancy of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Open connections, idle or checked out.
    pub size: u32,
    pub idle: u32,
}

/// A single checked-out connection. Dropping it returns the connection to its pool.
#[async_trait]
pub trait DatabaseHandle: Send {
    async fn fetch_all(&mut self, statement: &BoundStatement) -> Result<Vec<Row>, DbError>;
}

/// A checked-out connection, owned for the duration of one call.
pub type Handle = Box<dyn DatabaseHandle>;

#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Waits for a free connection, up to the pool's acquire timeout.
    async fn acquire(&self) -> Result<Handle, DbError>;

    /// One trivial round trip through the pool.
    async fn ping(&self) -> Result<(), DbError>;

    /// Waits for checked-out connections to come back, then closes everything.
    async fn close(&self);

    fn status(&self) -> PoolStatus;
}

pub type SharedPool = Arc<dyn DatabasePool>;

/// Opens pools for a given configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, config: &ConnectionConfig) -> Result<SharedPool, DbError>;

    /// Opens a single throwaway connection, runs a trivial query and closes it.
    /// Never touches any pool.
    async fn probe(&self, config: &ConnectionConfig) -> Result<(), DbError>;
}
