//! # Database Crate
//!
//! This crate owns everything between a validated call and the rows that come
//! back from PostgreSQL.
//!
//! ## Architectural Principles
//!
//! - **One supervised pool:** `ConnectionSupervisor` is the single owner of the
//!   connection pool and its lifecycle (`Uninitialized` → `Connecting` → `Ready`
//!   / `Degraded` → `Closed`). Connecting is explicit and retried a bounded
//!   number of times; nothing on the request path ever reconnects.
//! - **Scoped connections:** every call checks one connection out and returns
//!   it when the handle drops, on success and on every error path.
//! - **Driver behind a seam:** the `Connector` / `DatabasePool` /
//!   `DatabaseHandle` traits keep `sqlx` in one module and let tests run
//!   against a scripted backend (`testing` feature).
//!
//! ## Public API
//!
//! - `ConnectionSupervisor`, `PoolState`, `RetryPolicy`: the pool lifecycle.
//! - `ProcedureInvoker`: binds a `CallRequest` and collects a `CallResult`.
//! - `PgConnector`: the PostgreSQL implementation of the seams.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod backend;
pub mod connection;
pub mod error;
pub mod invoker;
pub mod supervisor;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the key components to create a clean, public-facing API.
pub use backend::{BoundStatement, Connector, DatabaseHandle, DatabasePool, Handle, PoolStatus, SharedPool};
pub use connection::PgConnector;
pub use error::DbError;
pub use invoker::{bind_call, ProcedureInvoker};
pub use supervisor::{ConnectionSupervisor, PoolState, RetryPolicy};
