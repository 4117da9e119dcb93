//! # Core Types
//!
//! The typed call model shared by the database layer and the HTTP layer:
//! what a validated request looks like when it reaches the database, and what
//! comes back.

pub mod call;
pub mod enums;
pub mod error;
pub mod result;
pub mod value;

// Re-export the core types to provide a clean public API.
pub use call::{CallParam, CallRequest, Pagination, Target, DEFAULT_PAGE_LIMIT, MAX_PAGE, MAX_PAGE_LIMIT};
pub use enums::ParamType;
pub use error::CoreError;
pub use result::{CallResult, ResultShape, Row};
pub use value::ParamValue;
