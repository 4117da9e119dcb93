use crate::error::CoreError;
use crate::value::ParamValue;

/// Default page size when a paginated operation receives no `limit`.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Highest page number; keeps the offset of any page within a 32-bit integer.
pub const MAX_PAGE: u32 = i32::MAX as u32 / MAX_PAGE_LIMIT;

/// Where a call is executed: a named server-side routine or a literal statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A stored procedure (a set-returning function), e.g. `usp_sales_orders_get_by_id`.
    Procedure(String),
    /// A parametrized statement using positional `$n` placeholders.
    Query(String),
}

impl Target {
    pub fn procedure(name: impl Into<String>) -> Self {
        Target::Procedure(name.into())
    }

    pub fn query(sql: impl Into<String>) -> Self {
        Target::Query(sql.into())
    }
}

/// 1-based page bounds, translated into offset/fetch when the call is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Result<Self, CoreError> {
        if page == 0 || page > MAX_PAGE || limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(CoreError::InvalidPagination { page, limit });
        }
        Ok(Self { page, limit })
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    /// Number of rows to return.
    pub fn fetch(&self) -> i64 {
        i64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// A single named argument of a call, kept in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CallParam {
    pub name: String,
    pub value: ParamValue,
}

/// A fully-typed request to run one database operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Logical operation name used for logging, e.g. "GetOrderById".
    pub operation: String,
    pub target: Target,
    pub params: Vec<CallParam>,
    pub pagination: Option<Pagination>,
}

impl CallRequest {
    pub fn new(operation: impl Into<String>, target: Target) -> Self {
        Self {
            operation: operation.into(),
            target,
            params: Vec::new(),
            pagination: None,
        }
    }

    /// Appends a parameter. Binding order follows insertion order.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push(CallParam {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}
