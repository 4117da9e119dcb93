use crate::backend::BoundStatement;
use crate::error::DbError;
use crate::supervisor::ConnectionSupervisor;
use core_types::{CallRequest, CallResult, Pagination, ParamValue, Target};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Runs validated calls against the database.
///
/// The `ProcedureInvoker` checks a handle out of the supervisor for every call
/// and gives it back when the call ends, however it ends. Whatever the
/// procedure returns is handed back untouched; reading status or verdict rows
/// is left to the caller.
#[derive(Debug, Clone)]
pub struct ProcedureInvoker {
    supervisor: Arc<ConnectionSupervisor>,
    request_timeout: Duration,
}

impl ProcedureInvoker {
    pub fn new(supervisor: Arc<ConnectionSupervisor>) -> Self {
        let request_timeout = supervisor.config().request_timeout();
        Self {
            supervisor,
            request_timeout,
        }
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    /// Binds and executes one call, collecting every row.
    ///
    /// A timed-out call is abandoned; the statement may still finish on the
    /// server but its result is discarded. Nothing is retried.
    pub async fn invoke(&self, request: &CallRequest) -> Result<CallResult, DbError> {
        let statement = bind_call(request)?;
        let mut handle = self.supervisor.acquire().await?;

        debug!(
            operation = %request.operation,
            sql = %statement.sql,
            params = statement.params.len(),
            "Invoking database call"
        );

        let rows = match tokio::time::timeout(self.request_timeout, handle.fetch_all(&statement)).await {
            Ok(rows) => rows?,
            Err(_) => {
                return Err(DbError::RequestTimeout {
                    operation: request.operation.clone(),
                    timeout: self.request_timeout,
                });
            }
        };

        debug!(operation = %request.operation, rows = rows.len(), "Database call finished");
        Ok(CallResult::new(rows))
    }
}

/// Turns a call into SQL text plus positional arguments.
///
/// Procedures become `SELECT * FROM name($1, ..., $n)`; pagination adds two
/// trailing arguments `(offset, fetch)`. Queries keep their text and get a
/// `LIMIT`/`OFFSET` suffix when paginated.
pub fn bind_call(request: &CallRequest) -> Result<BoundStatement, DbError> {
    let mut params: Vec<ParamValue> = request.params.iter().map(|p| p.value.clone()).collect();

    let sql = match &request.target {
        Target::Procedure(name) => {
            validate_procedure_name(name)?;
            if let Some(page) = &request.pagination {
                let (offset, fetch) = page_bounds(page)?;
                params.push(offset);
                params.push(fetch);
            }
            let placeholders = (1..=params.len())
                .map(|i| format!("${i}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("SELECT * FROM {name}({placeholders})")
        }
        Target::Query(text) => match &request.pagination {
            Some(page) => {
                let (offset, fetch) = page_bounds(page)?;
                let base = params.len();
                params.push(fetch);
                params.push(offset);
                format!("{} LIMIT ${} OFFSET ${}", text.trim_end(), base + 1, base + 2)
            }
            None => text.clone(),
        },
    };

    Ok(BoundStatement {
        operation: request.operation.clone(),
        sql,
        params,
    })
}

fn page_bounds(page: &Pagination) -> Result<(ParamValue, ParamValue), DbError> {
    let offset = i32::try_from(page.offset())
        .map_err(|_| DbError::InvalidArgument(format!("page {} is out of range", page.page)))?;
    let fetch = i32::try_from(page.fetch())
        .map_err(|_| DbError::InvalidArgument(format!("limit {} is out of range", page.limit)))?;
    Ok((ParamValue::Int(offset), ParamValue::Int(fetch)))
}

/// Accepts `name` or `schema.name`, each part an unquoted SQL identifier.
fn validate_procedure_name(name: &str) -> Result<(), DbError> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(DbError::InvalidProcedureName(name.to_string()));
    }
    Ok(())
}
