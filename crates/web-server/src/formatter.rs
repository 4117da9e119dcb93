//! Reads a `CallResult` according to the kind of operation that produced it.
//!
//! The rows are never rewritten; only the status code and the envelope around
//! them depend on the result shape.

use crate::envelope::{ApiResponse, PageInfo, ResponseEnvelope};
use crate::error::AppError;
use core_types::{CallResult, Pagination, ResultShape};
use serde_json::Value as JsonValue;

/// What an operation does, which decides how its result is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A paginated row set, possibly filtered by a parent key.
    List,
    /// A single row by key; no row is a 404.
    Lookup,
    Create,
    Update,
    Delete,
}

/// Builds the success response for `result`, or the client error it encodes.
pub fn format(
    kind: EndpointKind,
    resource: &str,
    result: CallResult,
    page: Option<Pagination>,
) -> Result<ApiResponse, AppError> {
    match kind {
        EndpointKind::List => Ok(ApiResponse::ok(list(result, page))),
        EndpointKind::Lookup => match result.into_rows().into_iter().next() {
            Some(row) => Ok(ApiResponse::ok(ResponseEnvelope::ok(JsonValue::Object(row)))),
            None => Err(not_found(resource)),
        },
        EndpointKind::Create => {
            let message = format!("{resource} created successfully");
            match result.shape() {
                ResultShape::Verdict { success: false, message: reason } => Err(rejected(resource, reason)),
                ResultShape::Affected(0) => Err(AppError::BusinessRejection(format!("{resource} was not created"))),
                _ => Ok(ApiResponse::created(written(result, message))),
            }
        }
        EndpointKind::Update | EndpointKind::Delete => {
            let verb = if kind == EndpointKind::Update { "updated" } else { "deleted" };
            let message = format!("{resource} {verb} successfully");
            match result.shape() {
                ResultShape::Verdict { success: false, message: reason } => Err(rejected(resource, reason)),
                ResultShape::Verdict { success: true, message: Some(reason) } => {
                    Ok(ApiResponse::ok(written(result, reason)))
                }
                ResultShape::Affected(0) => Err(not_found(resource)),
                ResultShape::RowSet if result.is_empty() => Err(not_found(resource)),
                _ => Ok(ApiResponse::ok(written(result, message))),
            }
        }
    }
}

fn list(result: CallResult, page: Option<Pagination>) -> ResponseEnvelope {
    let count = result.len();
    let total = result.total_count().unwrap_or(count as u64);
    let rows = result.into_rows().into_iter().map(JsonValue::Object).collect();

    let envelope = ResponseEnvelope::ok(JsonValue::Array(rows)).with_count(count);
    match page {
        Some(page) => envelope.with_pagination(PageInfo {
            page: page.page,
            limit: page.limit,
            total,
        }),
        None => envelope,
    }
}

/// The first returned row, if any, under a confirmation message.
fn written(result: CallResult, message: String) -> ResponseEnvelope {
    match result.into_rows().into_iter().next() {
        Some(row) => ResponseEnvelope::ok(JsonValue::Object(row)).with_message(message),
        None => ResponseEnvelope::done(message),
    }
}

fn not_found(resource: &str) -> AppError {
    AppError::NotFound(format!("{resource} not found"))
}

fn rejected(resource: &str, reason: Option<String>) -> AppError {
    AppError::BusinessRejection(reason.unwrap_or_else(|| format!("{resource} could not be modified")))
}
