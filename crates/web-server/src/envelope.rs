use crate::validator::FieldError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Page bounds echoed back on list responses.
///
/// `total` is the procedure's own `total_count` when it reports one and the
/// number of rows on this page otherwise, so it can be smaller than the full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

/// The uniform JSON body of every API response.
///
/// Failure envelopes are only built through [`ResponseEnvelope::failure`], which
/// never carries `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl ResponseEnvelope {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            message: None,
            count: None,
            data: Some(data),
            pagination: None,
            error: None,
            errors: None,
        }
    }

    /// A success that only carries a message.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            data: None,
            ..Self::ok(JsonValue::Null)
        }
        .with_message(message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            count: None,
            data: None,
            pagination: None,
            error: None,
            errors: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_pagination(mut self, pagination: PageInfo) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// An envelope paired with its status code.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub envelope: ResponseEnvelope,
}

impl ApiResponse {
    pub fn new(status: StatusCode, envelope: ResponseEnvelope) -> Self {
        Self { status, envelope }
    }

    pub fn ok(envelope: ResponseEnvelope) -> Self {
        Self::new(StatusCode::OK, envelope)
    }

    pub fn created(envelope: ResponseEnvelope) -> Self {
        Self::new(StatusCode::CREATED, envelope)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
