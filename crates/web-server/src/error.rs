use crate::envelope::{ApiResponse, ResponseEnvelope};
use crate::validator::FieldError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use configuration::ConnectionConfig;
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by the database: {0}")]
    BusinessRejection(String),

    /// `detail` has already been scrubbed of credentials.
    #[error("{message} ({operation}): {detail}")]
    Database {
        operation: String,
        message: String,
        detail: String,
        infrastructure: bool,
    },
}

impl AppError {
    /// Wraps a database failure, scrubbing the configured password from its text.
    pub fn database(
        operation: &str,
        message: impl Into<String>,
        err: &DbError,
        config: &ConnectionConfig,
    ) -> Self {
        AppError::Database {
            operation: operation.to_string(),
            message: message.into(),
            detail: config.redact(&err.to_string()),
            infrastructure: err.is_infrastructure(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BusinessRejection(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Converts our custom `AppError` into an enveloped HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = match self {
            AppError::Validation(errors) => {
                ResponseEnvelope::failure("Validation failed").with_errors(errors)
            }
            AppError::NotFound(message) => ResponseEnvelope::failure(message),
            AppError::BusinessRejection(message) => {
                tracing::info!(%message, "Request rejected by a business rule");
                ResponseEnvelope::failure(message)
            }
            AppError::Database {
                operation,
                message,
                detail,
                infrastructure,
            } => {
                tracing::error!(%operation, infrastructure, error = %detail, "Database call failed.");
                ResponseEnvelope::failure(message).with_error(detail)
            }
        };

        ApiResponse::new(status, envelope).into_response()
    }
}
