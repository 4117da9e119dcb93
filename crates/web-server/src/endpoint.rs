//! One generic handler for every procedure-backed route.
//!
//! An operation is described by a type implementing [`Endpoint`]; the handler
//! runs validation, the call and result formatting the same way for all of them.

use crate::envelope::ApiResponse;
use crate::error::AppError;
use crate::formatter::{self, EndpointKind};
use crate::validator::{FieldError, ParamSchema, RawParams, Reason, RequestValidator};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    handler::Handler,
    routing::{delete, get, post, put, MethodRouter},
};
use core_types::Target;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    fn route<H, T>(self, handler: H) -> MethodRouter<Arc<AppState>>
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        match self {
            Verb::Get => get(handler),
            Verb::Post => post(handler),
            Verb::Put => put(handler),
            Verb::Delete => delete(handler),
        }
    }
}

/// Static description of one API operation.
pub trait Endpoint: Send + Sync + 'static {
    /// Logical operation name, used in logs.
    const OPERATION: &'static str;
    const VERB: Verb;
    const PATH: &'static str;
    const PROCEDURE: &'static str;
    /// Singular, capitalised resource name used in messages ("Sales order").
    const RESOURCE: &'static str;
    /// Message sent with a 500.
    const FAILURE: &'static str;
    const KIND: EndpointKind;

    fn schema() -> ParamSchema;
}

/// An entry of the endpoint map served on `/`, `/health` and unmatched routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: Verb,
    pub path: &'static str,
    pub operation: &'static str,
}

pub struct EndpointHandler<E> {
    _endpoint: PhantomData<E>,
}

impl<E: Endpoint> EndpointHandler<E> {
    pub fn validator() -> RequestValidator {
        RequestValidator::new(E::schema())
    }

    pub fn route_info() -> RouteInfo {
        RouteInfo {
            method: E::VERB,
            path: E::PATH,
            operation: E::OPERATION,
        }
    }

    pub fn method_router() -> MethodRouter<Arc<AppState>> {
        E::VERB.route(serve::<E>)
    }

    /// Validate, invoke, format. Any failure becomes the matching `AppError`.
    pub async fn handle(state: &AppState, raw: RawParams) -> Result<ApiResponse, AppError> {
        let call = Self::validator()
            .validate(E::OPERATION, Target::procedure(E::PROCEDURE), &raw)
            .map_err(AppError::Validation)?;

        tracing::debug!(operation = E::OPERATION, params = call.params.len(), "Invoking procedure");
        let result = state.invoker.invoke(&call).await.map_err(|e| {
            AppError::database(E::OPERATION, E::FAILURE, &e, state.supervisor.config())
        })?;

        formatter::format(E::KIND, E::RESOURCE, result, call.pagination)
    }
}

/// The axum entry point shared by every [`Endpoint`].
async fn serve<E: Endpoint>(
    State(state): State<Arc<AppState>>,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<ApiResponse, AppError> {
    let path = path.map(|Path(params)| params).unwrap_or_default();
    let raw = merge_inputs(query, &body, path)?;
    EndpointHandler::<E>::handle(&state, raw).await
}

/// Query string, then JSON body, then path; later sources win.
pub fn merge_inputs(
    query: HashMap<String, String>,
    body: &[u8],
    path: HashMap<String, String>,
) -> Result<RawParams, AppError> {
    let mut raw: RawParams = query
        .into_iter()
        .map(|(k, v)| (k, JsonValue::String(v)))
        .collect();

    if !body.iter().all(u8::is_ascii_whitespace) {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(JsonValue::Object(fields)) => raw.extend(fields),
            _ => {
                return Err(AppError::Validation(vec![FieldError {
                    field: "body".to_string(),
                    reason: Reason::Type,
                    message: "body must be a JSON object".to_string(),
                }]));
            }
        }
    }

    raw.extend(path.into_iter().map(|(k, v)| (k, JsonValue::String(v))));
    Ok(raw)
}
