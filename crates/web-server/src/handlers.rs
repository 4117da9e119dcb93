use crate::endpoint::RouteInfo;
use crate::envelope::{ApiResponse, ResponseEnvelope};
use crate::AppState;
use axum::{
    extract::{OriginalUri, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use database::{PoolState, PoolStatus};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// Always "OK": the service answered. `database` says whether the pool did.
    pub status: &'static str,
    pub database: &'static str,
    pub pool: PoolState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_status: Option<PoolStatus>,
    pub timestamp: String,
    pub endpoints: serde_json::Value,
}

/// # GET /health
/// Runs one round trip against the database. Never changes the pool state, and
/// answers 200 either way: the service itself is up.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    let connected = state.supervisor.health_check().await;
    let report = HealthReport {
        status: "OK",
        database: if connected { "Connected" } else { "Disconnected" },
        pool: state.supervisor.state().await,
        pool_status: state.supervisor.pool_status().await,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        endpoints: endpoint_map(&state.catalog),
    };
    Json(report)
}

/// # GET /
/// Service description: the endpoint map and which database it fronts.
pub async fn index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let config = state.supervisor.config();
    Json(json!({
        "success": true,
        "message": "AdventureWorks API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoint_map(&state.catalog),
        "database": {
            "host": config.host,
            "port": config.port,
            "name": config.database,
        },
    }))
}

/// Fallback for unmatched routes.
pub async fn not_found(State(state): State<Arc<AppState>>, OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    let envelope = ResponseEnvelope::failure("Endpoint not found");
    let mut body = serde_json::to_value(envelope).unwrap_or_default();
    if let Some(fields) = body.as_object_mut() {
        fields.insert("requestedUrl".into(), json!(uri.to_string()));
        fields.insert("availableEndpoints".into(), endpoint_map(&state.catalog));
    }
    (StatusCode::NOT_FOUND, Json(body))
}

/// Rewrites the plain-text 405 and 413 bodies axum produces on its own into
/// failure envelopes. The `Allow` header of a 405 is kept.
pub async fn envelope_bare_rejections(response: Response) -> Response {
    let message = match response.status() {
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed",
        StatusCode::PAYLOAD_TOO_LARGE => "Request body too large",
        _ => return response,
    };
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes().starts_with(b"application/json"));
    if is_json {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut enveloped = ApiResponse::new(response.status(), ResponseEnvelope::failure(message)).into_response();
    if let Some(allow) = allow {
        enveloped.headers_mut().insert(header::ALLOW, allow);
    }
    enveloped
}

/// `"GET /api/persons" -> "ListPersons"`, plus the two built-in routes.
fn endpoint_map(catalog: &[RouteInfo]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("GET /".into(), json!("Service information"));
    map.insert("GET /health".into(), json!("Health check"));
    for route in catalog {
        map.insert(
            format!("{} {}", route.method.as_str(), route.path),
            json!(route.operation),
        );
    }
    serde_json::Value::Object(map)
}
