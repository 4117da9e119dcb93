use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use database::{ConnectionSupervisor, ProcedureInvoker};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod endpoint;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod formatter;
pub mod handlers;
pub mod validator;

pub use endpoint::{Endpoint, EndpointHandler, RouteInfo, Verb};
pub use envelope::{ApiResponse, PageInfo, ResponseEnvelope};
pub use error::AppError;
pub use formatter::EndpointKind;
pub use validator::{FieldError, ParamSchema, ParamSpec, Reason, RequestValidator};

/// Request bodies are small JSON documents.
const BODY_LIMIT: usize = 1024 * 1024;

/// The shared application state that all handlers can access.
pub struct AppState {
    pub supervisor: Arc<ConnectionSupervisor>,
    pub invoker: ProcedureInvoker,
    /// Every mounted `/api` route, for the endpoint map.
    pub catalog: Vec<RouteInfo>,
}

/// Builds the complete application router around an already created supervisor.
///
/// The supervisor is not connected here; handlers fail with a 500 until it is.
pub fn build_router(supervisor: Arc<ConnectionSupervisor>) -> Router {
    let (api, catalog) = endpoints::api().into_parts();
    let app_state = Arc::new(AppState {
        invoker: ProcedureInvoker::new(supervisor.clone()),
        supervisor,
        catalog,
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .merge(api)
        .fallback(handlers::not_found)
        .with_state(app_state)
        .layer(middleware::map_response(handlers::envelope_bare_rejections))
        .layer(cors)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

/// Serves the API on `addr` until a termination signal arrives.
///
/// Returns once in-flight requests have drained; closing the pool is left to
/// the caller, which owns the supervisor.
pub async fn run_server(addr: SocketAddr, supervisor: Arc<ConnectionSupervisor>) -> anyhow::Result<()> {
    let app = build_router(supervisor);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Web server stopped accepting requests");
    Ok(())
}

/// Resolves on Ctrl+C, or on SIGTERM where that exists.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install the SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
