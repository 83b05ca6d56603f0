//! Axum HTTP server for the API.
//!
//! Only the health probe is an axum route of its own. Everything else under
//! `/api/v1` lands in one catch-all handler that resolves the path with
//! `routing::resolve` and hands the typed route to `handlers::dispatch`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::routing::{any, get};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ServerError};
use crate::handlers::{self, AppContext, Reply};
use crate::routing::{self, API_PREFIX};
use crate::web::response::NOT_FOUND;

/// 1 MB max request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub const HEALTHY: &str = "OK";
pub const UNHEALTHY: &str = "Database connection failed";

/// Build the application router over `ctx`.
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route(&format!("{API_PREFIX}/health"), get(health_handler))
        .route(&format!("{API_PREFIX}/{{*path}}"), any(api_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(ctx)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn start_server<F>(
    addr: SocketAddr,
    ctx: Arc<AppContext>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
    let bound_addr = listener.local_addr().map_err(|e| ServerError::Bind {
        addr: addr.to_string(),
        reason: format!("Failed to get local addr: {}", e),
    })?;
    tracing::info!("API listening on http://{}", bound_addr);

    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("API server shutting down");
        })
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))
}

async fn api_handler(
    State(ctx): State<Arc<AppContext>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Reply, ApiError> {
    let result = match routing::resolve(&method, uri.path()) {
        Ok(route) => handlers::dispatch(&ctx, route, &body).await,
        Err(e) => Err(e.into()),
    };
    if let Err(err) = &result {
        log_rejection(&method, uri.path(), err);
    }
    result
}

/// Log a failed request once. `Internal` was already logged with its cause.
fn log_rejection(method: &Method, path: &str, err: &ApiError) {
    if matches!(err, ApiError::Internal) {
        return;
    }
    tracing::info!(
        %method,
        path,
        status = err.status().as_u16(),
        "Request rejected: {}",
        err
    );
}

async fn health_handler(State(ctx): State<Arc<AppContext>>) -> (StatusCode, &'static str) {
    match ctx.db.ping().await {
        Ok(()) => (StatusCode::OK, HEALTHY),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, UNHEALTHY)
        }
    }
}

async fn not_found_handler(method: Method, uri: Uri) -> ApiError {
    let err = ApiError::NotFound(NOT_FOUND.to_string());
    log_rejection(&method, uri.path(), &err);
    err
}
