//! HTTP/JSON gateway in front of kvstore-server.
//!
//! Request lifecycle: contract validation, then a handler, then one backend
//! call through [`KvClient`], then the status mapping back to HTTP.

pub mod client;
pub mod handler;
pub mod validation;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use client::{GrpcKvClient, KvClient};
use handler::{
    AppState, contract_handler, delete_handler, get_handler, health_handler, set_handler,
};
pub use validation::RequestValidator;

/// Upper bound on the time spent serving one HTTP request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Key-value and health routes, without contract validation
pub fn routes(client: Arc<dyn KvClient>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/kv", post(set_handler))
        .route("/kv/:key", get(get_handler).delete(delete_handler))
        // values carry no size limit
        .layer(DefaultBodyLimit::disable())
        .with_state(AppState { client })
}

/// The full gateway: routes, contract document, validation, tracing
pub fn router(client: Arc<dyn KvClient>, validator: Arc<RequestValidator>) -> Router {
    routes(client)
        .route(
            "/openapi.yaml",
            get(contract_handler).with_state(Arc::clone(&validator)),
        )
        .layer(middleware::from_fn_with_state(
            validator,
            validation::validate_request,
        ))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

/// Serve `app` until `shutdown` resolves, then let in-flight requests finish
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("REST API server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("REST API server stopped");
    Ok(())
}
