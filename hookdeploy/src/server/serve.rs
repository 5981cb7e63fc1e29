//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DeployError;
use crate::server::handlers::{health_handler, version_handler, webhook_handler};
use crate::server::state::ServerState;

/// Largest accepted webhook body. GitHub caps push payloads at 25 MB.
pub const WEBHOOK_BODY_LIMIT: usize = 25 * 1024 * 1024;

/// Build the router. The webhook answers GET and POST on `/` and on
/// `webhook_path`.
pub fn router(state: Arc<ServerState>, webhook_path: &str) -> Router {
    let mut app = Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Deployment
        .route("/", get(webhook_handler).post(webhook_handler));

    if webhook_path != "/" && !webhook_path.is_empty() {
        app = app.route(webhook_path, get(webhook_handler).post(webhook_handler));
    }

    app.with_state(state)
        .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DeployError>>, DeployError> {
    let app = router(state, &options.webhook_path);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DeployError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeployError::ServerError(e.to_string()))
    });

    Ok(handle)
}
