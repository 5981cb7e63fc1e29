//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, info_span, Instrument};

use crate::deploy::pipeline::StatusNotifier;
use crate::models::deployment::DeploymentRequest;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Header name for the event type.
pub const HEADER_EVENT: &str = "x-github-event";
/// Header name for the body signature.
pub const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "hookdeploy".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Query parameters of the deployment endpoint
#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub token: Option<String>,
}

/// Deployment endpoint.
///
/// The pipeline runs in its own task so a client disconnect does not abort a
/// deployment half way. The response head is sent once the status is settled;
/// the transcript streams as `text/plain`, one line per entry.
pub async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<WebhookQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (token, query_error) = match query {
        Ok(Query(query)) => (query.token, None),
        Err(rejection) => (None, Some(rejection.body_text())),
    };
    let request = DeploymentRequest {
        event: header_value(&headers, HEADER_EVENT),
        signature: header_value(&headers, HEADER_SIGNATURE),
        token,
        query_error,
        body,
    };

    let deployment_id = uuid::Uuid::new_v4();
    let span = info_span!("deployment", id = %deployment_id);

    let (line_tx, line_rx) = mpsc::unbounded_channel::<String>();
    let (status_tx, status_rx) = oneshot::channel();

    let controller = state.controller.clone();
    tokio::spawn(
        async move {
            let log = controller.transcript(Some(line_tx));
            let outcome = controller
                .handle(&request, &log, StatusNotifier::new(status_tx))
                .await;
            info!(state = ?outcome.state, status = %outcome.status, "Webhook request finished");
        }
        .instrument(span),
    );

    // a dropped sender means the pipeline task panicked
    let status = status_rx.await.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let stream = futures::stream::unfold(line_rx, |mut rx| async move {
        rx.recv().await.map(|mut line| {
            line.push('\n');
            (Ok::<_, Infallible>(Bytes::from(line)), rx)
        })
    });

    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

fn header_value(headers: &HeaderMap, name: &'static str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
