//! HTTP server for the alert webhook.

use crate::auth::{AuthError, BearerAuth};
use crate::core::BatchResult;
use crate::internal_metrics::Metrics;
use crate::normalize::InvalidPayload;
use crate::pipeline::AlertPipeline;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// How much of the raw body is echoed into the debug log.
const BODY_SNIPPET_CHARS: usize = 2000;

/// Shared, read-only state of the webhook handler.
pub struct ServerState {
    pub pipeline: AlertPipeline,
    pub auth: BearerAuth,
    pub metrics: Metrics,
}

/// Request-fatal errors. Element-level problems never end up here.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error(transparent)]
    InvalidPayload(#[from] InvalidPayload),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
            ApiError::InvalidPayload(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid_json", "raw_length": e.raw_length })),
            )
                .into_response(),
        }
    }
}

/// Build the webhook router.
pub fn build_router(state: Arc<ServerState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/alert", post(alert_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Alert webhook handler.
#[instrument(skip_all)]
async fn alert_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BatchResult>, ApiError> {
    log_request(&headers, &body);

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = state.auth.authorize(authorization) {
        warn!(reason = %e, "Unauthorized request (bad/missing Bearer token)");
        state.metrics.rejected_unauthorized_total.increment(1);
        return Err(e.into());
    }

    let batch = match state.pipeline.process_body(&body).await {
        Ok(batch) => batch,
        Err(e) => {
            warn!(raw_length = e.raw_length, error = %e.source, "Could not parse incoming payload");
            state.metrics.rejected_invalid_json_total.increment(1);
            return Err(e.into());
        }
    };

    info!(
        received = batch.received_raw_count,
        processed = batch.processed,
        skipped = batch.skipped,
        errors = batch.errors.len(),
        "Processed alert webhook"
    );
    Ok(Json(batch))
}

/// Logs the headers of interest and the start of the body. The token itself
/// is never logged.
fn log_request(headers: &HeaderMap, body: &[u8]) {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    let raw = String::from_utf8_lossy(body);
    let snippet: String = raw.chars().take(BODY_SNIPPET_CHARS).collect();
    debug!(
        content_type = %header_str(header::CONTENT_TYPE),
        user_agent = %header_str(header::USER_AGENT),
        has_authorization = headers.contains_key(header::AUTHORIZATION),
        raw_length = raw.chars().count(),
        body = %snippet,
        "Incoming alert webhook"
    );
}
