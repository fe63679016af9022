//! Webhook endpoint handler.
//!
//! Verifies the delivery signature, then runs the pull-request pipeline
//! before answering. GitHub sees the outcome in the status code: 200 when the
//! delivery was handled (commented or suppressed), 4xx for bad deliveries,
//! 500 when a collaborator failed.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::github::InstallationClientCreator;
use crate::pipeline::{Outcome, PipelineError};
use crate::release_manager::ReleaseManagerApi;
use crate::types::DeliveryId;
use crate::webhooks::verify_signature;

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::Pipeline(e) if e.is_payload_error() => StatusCode::BAD_REQUEST,
            WebhookError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK `Commented` / `Suppressed`: `pull_request` delivery handled
/// - 202 Accepted: event type not handled by the bot
/// - 400 Bad Request: missing header or malformed payload
/// - 401 Unauthorized: invalid signature
/// - 500 Internal Server Error: release manager, template or GitHub failure
pub async fn webhook_handler<C, R>(
    State(app_state): State<AppState<C, R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError>
where
    C: InstallationClientCreator,
    R: ReleaseManagerApi,
{
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery_id = DeliveryId::new(get_header(&headers, HEADER_DELIVERY)?);
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;

    debug!(delivery_id = %delivery_id, event_type = %event_type, "Received webhook");

    // Verify before parsing anything.
    if !verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(delivery_id = %delivery_id, "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let handler = app_state.handler();
    if !handler.handles().contains(&event_type.as_str()) {
        debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring event type");
        return Ok((StatusCode::ACCEPTED, "Ignored"));
    }

    let cancel = app_state.shutdown().child_token();
    let outcome = handler
        .handle(&event_type, &delivery_id, &body, &cancel)
        .await?;

    Ok(match outcome {
        Outcome::Commented { .. } => (StatusCode::OK, "Commented"),
        Outcome::Suppressed(_) => (StatusCode::OK, "Suppressed"),
    })
}

fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
