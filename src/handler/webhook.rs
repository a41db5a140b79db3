use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use crate::error::AppError;
use crate::state::AppState;
use crate::webhook::{parse_event, process_event, WebhookOutcome};

/// Receives subscription events from the identity provider
///
/// # Response
///
/// - **400 Bad Request** - signature missing, stale or wrong
/// - **200 OK** - every other case, with the outcome in the body:
///   `success`, `ignored`, `skipped` or `warning`
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, AppError> {
    state.webhook_verifier.verify(&headers, &body)?;

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(outcome) => return Ok(Json(outcome)),
    };
    tracing::info!(event_type = %event.event_type, "verified webhook event");

    let outcome = process_event(&event, &state.classification, state.identity.as_ref()).await;
    Ok(Json(outcome))
}
