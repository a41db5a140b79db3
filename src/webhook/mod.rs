//! Subscription webhook pipeline
//!
//! A verified delivery goes through three steps:
//!
//! 1. find the subject user id ([`classify::extract_user_id`])
//! 2. classify the event into a subscription state ([`classify::classify`])
//! 3. push that state to the identity provider
//!
//! Only signature failures reject a delivery. Everything after verification
//! is acknowledged with 200 so the provider never retries a payload that
//! cannot be processed; problems are reported in the body and logged.

pub mod classify;
pub mod provider;
pub mod signature;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use classify::{Classification, ClassificationRules, SubscriptionStatus};
use provider::{IdentityProvider, SubscriptionMetadata};

/// Provider event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// What happened to a delivery, returned as the webhook response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    #[serde(rename = "success")]
    Updated {
        event: String,
        user_id: String,
        subscription_status: SubscriptionStatus,
        subscription_plan: Option<String>,
    },
    Ignored {
        event: String,
    },
    Skipped {
        event: String,
        reason: String,
    },
    Warning {
        event: Option<String>,
        user_id: Option<String>,
        warning: String,
    },
}

/// Parses a verified body. Parse failures become a `Warning` outcome.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, WebhookOutcome> {
    serde_json::from_slice(body).map_err(|err| {
        tracing::warn!(error = %err, "webhook body is not a valid event envelope");
        WebhookOutcome::Warning {
            event: None,
            user_id: None,
            warning: format!("unreadable event envelope: {err}"),
        }
    })
}

/// Runs a verified event through extraction, classification and propagation.
pub async fn process_event(
    event: &WebhookEvent,
    rules: &ClassificationRules,
    provider: &dyn IdentityProvider,
) -> WebhookOutcome {
    let event_type = event.event_type.as_str();

    let Some(user_id) = classify::extract_user_id(event_type, &event.data) else {
        tracing::warn!(event_type, "no user id in webhook payload, skipping update");
        return WebhookOutcome::Skipped {
            event: event_type.to_string(),
            reason: "no user_id".to_string(),
        };
    };

    let state = match classify::classify(event_type, &event.data, rules) {
        Classification::Resolved(state) => state,
        Classification::Unrecognized => {
            tracing::info!(event_type, "ignoring unrecognized webhook event");
            return WebhookOutcome::Ignored {
                event: event_type.to_string(),
            };
        }
    };

    let metadata = SubscriptionMetadata::from(&state);
    tracing::info!(
        event_type,
        user_id = %user_id,
        status = ?state.status,
        plan = ?state.plan,
        "updating subscription metadata"
    );

    match provider.update_subscription(&user_id, &metadata).await {
        Ok(()) => WebhookOutcome::Updated {
            event: event_type.to_string(),
            user_id,
            subscription_status: state.status,
            subscription_plan: state.plan,
        },
        Err(err) => {
            tracing::warn!(event_type, user_id = %user_id, error = %err, "subscription metadata update failed");
            WebhookOutcome::Warning {
                event: Some(event_type.to_string()),
                user_id: Some(user_id),
                warning: err.to_string(),
            }
        }
    }
}
