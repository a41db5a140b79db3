//! Outbound identity-provider calls
//!
//! The only thing pushed back to the provider is the subscription state,
//! stored in the user's public metadata. The call is a merge-style PATCH,
//! so replaying it for the same state is harmless.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::classify::{SubscriptionState, SubscriptionStatus};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider rejected the update with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Metadata keys written to the user's public metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionMetadata {
    pub subscription_status: SubscriptionStatus,
    pub subscription_plan: Option<String>,
}

impl From<&SubscriptionState> for SubscriptionMetadata {
    fn from(state: &SubscriptionState) -> Self {
        Self {
            subscription_status: state.status,
            subscription_plan: state.plan.clone(),
        }
    }
}

#[derive(Serialize)]
struct MetadataUpdate<'a> {
    public_metadata: &'a SubscriptionMetadata,
}

/// Writes subscription metadata for a user
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn update_subscription(
        &self,
        user_id: &str,
        metadata: &SubscriptionMetadata,
    ) -> Result<(), ProviderError>;
}

/// Clerk backend API client
pub struct ClerkClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl ClerkClient {
    /// Builds a client whose requests give up after `timeout`. Nothing is retried.
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn metadata_url(&self, user_id: &str) -> String {
        format!("{}/users/{}/metadata", self.api_base, user_id)
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn update_subscription(
        &self,
        user_id: &str,
        metadata: &SubscriptionMetadata,
    ) -> Result<(), ProviderError> {
        let response = self
            .http
            .patch(self.metadata_url(user_id))
            .bearer_auth(&self.secret_key)
            .json(&MetadataUpdate {
                public_metadata: metadata,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(user_id, status = status.as_u16(), "identity provider metadata updated");
        Ok(())
    }
}
