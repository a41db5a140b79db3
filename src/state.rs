//! Application state shared across all request handlers
//!
//! Built once at startup. Every field is behind an `Arc` (or is `Copy`), so
//! cloning the state per request is cheap and nothing in it is mutated.

use std::sync::Arc;

use redb::Database;

use crate::auth::{Authenticator, JwtAuthenticator, JwtSettings};
use crate::config::Config;
use crate::database::init_db;
use crate::webhook::classify::ClassificationRules;
use crate::webhook::provider::{ClerkClient, IdentityProvider, ProviderError};
use crate::webhook::signature::{SignatureError, WebhookVerifier};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to open database: {0}")]
    Database(#[from] redb::Error),

    #[error("invalid session token key: {0}")]
    JwtKey(#[from] jsonwebtoken::errors::Error),

    #[error("invalid webhook secret: {0}")]
    WebhookSecret(#[from] SignatureError),

    #[error("failed to build identity provider client: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub authenticator: Arc<dyn Authenticator>,
    pub identity: Arc<dyn IdentityProvider>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    pub classification: ClassificationRules,
}

impl AppState {
    /// Opens the database and builds the provider-facing collaborators.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let db = init_db(&config.database_path)?;

        let settings = JwtSettings {
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            ..JwtSettings::default()
        };
        let authenticator = JwtAuthenticator::from_rsa_pems(&config.jwt_public_keys, &settings)?;

        let identity = ClerkClient::new(
            config.clerk_api_base.clone(),
            config.clerk_secret_key.clone(),
            config.provider_timeout,
        )?;

        let webhook_verifier =
            WebhookVerifier::new(&config.webhook_secret)?.with_tolerance(config.webhook_tolerance);

        Ok(Self {
            db: Arc::new(db),
            authenticator: Arc::new(authenticator),
            identity: Arc::new(identity),
            webhook_verifier: Arc::new(webhook_verifier),
            classification: ClassificationRules {
                free_plan: config.free_plan_policy,
            },
        })
    }
}
