//! Shared helpers for the integration tests
//!
//! Every test gets its own temporary database, an HS256 authenticator so
//! tokens can be minted locally, and a provider double that records the
//! metadata updates it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use redb::Database;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use inventory_api::auth::{JwtAuthenticator, JwtSettings};
use inventory_api::database::init_db;
use inventory_api::route::create_app;
use inventory_api::state::AppState;
use inventory_api::webhook::classify::ClassificationRules;
use inventory_api::webhook::provider::{IdentityProvider, ProviderError, SubscriptionMetadata};
use inventory_api::webhook::signature::WebhookVerifier;

pub const JWT_SECRET: &[u8] = b"integration-session-secret";

// base64("inventory-webhook-secret")
pub const WEBHOOK_SECRET: &str = "whsec_aW52ZW50b3J5LXdlYmhvb2stc2VjcmV0";

/// Provider double recording every metadata update
#[derive(Default)]
pub struct RecordingProvider {
    pub calls: Mutex<Vec<(String, SubscriptionMetadata)>>,
    pub fail: bool,
}

impl RecordingProvider {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, SubscriptionMetadata)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for RecordingProvider {
    async fn update_subscription(
        &self,
        user_id: &str,
        metadata: &SubscriptionMetadata,
    ) -> Result<(), ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), metadata.clone()));
        if self.fail {
            return Err(ProviderError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Arc<Database>,
    pub provider: Arc<RecordingProvider>,
    pub verifier: Arc<WebhookVerifier>,
    _db: NamedTempFile,
}

/// Creates a test application with a temporary database
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(RecordingProvider::default(), ClassificationRules::default())
}

pub fn setup_test_app_with(provider: RecordingProvider, rules: ClassificationRules) -> TestApp {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");

    let db = Arc::new(db);
    let provider = Arc::new(provider);
    let verifier = Arc::new(WebhookVerifier::new(WEBHOOK_SECRET).expect("valid webhook secret"));
    let state = AppState {
        db: db.clone(),
        authenticator: Arc::new(JwtAuthenticator::from_secret(
            JWT_SECRET,
            &JwtSettings::default(),
        )),
        identity: provider.clone(),
        webhook_verifier: verifier.clone(),
        classification: rules,
    };

    TestApp {
        app: create_app(state),
        db,
        provider,
        verifier,
        _db: temp_db,
    }
}

/// Mints a session token for `user_id`, valid for an hour
pub fn token_for(user_id: &str) -> String {
    let claims = json!({ "sub": user_id, "exp": Utc::now().timestamp() + 3600 });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET),
    )
    .expect("token should encode")
}

/// Builds a request, optionally authenticated and with a JSON body
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Parses a response body as JSON; non-JSON bodies come back as a string
pub async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Sends a request through the router and returns status and JSON body
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, response_json(response.into_body()).await)
}
