//! HTTP request handlers
//!
//! Handlers translate requests into repository calls and shape the JSON
//! responses. Errors are returned as [`crate::error::AppError`].

pub mod cars;
pub mod watchlists;
pub mod webhook;

use axum::Json;
use serde_json::{json, Value};

/// Liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
