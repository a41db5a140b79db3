//! Runtime configuration
//!
//! Read from environment variables (optionally seeded from a `.env` file by
//! `dotenvy` in `main`). Parsing goes through a lookup function so it can be
//! tested without touching the process environment.

use std::time::Duration;

use crate::webhook::classify::FreePlanPolicy;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_PATH: &str = "data.db";
pub const DEFAULT_CLERK_API_BASE: &str = "https://api.clerk.com/v1";
pub const DEFAULT_LOG_FILTER: &str = "inventory_api=debug,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub clerk_api_base: String,
    pub clerk_secret_key: String,
    pub webhook_secret: String,
    /// PEM public keys for session tokens, current key first
    pub jwt_public_keys: Vec<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub provider_timeout: Duration,
    pub webhook_tolerance: Duration,
    pub free_plan_policy: FreePlanPolicy,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let mut jwt_public_keys = vec![unescape_pem(&required("CLERK_JWT_KEY")?)];
        if let Some(previous) = optional("CLERK_JWT_PREVIOUS_KEY") {
            jwt_public_keys.push(unescape_pem(&previous));
        }

        Ok(Self {
            port: parse_or("PORT", optional("PORT"), DEFAULT_PORT)?,
            database_path: optional("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            clerk_api_base: optional("CLERK_API_BASE")
                .unwrap_or_else(|| DEFAULT_CLERK_API_BASE.to_string()),
            clerk_secret_key: required("CLERK_SECRET_KEY")?,
            webhook_secret: required("CLERK_WEBHOOK_SECRET")?,
            jwt_public_keys,
            jwt_issuer: optional("CLERK_JWT_ISSUER"),
            jwt_audience: optional("CLERK_JWT_AUDIENCE"),
            provider_timeout: Duration::from_secs(parse_or(
                "PROVIDER_TIMEOUT_SECS",
                optional("PROVIDER_TIMEOUT_SECS"),
                10,
            )?),
            webhook_tolerance: Duration::from_secs(parse_or(
                "WEBHOOK_TOLERANCE_SECS",
                optional("WEBHOOK_TOLERANCE_SECS"),
                300,
            )?),
            free_plan_policy: parse_or(
                "FREE_PLAN_POLICY",
                optional("FREE_PLAN_POLICY"),
                FreePlanPolicy::default(),
            )?,
            log_filter: optional("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
        }),
    }
}

// Multi-line PEM blocks are commonly stored in env files with literal `\n`.
fn unescape_pem(value: &str) -> String {
    value.replace("\\n", "\n")
}
