//! Webhook signature verification (Svix scheme)
//!
//! The provider signs `"{msg_id}.{timestamp}.{body}"` with HMAC-SHA256 using
//! the base64 key behind the `whsec_` prefix, and sends one or more
//! `v1,<base64 signature>` entries separated by spaces. A delivery is
//! accepted when any entry matches and the timestamp is within tolerance.

use std::time::Duration;

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";
const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

const ID_HEADERS: [&str; 2] = ["svix-id", "webhook-id"];
const TIMESTAMP_HEADERS: [&str; 2] = ["svix-timestamp", "webhook-timestamp"];
const SIGNATURE_HEADERS: [&str; 2] = ["svix-signature", "webhook-signature"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("webhook secret is not valid base64")]
    InvalidSecret,
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("invalid timestamp header")]
    InvalidTimestamp,
    #[error("timestamp outside the accepted tolerance")]
    TimestampOutOfTolerance,
    #[error("no matching signature found")]
    NoMatchingSignature,
}

pub struct WebhookVerifier {
    key: Vec<u8>,
    tolerance: Duration,
}

impl WebhookVerifier {
    /// Builds a verifier from a `whsec_...` secret. The prefix is optional.
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SignatureError::InvalidSecret)?;
        if key.is_empty() {
            return Err(SignatureError::InvalidSecret);
        }
        Ok(Self {
            key,
            tolerance: DEFAULT_TOLERANCE,
        })
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verifies a delivery against the current time.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    /// Verifies a delivery as if the current unix time were `now`.
    pub fn verify_at(&self, headers: &HeaderMap, body: &[u8], now: i64) -> Result<(), SignatureError> {
        let msg_id = header(headers, &ID_HEADERS)?;
        let timestamp_raw = header(headers, &TIMESTAMP_HEADERS)?;
        let signatures = header(headers, &SIGNATURE_HEADERS)?;

        let timestamp: i64 = timestamp_raw
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if now.abs_diff(timestamp) > self.tolerance.as_secs() {
            return Err(SignatureError::TimestampOutOfTolerance);
        }

        let mac = self.mac(msg_id, timestamp_raw.trim(), body)?;
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, signature)| STANDARD.decode(signature).ok())
            .any(|expected| mac.clone().verify_slice(&expected).is_ok());

        if matched {
            Ok(())
        } else {
            Err(SignatureError::NoMatchingSignature)
        }
    }

    /// Computes the `v1,<signature>` header value for a delivery.
    pub fn sign(&self, msg_id: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
        let mac = self.mac(msg_id, &timestamp.to_string(), body)?;
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("{SIGNATURE_VERSION},{signature}"))
    }

    fn mac(&self, msg_id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(msg_id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }
}

fn header<'a>(headers: &'a HeaderMap, names: &[&'static str; 2]) -> Result<&'a str, SignatureError> {
    names
        .iter()
        .find_map(|name| headers.get(*name).and_then(|value| value.to_str().ok()))
        .ok_or(SignatureError::MissingHeader(names[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    // base64("inventory-webhook-secret")
    const SECRET: &str = "whsec_aW52ZW50b3J5LXdlYmhvb2stc2VjcmV0";
    const NOW: i64 = 1_760_000_000;
    const BODY: &[u8] = br#"{"type":"user.created","data":{"id":"user_1"}}"#;

    fn signed_headers(verifier: &WebhookVerifier, timestamp: i64, body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("svix-id", HeaderValue::from_static("msg_1"));
        headers.insert(
            "svix-timestamp",
            HeaderValue::from_str(&timestamp.to_string()).unwrap(),
        );
        let signature = verifier.sign("msg_1", timestamp, body).unwrap();
        headers.insert("svix-signature", HeaderValue::from_str(&signature).unwrap());
        headers
    }

    #[test]
    fn accepts_valid_signature() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, NOW, BODY);
        assert_eq!(verifier.verify_at(&headers, BODY, NOW + 10), Ok(()));
    }

    #[test]
    fn accepts_any_matching_entry() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let mut headers = signed_headers(&verifier, NOW, BODY);
        let valid = headers["svix-signature"].to_str().unwrap().to_string();
        let combined = format!("v1,Zm9vYmFy v2,ignored {valid}");
        headers.insert("svix-signature", HeaderValue::from_str(&combined).unwrap());
        assert_eq!(verifier.verify_at(&headers, BODY, NOW), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, NOW, BODY);
        let tampered = br#"{"type":"user.deleted","data":{"id":"user_1"}}"#;
        assert_eq!(
            verifier.verify_at(&headers, tampered, NOW),
            Err(SignatureError::NoMatchingSignature)
        );
    }

    #[test]
    fn rejects_other_secret() {
        let signer = WebhookVerifier::new("whsec_b3RoZXItc2VjcmV0").unwrap();
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&signer, NOW, BODY);
        assert_eq!(
            verifier.verify_at(&headers, BODY, NOW),
            Err(SignatureError::NoMatchingSignature)
        );
    }

    #[test]
    fn rejects_stale_and_future_timestamps() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let headers = signed_headers(&verifier, NOW, BODY);
        assert_eq!(
            verifier.verify_at(&headers, BODY, NOW + 301),
            Err(SignatureError::TimestampOutOfTolerance)
        );
        assert_eq!(
            verifier.verify_at(&headers, BODY, NOW - 301),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn reports_missing_headers() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let mut headers = signed_headers(&verifier, NOW, BODY);
        headers.remove("svix-signature");
        assert_eq!(
            verifier.verify_at(&headers, BODY, NOW),
            Err(SignatureError::MissingHeader("svix-signature"))
        );
    }

    #[test]
    fn accepts_webhook_header_aliases() {
        let verifier = WebhookVerifier::new(SECRET).unwrap();
        let svix = signed_headers(&verifier, NOW, BODY);
        let mut headers = HeaderMap::new();
        headers.insert("webhook-id", svix["svix-id"].clone());
        headers.insert("webhook-timestamp", svix["svix-timestamp"].clone());
        headers.insert("webhook-signature", svix["svix-signature"].clone());
        assert_eq!(verifier.verify_at(&headers, BODY, NOW), Ok(()));
    }

    #[test]
    fn rejects_malformed_secret() {
        assert!(matches!(
            WebhookVerifier::new("whsec_***"),
            Err(SignatureError::InvalidSecret)
        ));
    }
}
