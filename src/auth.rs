//! Caller authentication
//!
//! Handlers never verify credentials themselves. They receive the caller's
//! user id from the [`Authenticator`] installed in the application state.
//! The production implementation, [`JwtAuthenticator`], verifies the
//! provider's session tokens locally against its published public keys.

use async_trait::async_trait;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Identifier of an authenticated user, as issued by the identity provider
pub type UserId = String;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredential,
    #[error("Invalid authorization credential")]
    InvalidFormat,
    #[error("Session token expired")]
    Expired,
    #[error("Session token is not valid yet")]
    NotYetValid,
    #[error("Invalid session token signature")]
    SignatureInvalid,
    #[error("Session token audience mismatch")]
    AudienceMismatch,
    #[error("Session token issuer mismatch")]
    IssuerMismatch,
    /// Reserved for authenticators that consult the provider over the network.
    #[error("Identity provider unreachable")]
    ProviderUnreachable,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidFormat => "invalid_format",
            Self::Expired => "token_expired",
            Self::NotYetValid => "token_not_yet_valid",
            Self::SignatureInvalid => "signature_invalid",
            Self::AudienceMismatch => "audience_mismatch",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::ProviderUnreachable => "provider_unreachable",
        }
    }
}

/// Resolves a bearer credential to the caller's user id
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Result<UserId, AuthError>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredential)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidFormat);
    }
    Ok(token)
}

/// Optional claim checks applied on top of signature and expiry.
#[derive(Clone, Debug)]
pub struct JwtSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: u64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
}

/// Verifies session JWTs against a set of keys
///
/// The first key is the current one. Further keys are tried only when the
/// token's signature does not match, which keeps tokens signed before a key
/// rotation valid until they expire.
#[derive(Clone)]
pub struct JwtAuthenticator {
    keys: Vec<DecodingKey>,
    validation: Validation,
}

impl JwtAuthenticator {
    /// RS256 verification with PEM-encoded public keys, current key first.
    pub fn from_rsa_pems<S: AsRef<str>>(
        pems: &[S],
        settings: &JwtSettings,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let keys = pems
            .iter()
            .map(|pem| DecodingKey::from_rsa_pem(pem.as_ref().as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(keys, Algorithm::RS256, settings))
    }

    /// HS256 verification with a shared secret.
    pub fn from_secret(secret: &[u8], settings: &JwtSettings) -> Self {
        Self::new(vec![DecodingKey::from_secret(secret)], Algorithm::HS256, settings)
    }

    fn new(keys: Vec<DecodingKey>, algorithm: Algorithm, settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = settings.leeway_seconds;
        validation.validate_nbf = true;
        match &settings.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }
        Self { keys, validation }
    }

    fn decode(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut last_error = AuthError::SignatureInvalid;
        for key in &self.keys {
            match jsonwebtoken::decode::<SessionClaims>(token, key, &self.validation) {
                Ok(decoded) => return Ok(decoded.claims),
                Err(err) if is_signature_error(&err) => last_error = AuthError::SignatureInvalid,
                Err(err) => return Err(map_decode_error(&err)),
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, credential: &str) -> Result<UserId, AuthError> {
        let claims = self.decode(credential)?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidFormat);
        }
        Ok(claims.sub)
    }
}

fn is_signature_error(error: &jsonwebtoken::errors::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm
    )
}

fn map_decode_error(error: &jsonwebtoken::errors::Error) -> AuthError {
    match error.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::ImmatureSignature => AuthError::NotYetValid,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
        _ => AuthError::InvalidFormat,
    }
}
