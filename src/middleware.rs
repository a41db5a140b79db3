//! Request middleware
//!
//! Session authentication for the protected routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::auth::{extract_bearer, AuthError, UserId};
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, inserted into request extensions by
/// [`auth_middleware`]
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

/// Middleware that requires a valid `Authorization: Bearer <token>` header
///
/// The token is handed to the configured authenticator. On success the
/// caller's id is attached to the request as [`AuthUser`]; any failure is
/// answered with 401 before the handler runs.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::InvalidFormat))
        .transpose()?;
    let token = extract_bearer(header)?;

    let user_id = state.authenticator.authenticate(token).await.map_err(|err| {
        tracing::debug!(error = %err, "rejected credential");
        err
    })?;

    request.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(request).await)
}
