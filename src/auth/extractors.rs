//! Axum extractors running the access-token verifier.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::{AuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::CurrentUser;
use crate::jwt::TokenError;

/// The verifier. Pure read-and-verify, in order:
///
/// 1. absent cookie -> `MissingToken`
/// 2. bad signature/shape -> `InvalidToken` (terminal, never refreshed)
/// 3. well-signed but expired -> `ExpiredAccessToken` (caller may refresh)
/// 4. valid -> resolve the identity; gone -> `UnknownSubject`
///
/// No session-store lookup happens here: only the refresh protocol consults
/// the store.
async fn authenticate_request<S>(parts: &Parts, state: &S) -> Result<CurrentUser, AuthErrorKind>
where
    S: HasAuthBackend + Send + Sync,
{
    let token =
        get_cookie(&parts.headers, ACCESS_COOKIE_NAME).ok_or(AuthErrorKind::MissingToken)?;

    let claims = state.issuer().verify_access(token).map_err(|e| match e {
        TokenError::Expired => AuthErrorKind::ExpiredAccessToken,
        _ => AuthErrorKind::InvalidToken,
    })?;

    let user = state
        .db()
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load identity");
            AuthErrorKind::StoreUnavailable
        })?
        .ok_or(AuthErrorKind::UnknownSubject)?;

    Ok(CurrentUser { claims, user })
}

/// Extractor for endpoints that require a verified access token.
pub struct Auth(pub CurrentUser);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(parts, state)
            .await
            .map(Auth)
            .map_err(|kind| AuthError::new(kind, state.secure_cookies()))
    }
}

