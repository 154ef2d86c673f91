//! Authentication failure taxonomy.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_session_cookie};

/// Every way a request can fail to authenticate.
///
/// `ExpiredAccessToken` is the only kind a client may answer with a refresh
/// attempt; signature/shape failures are terminal so forged input never
/// costs a refresh round-trip. `StoreUnavailable` fails closed: the store is
/// the only source of revocation truth, so an unreachable store means
/// unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No access-token cookie on the request
    MissingToken,
    /// Access token with a bad signature or claim shape; terminal
    InvalidToken,
    /// Well-signed access token past its expiry; refresh may recover
    ExpiredAccessToken,
    /// Refresh attempted without a refresh-token cookie
    MissingRefreshToken,
    /// Refresh token with a bad signature, bad shape, or past its expiry
    InvalidRefreshToken,
    /// Refresh token no longer matches the store's current value
    RevokedOrSuperseded,
    /// Token subject resolves to no identity record
    UnknownSubject,
    /// Session or identity store unreachable; fail closed
    StoreUnavailable,
}

impl AuthErrorKind {
    /// Stable machine-readable code carried in the response body so clients
    /// can tell a refreshable expiry from a terminal failure.
    pub fn code(&self) -> &'static str {
        match self {
            AuthErrorKind::MissingToken => "missing_token",
            AuthErrorKind::InvalidToken => "invalid_token",
            AuthErrorKind::ExpiredAccessToken => "expired_access_token",
            AuthErrorKind::MissingRefreshToken => "missing_refresh_token",
            AuthErrorKind::InvalidRefreshToken => "invalid_refresh_token",
            AuthErrorKind::RevokedOrSuperseded => "revoked_or_superseded",
            AuthErrorKind::UnknownSubject => "unknown_subject",
            AuthErrorKind::StoreUnavailable => "store_unavailable",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthErrorKind::MissingToken => "Not authenticated",
            AuthErrorKind::InvalidToken => "Invalid token",
            AuthErrorKind::ExpiredAccessToken => "Access token expired",
            AuthErrorKind::MissingRefreshToken => "No refresh token",
            AuthErrorKind::InvalidRefreshToken => "Invalid or expired refresh token",
            AuthErrorKind::RevokedOrSuperseded => "Refresh token has been revoked or superseded",
            AuthErrorKind::UnknownSubject => "User not found",
            AuthErrorKind::StoreUnavailable => "Session store unavailable",
        }
    }

    /// Whether the response should clear both cookies. Expiry must leave the
    /// refresh cookie usable; a store outage is transient and must not wipe
    /// an otherwise-live session.
    fn ends_session(&self) -> bool {
        match self {
            AuthErrorKind::InvalidToken
            | AuthErrorKind::MissingRefreshToken
            | AuthErrorKind::InvalidRefreshToken
            | AuthErrorKind::RevokedOrSuperseded
            | AuthErrorKind::UnknownSubject => true,
            AuthErrorKind::MissingToken
            | AuthErrorKind::ExpiredAccessToken
            | AuthErrorKind::StoreUnavailable => false,
        }
    }
}

/// An authentication failure ready to become a response. Carries the cookie
/// security flag so the clear-cookie headers match the ones that set them.
#[derive(Debug)]
pub struct AuthError {
    kind: AuthErrorKind,
    secure_cookies: bool,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, secure_cookies: bool) -> Self {
        Self {
            kind,
            secure_cookies,
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use axum::http::{HeaderValue, StatusCode};
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
            code: &'static str,
        }

        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.kind.message(),
                code: self.kind.code(),
            }),
        )
            .into_response();

        if self.kind.ends_session() {
            let headers = response.headers_mut();
            for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
                let clear = clear_session_cookie(name, self.secure_cookies);
                if let Ok(value) = HeaderValue::from_str(&clear) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        response
    }
}
