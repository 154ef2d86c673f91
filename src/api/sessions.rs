//! Session lifecycle API endpoints.
//!
//! - POST `/signup` - create identity, issue + store tokens, set cookies
//! - POST `/login` - verify credential, issue + store tokens, set cookies
//! - POST `/logout` - delete the store entry, clear both cookies
//! - POST `/refresh-token` - exchange a valid refresh token for a new access token
//! - GET `/me` - protected route returning the verified identity

use axum::{
    Json, Router, middleware,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, AuthError, AuthErrorKind, REFRESH_COOKIE_NAME,
    clear_session_cookie, get_cookie, session_cookie,
};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::{TokenIssuer, TokenPair};
use crate::password::{MIN_PASSWORD_LENGTH, hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_signup};
use crate::store::SessionStore;

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub sessions: Arc<dyn SessionStore>,
    pub issuer: Arc<TokenIssuer>,
    pub secure_cookies: bool,
}

impl_has_auth_backend!(SessionsState);

pub fn router(state: SessionsState, rate_limits: Arc<RateLimitConfig>) -> Router {
    let signup_routes = Router::new()
        .route("/signup", post(signup))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            rate_limits.clone(),
            rate_limit_signup,
        ));

    let login_routes = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(rate_limits, rate_limit_login));

    Router::new()
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .route("/me", get(me))
        .with_state(state)
        .merge(signup_routes)
        .merge(login_routes)
}

#[derive(Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct SessionResponse {
    uuid: String,
    username: String,
}

/// Issue a fresh token pair and overwrite the subject's store entry.
///
/// Every login and signup lands here, so "login elsewhere" is a plain
/// overwrite and the superseded refresh token stops matching the store.
async fn establish_session(state: &SessionsState, subject: &str) -> Result<TokenPair, ApiError> {
    let pair = state.issuer.issue_pair(subject).map_err(|e| {
        error!(error = %e, "Failed to issue tokens");
        ApiError::internal("Failed to issue tokens")
    })?;

    state
        .sessions
        .put(
            subject,
            &pair.refresh.token,
            Duration::from_secs(pair.refresh.duration),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to store refresh token");
            ApiError::internal("Session store unavailable")
        })?;

    Ok(pair)
}

type SessionCookies = AppendHeaders<[(axum::http::HeaderName, String); 2]>;

fn session_cookies(pair: &TokenPair, secure: bool) -> SessionCookies {
    AppendHeaders([
        (
            SET_COOKIE,
            session_cookie(
                ACCESS_COOKIE_NAME,
                &pair.access.token,
                pair.access.duration,
                secure,
            ),
        ),
        (
            SET_COOKIE,
            session_cookie(
                REFRESH_COOKIE_NAME,
                &pair.refresh.token,
                pair.refresh.duration,
                secure,
            ),
        ),
    ])
}

fn clear_cookies(secure: bool) -> SessionCookies {
    AppendHeaders([
        (SET_COOKIE, clear_session_cookie(ACCESS_COOKIE_NAME, secure)),
        (SET_COOKIE, clear_session_cookie(REFRESH_COOKIE_NAME, secure)),
    ])
}

async fn signup(
    State(state): State<SessionsState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();

    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }

    if username.len() > 32 {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }

    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let available = state
        .db
        .users()
        .is_username_available(username)
        .await
        .db_err("Failed to check username availability")?;

    if !available {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let password_hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to process credentials")
    })?;

    let uuid = uuid::Uuid::new_v4().to_string();

    state
        .db
        .users()
        .create(&uuid, username, &password_hash)
        .await
        .db_err("Failed to create user")?;

    let pair = establish_session(&state, &uuid).await?;

    Ok((
        StatusCode::CREATED,
        session_cookies(&pair, state.secure_cookies),
        Json(SessionResponse {
            uuid,
            username: username.to_string(),
        }),
    ))
}

async fn login(
    State(state): State<SessionsState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // One uniform rejection for unknown username and wrong password alike.
    let rejected = || ApiError::unauthorized("Invalid username or password");

    let user = state
        .db
        .users()
        .get_by_username(payload.username.trim())
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(rejected)?;

    let verified = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "Failed to verify credential");
        ApiError::internal("Failed to process credentials")
    })?;

    if !verified {
        return Err(rejected());
    }

    let pair = establish_session(&state, &user.uuid).await?;

    Ok((
        StatusCode::OK,
        session_cookies(&pair, state.secure_cookies),
        Json(SessionResponse {
            uuid: user.uuid,
            username: user.username,
        }),
    ))
}

/// Logout - delete the subject's store entry and clear both cookies.
/// Idempotent: succeeds with missing, garbage, or already-revoked cookies.
async fn logout(State(state): State<SessionsState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(refresh_token) = get_cookie(&headers, REFRESH_COOKIE_NAME) {
        if let Ok(claims) = state.issuer.verify_refresh(refresh_token) {
            // Best effort: a missed delete still lapses by TTL, and the
            // cookies are cleared regardless.
            if let Err(e) = state.sessions.delete(&claims.sub).await {
                warn!(error = %e, "Failed to delete session entry");
            }
        }
    }

    (
        StatusCode::OK,
        clear_cookies(state.secure_cookies),
        Json(serde_json::json!({ "success": true })),
    )
}

/// Exchange a valid refresh token for a new access token.
///
/// The presented token must verify under the refresh secret AND be
/// byte-identical to the store's current value for its subject; that
/// comparison is the subsystem's sole revocation check. The refresh token is
/// not rotated; only the access cookie is reissued.
async fn refresh_token(
    State(state): State<SessionsState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let secure = state.secure_cookies;
    let fail = |kind: AuthErrorKind| ApiError::from(AuthError::new(kind, secure));

    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .ok_or_else(|| fail(AuthErrorKind::MissingRefreshToken))?;

    let claims = state
        .issuer
        .verify_refresh(presented)
        .map_err(|_| fail(AuthErrorKind::InvalidRefreshToken))?;

    let stored = state
        .sessions
        .get(&claims.sub)
        .await
        .map_err(|e| {
            error!(error = %e, "Session store unreachable during refresh");
            fail(AuthErrorKind::StoreUnavailable)
        })?
        .ok_or_else(|| fail(AuthErrorKind::RevokedOrSuperseded))?;

    if !bool::from(stored.as_bytes().ct_eq(presented.as_bytes())) {
        return Err(fail(AuthErrorKind::RevokedOrSuperseded));
    }

    let access = state.issuer.issue_access(&claims.sub).map_err(|e| {
        error!(error = %e, "Failed to issue access token");
        ApiError::internal("Failed to issue tokens")
    })?;

    Ok((
        StatusCode::OK,
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(ACCESS_COOKIE_NAME, &access.token, access.duration, secure),
        )]),
        Json(serde_json::json!({ "success": true })),
    ))
}

/// Protected route: returns the identity the verifier attached.
async fn me(Auth(current): Auth) -> impl IntoResponse {
    Json(SessionResponse {
        uuid: current.user.uuid,
        username: current.user.username,
    })
}
