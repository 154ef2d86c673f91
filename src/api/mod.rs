mod error;
mod sessions;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::TokenIssuer;
use crate::rate_limit::RateLimitConfig;
use crate::store::SessionStore;

pub use sessions::SessionsState;

/// Create the API router. All session-lifecycle routes live under `/auth`.
pub fn create_api_router(
    db: Database,
    sessions: Arc<dyn SessionStore>,
    issuer: Arc<TokenIssuer>,
    secure_cookies: bool,
) -> Router {
    let rate_limits = Arc::new(RateLimitConfig::new());

    let sessions_state = SessionsState {
        db,
        sessions,
        issuer,
        secure_cookies,
    };

    Router::new().nest("/auth", sessions::router(sessions_state, rate_limits))
}
