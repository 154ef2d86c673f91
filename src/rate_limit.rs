//! Rate limiting for the credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to prevent brute force
//! attacks against login and signup.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

/// Per-IP rate limiter for endpoint-specific limiting.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for the credential endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login (strict: 5 attempts, then 1 per second)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for signup (strict: 3 per minute)
    pub signup: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with default configuration.
    /// In test mode, limits are much higher to allow rapid test execution.
    pub fn new() -> Self {
        #[cfg(feature = "test-mode")]
        const LOGIN_PER_SEC: u32 = 1000;
        #[cfg(not(feature = "test-mode"))]
        const LOGIN_PER_SEC: u32 = 1;

        #[cfg(feature = "test-mode")]
        const LOGIN_BURST: u32 = 1000;
        #[cfg(not(feature = "test-mode"))]
        const LOGIN_BURST: u32 = 5;

        #[cfg(feature = "test-mode")]
        const SIGNUP_PER_MIN: u32 = 1000;
        #[cfg(not(feature = "test-mode"))]
        const SIGNUP_PER_MIN: u32 = 3;

        Self {
            login: Arc::new(RateLimiter::keyed(
                Quota::per_second(NonZeroU32::new(LOGIN_PER_SEC).unwrap())
                    .allow_burst(NonZeroU32::new(LOGIN_BURST).unwrap()),
            )),
            signup: Arc::new(RateLimiter::keyed(Quota::per_minute(
                NonZeroU32::new(SIGNUP_PER_MIN).unwrap(),
            ))),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&request) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many authentication attempts. Please wait before trying again.",
        )
            .into_response(),
    }
}

/// Middleware for rate limiting signup.
pub async fn rate_limit_signup(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = client_ip(&request) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match config.signup.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many signup attempts. Please wait before trying again.",
        )
            .into_response(),
    }
}

/// Extract the client IP address from a request.
fn client_ip(request: &Request) -> Option<String> {
    use axum::extract::ConnectInfo;
    use std::net::SocketAddr;

    // Check X-Forwarded-For header first (reverse proxy)
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            if let Some(first_ip) = value.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}
