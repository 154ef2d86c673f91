//! Client-side refresh coordination.
//!
//! When several in-flight requests all fail with an expired access token at
//! once, only one refresh call should reach the server. The coordinator
//! collapses concurrent [`RefreshCoordinator::ensure_fresh_session`] calls
//! into a single shared future: the first caller starts the refresh, later
//! callers join it, and every waiter observes the identical outcome. This is
//! single-flight deduplication, not a lock on a shared resource; redundant
//! refreshes would each succeed against the same store entry, just
//! wastefully.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex};

/// The network side of a refresh: one `POST /auth/refresh-token` round-trip.
/// A trait so tests can count and gate calls.
#[async_trait]
pub trait SessionTransport: Send + Sync + 'static {
    async fn refresh(&self) -> Result<(), RefreshFailure>;
}

/// Why a refresh call failed. Cloneable so every waiter on the shared flight
/// receives the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// No refresh cookie was available to present
    MissingRefreshToken,
    /// The server rejected the refresh token's signature or expiry
    InvalidRefreshToken,
    /// The server's store no longer holds this token (logout or newer login)
    RevokedOrSuperseded,
    /// The server could not consult its store; failed closed
    StoreUnavailable,
    /// The call never completed
    Transport(String),
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshFailure::MissingRefreshToken => write!(f, "No refresh token"),
            RefreshFailure::InvalidRefreshToken => write!(f, "Invalid or expired refresh token"),
            RefreshFailure::RevokedOrSuperseded => {
                write!(f, "Refresh token has been revoked or superseded")
            }
            RefreshFailure::StoreUnavailable => write!(f, "Session store unavailable"),
            RefreshFailure::Transport(msg) => write!(f, "Refresh transport error: {}", msg),
        }
    }
}

/// How a protected request reports its outcome to [`RefreshCoordinator::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// The server answered with `expired_access_token`; a refresh may recover
    ExpiredAccessToken,
    /// Any other failure; never answered with a refresh
    Terminal(String),
}

/// Failure of an [`RefreshCoordinator::execute`] call as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The refresh itself failed; the local session has been cleared
    Refresh(RefreshFailure),
    /// The request failed for a reason a refresh cannot fix
    Terminal(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Refresh(e) => write!(f, "Session refresh failed: {}", e),
            ClientError::Terminal(msg) => write!(f, "Request failed: {}", msg),
        }
    }
}

type RefreshFlight = Shared<BoxFuture<'static, Result<(), RefreshFailure>>>;

/// Deduplicates concurrent refresh attempts into one in-flight call.
pub struct RefreshCoordinator {
    transport: Arc<dyn SessionTransport>,
    in_flight: Mutex<Option<RefreshFlight>>,
    identity: Mutex<Option<String>>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            transport,
            in_flight: Mutex::new(None),
            identity: Mutex::new(None),
        }
    }

    /// Record the identity established at login.
    pub fn set_identity(&self, subject: impl Into<String>) {
        *self.identity.lock().unwrap() = Some(subject.into());
    }

    /// The client-held identity, if a session is live.
    pub fn identity(&self) -> Option<String> {
        self.identity.lock().unwrap().clone()
    }

    /// Ensure exactly one refresh call is in flight and await its outcome.
    ///
    /// A caller arriving while a refresh is pending joins it instead of
    /// issuing a second network call. On failure every waiter gets the same
    /// error and the client-held identity is cleared (local logout; the
    /// server needs no further call).
    pub async fn ensure_fresh_session(&self) -> Result<(), RefreshFailure> {
        let flight = {
            let mut slot = self.in_flight.lock().unwrap();
            match slot.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    let transport = self.transport.clone();
                    let flight = async move { transport.refresh().await }.boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let result = flight.clone().await;

        // Retire the completed flight so a later expiry starts a new one.
        // ptr_eq guards against clearing a newer flight some other caller
        // has already started.
        {
            let mut slot = self.in_flight.lock().unwrap();
            if slot.as_ref().is_some_and(|f| f.ptr_eq(&flight)) {
                *slot = None;
            }
        }

        if result.is_err() {
            self.identity.lock().unwrap().take();
        }

        result
    }

    /// Run a protected request with exactly one retry-after-refresh.
    ///
    /// Only an expired access token triggers the refresh path; terminal
    /// failures propagate untouched, and a request that is still expired
    /// after a successful refresh is not retried again.
    pub async fn execute<R, F, Fut>(&self, mut call: F) -> Result<R, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, RequestFailure>>,
    {
        match call().await {
            Ok(value) => Ok(value),
            Err(RequestFailure::Terminal(msg)) => Err(ClientError::Terminal(msg)),
            Err(RequestFailure::ExpiredAccessToken) => {
                self.ensure_fresh_session()
                    .await
                    .map_err(ClientError::Refresh)?;
                match call().await {
                    Ok(value) => Ok(value),
                    Err(RequestFailure::ExpiredAccessToken) => Err(ClientError::Terminal(
                        "Access token still expired after refresh".to_string(),
                    )),
                    Err(RequestFailure::Terminal(msg)) => Err(ClientError::Terminal(msg)),
                }
            }
        }
    }
}
