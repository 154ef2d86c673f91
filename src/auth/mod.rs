//! Request authentication: cookie transport, the access-token verifier, and
//! the failure taxonomy shared with the refresh protocol.
//!
//! The verifier is a pure read-and-verify step: it never consults the
//! session store and never refreshes. Expiry is signalled as its own failure
//! kind so the caller can run the refresh protocol; every other failure is
//! terminal.

mod cookie;
mod errors;
mod extractors;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_session_cookie, get_cookie, session_cookie,
};
pub use errors::{AuthError, AuthErrorKind};
pub use extractors::Auth;
pub use state::HasAuthBackend;
pub use types::CurrentUser;
