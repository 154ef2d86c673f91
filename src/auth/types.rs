//! Authenticated request context.

use crate::db::User;
use crate::jwt::AccessClaims;

/// The identity attached to a request after the verifier succeeds.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Claims from the verified access token
    pub claims: AccessClaims,
    /// The resolved identity record
    pub user: User,
}
