//! Session store: the TTL revocation ledger for refresh tokens.
//!
//! Maps `subject -> current refresh token`. One live entry per subject;
//! `put` always overwrites wholesale, so the refresh path's equality check
//! against the stored value is the subsystem's single revocation point.
//! The store is an injected dependency (`Arc<dyn SessionStore>`), never a
//! process-wide singleton, so it can be faked in tests and swapped for any
//! TTL-capable backend.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use std::time::Duration;

/// TTL key-value contract for the refresh-token ledger.
///
/// All operations are atomic at single-key granularity. `put` is an
/// unconditional overwrite with TTL reset (no compare-and-swap, no merge)
/// so concurrent writers for one subject race only as last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store the current refresh token for a subject, silently evicting any
    /// prior entry and resetting its TTL.
    async fn put(&self, subject: &str, refresh_token: &str, ttl: Duration)
    -> Result<(), StoreError>;

    /// Fetch the current refresh token for a subject. Entries past their TTL
    /// are absent.
    async fn get(&self, subject: &str) -> Result<Option<String>, StoreError>;

    /// Remove the entry for a subject (revocation). Removing an absent entry
    /// is not an error.
    async fn delete(&self, subject: &str) -> Result<(), StoreError>;
}

/// A store backend failure. The caller treats this as "fail closed": the
/// store is the only source of revocation truth, so an unreachable store
/// means unauthenticated, never a granted refresh.
#[derive(Debug)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session store error: {}", self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::new(e.to_string())
    }
}
