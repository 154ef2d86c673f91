//! In-memory session store for tests and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{SessionStore, StoreError};

/// A [`SessionStore`] over a plain map with per-entry deadlines. Expiry is
/// checked on `get`.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    refresh_token: String,
    deadline: Instant,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        subject: &str,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            subject.to_string(),
            Entry {
                refresh_token: refresh_token.to_string(),
                deadline: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, subject: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        match entries.get(subject) {
            Some(entry) if entry.deadline > Instant::now() => {
                Ok(Some(entry.refresh_token.clone()))
            }
            Some(_) => {
                entries.remove(subject);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, subject: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(subject);
        Ok(())
    }
}
