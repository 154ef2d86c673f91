//! SQLite-backed session store.
//!
//! Shares the identity database's connection pool. SQLite has no native TTL,
//! so expiry is enforced lazily on `get` and eagerly by the cleanup
//! scheduler via [`SqliteSessionStore::delete_expired`].

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use std::time::Duration;

use super::{SessionStore, StoreError};

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete all entries past their TTL. Returns the number removed.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= unixepoch()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn put(
        &self,
        subject: &str,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        // Single upsert statement: the overwrite is atomic, no
        // read-modify-write window.
        sqlx::query(
            "INSERT INTO sessions (subject, refresh_token, expires_at) \
             VALUES (?, ?, unixepoch() + ?) \
             ON CONFLICT(subject) DO UPDATE SET \
               refresh_token = excluded.refresh_token, \
               expires_at = excluded.expires_at",
        )
        .bind(subject)
        .bind(refresh_token)
        .bind(ttl.as_secs() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, subject: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT refresh_token FROM sessions WHERE subject = ? AND expires_at > unixepoch()",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(token,)| token))
    }

    async fn delete(&self, subject: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE subject = ?")
            .bind(subject)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
