//! Physical storage beneath the vault barrier.
//!
//! Backends only ever see [`SealedEntry`] values. Each method is atomic on
//! its own; `swap` and `remove` hand back the previous entry so the barrier
//! can return the prior plaintext without a separate read.

use async_trait::async_trait;
use sqlx::FromRow;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;

use super::error::{Result, SecretsError};
use super::types::SealedEntry;
use crate::storage::DbPool;

/// Key/value storage for sealed entries.
#[async_trait]
pub trait PhysicalBackend: Send + Sync {
    /// Fetch an entry, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<SealedEntry>>;

    /// Insert a new entry. Fails with [`SecretsError::AlreadyExists`] if the key is taken.
    async fn insert(&self, key: &str, entry: SealedEntry) -> Result<()>;

    /// Atomically remove `old_key` and insert `entry` under `new_key`,
    /// returning the removed entry.
    async fn swap(&self, old_key: &str, new_key: &str, entry: SealedEntry) -> Result<SealedEntry>;

    /// Remove an entry and return it.
    async fn remove(&self, key: &str) -> Result<SealedEntry>;
}

/// In-process backend for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, SealedEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, keyring included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl PhysicalBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<SealedEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn insert(&self, key: &str, entry: SealedEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Err(SecretsError::already_exists(key));
        }
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn swap(&self, old_key: &str, new_key: &str, entry: SealedEntry) -> Result<SealedEntry> {
        let mut entries = self.entries.write().await;
        if old_key != new_key && entries.contains_key(new_key) {
            return Err(SecretsError::already_exists(new_key));
        }
        let previous = entries.remove(old_key).ok_or_else(|| SecretsError::not_found(old_key))?;
        entries.insert(new_key.to_string(), entry);
        Ok(previous)
    }

    async fn remove(&self, key: &str) -> Result<SealedEntry> {
        self.entries.write().await.remove(key).ok_or_else(|| SecretsError::not_found(key))
    }
}

#[derive(Debug, FromRow)]
struct VaultEntryRow {
    ciphertext: Vec<u8>,
    nonce: Vec<u8>,
}

impl From<VaultEntryRow> for SealedEntry {
    fn from(row: VaultEntryRow) -> Self {
        Self { ciphertext: row.ciphertext, nonce: row.nonce }
    }
}

/// PostgreSQL backend over the `vault_entries` table.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: DbPool,
}

impl PostgresBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_insert_error(err: sqlx::Error, key: &str) -> SecretsError {
    let unique = err.as_database_error().map(|db| db.is_unique_violation()).unwrap_or(false);
    if unique {
        SecretsError::already_exists(key)
    } else {
        tracing::error!(error = %err, key = %key, "Failed to insert vault entry");
        SecretsError::storage(err, format!("Failed to insert vault entry '{}'", key))
    }
}

#[async_trait]
impl PhysicalBackend for PostgresBackend {
    #[instrument(skip(self), name = "vault_physical_get")]
    async fn get(&self, key: &str) -> Result<Option<SealedEntry>> {
        let row = sqlx::query_as::<_, VaultEntryRow>(
            "SELECT ciphertext, nonce FROM vault_entries WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to read vault entry");
            SecretsError::storage(e, format!("Failed to read vault entry '{}'", key))
        })?;

        Ok(row.map(SealedEntry::from))
    }

    #[instrument(skip(self, entry), name = "vault_physical_insert")]
    async fn insert(&self, key: &str, entry: SealedEntry) -> Result<()> {
        sqlx::query("INSERT INTO vault_entries (key, ciphertext, nonce) VALUES ($1, $2, $3)")
            .bind(key)
            .bind(&entry.ciphertext)
            .bind(&entry.nonce)
            .execute(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, key))?;
        Ok(())
    }

    #[instrument(skip(self, entry), name = "vault_physical_swap")]
    async fn swap(&self, old_key: &str, new_key: &str, entry: SealedEntry) -> Result<SealedEntry> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SecretsError::storage(e, "Failed to begin vault transaction"))?;

        let previous = sqlx::query_as::<_, VaultEntryRow>(
            "DELETE FROM vault_entries WHERE key = $1 RETURNING ciphertext, nonce",
        )
        .bind(old_key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| SecretsError::storage(e, format!("Failed to remove vault entry '{}'", old_key)))?
        .ok_or_else(|| SecretsError::not_found(old_key))?;

        sqlx::query("INSERT INTO vault_entries (key, ciphertext, nonce) VALUES ($1, $2, $3)")
            .bind(new_key)
            .bind(&entry.ciphertext)
            .bind(&entry.nonce)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_insert_error(e, new_key))?;

        tx.commit()
            .await
            .map_err(|e| SecretsError::storage(e, "Failed to commit vault swap"))?;

        Ok(previous.into())
    }

    #[instrument(skip(self), name = "vault_physical_remove")]
    async fn remove(&self, key: &str) -> Result<SealedEntry> {
        sqlx::query_as::<_, VaultEntryRow>(
            "DELETE FROM vault_entries WHERE key = $1 RETURNING ciphertext, nonce",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to delete vault entry");
            SecretsError::storage(e, format!("Failed to delete vault entry '{}'", key))
        })?
        .map(SealedEntry::from)
        .ok_or_else(|| SecretsError::not_found(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(byte: u8) -> SealedEntry {
        SealedEntry { ciphertext: vec![byte; 20], nonce: vec![byte; 12] }
    }

    #[tokio::test]
    async fn test_memory_insert_rejects_duplicates() {
        let backend = MemoryBackend::new();
        backend.insert("a", entry(1)).await.unwrap();
        let err = backend.insert("a", entry(2)).await.unwrap_err();
        assert!(matches!(err, SecretsError::AlreadyExists { .. }));
        assert_eq!(backend.get("a").await.unwrap(), Some(entry(1)));
    }

    #[tokio::test]
    async fn test_memory_swap_returns_previous() {
        let backend = MemoryBackend::new();
        backend.insert("old", entry(1)).await.unwrap();

        let previous = backend.swap("old", "new", entry(2)).await.unwrap();

        assert_eq!(previous, entry(1));
        assert_eq!(backend.get("old").await.unwrap(), None);
        assert_eq!(backend.get("new").await.unwrap(), Some(entry(2)));
    }

    #[tokio::test]
    async fn test_memory_swap_missing_source_changes_nothing() {
        let backend = MemoryBackend::new();
        let err = backend.swap("missing", "new", entry(2)).await.unwrap_err();
        assert!(matches!(err, SecretsError::NotFound { .. }));
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_swap_onto_existing_target_fails() {
        let backend = MemoryBackend::new();
        backend.insert("old", entry(1)).await.unwrap();
        backend.insert("taken", entry(3)).await.unwrap();

        let err = backend.swap("old", "taken", entry(2)).await.unwrap_err();

        assert!(matches!(err, SecretsError::AlreadyExists { .. }));
        assert_eq!(backend.get("old").await.unwrap(), Some(entry(1)));
    }

    #[tokio::test]
    async fn test_memory_remove() {
        let backend = MemoryBackend::new();
        backend.insert("a", entry(1)).await.unwrap();
        assert_eq!(backend.remove("a").await.unwrap(), entry(1));
        assert!(matches!(backend.remove("a").await, Err(SecretsError::NotFound { .. })));
    }
}
