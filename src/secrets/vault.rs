//! Secret vault contract and its barrier-backed implementation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::barrier::Barrier;
use super::error::{Result, SecretsError};
use super::types::SecretString;
use crate::domain::SecretId;

/// Durable store of credential material addressed by opaque id.
///
/// Each call is atomic on its own; a sequence of calls is not. Callers that
/// need multi-step consistency sequence and compensate themselves.
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Store a new value under `id`.
    ///
    /// # Errors
    ///
    /// [`SecretsError::AlreadyExists`] if `id` is taken.
    async fn create(&self, id: &SecretId, value: &SecretString) -> Result<()>;

    /// Read the value stored under `id`.
    async fn get(&self, id: &SecretId) -> Result<SecretString>;

    /// Move the entry at `old_id` to `new_id` holding `value`, returning the
    /// value previously stored at `old_id`.
    ///
    /// # Errors
    ///
    /// [`SecretsError::NotFound`] if `old_id` is absent; nothing changes.
    async fn replace(
        &self,
        old_id: &SecretId,
        new_id: &SecretId,
        value: &SecretString,
    ) -> Result<SecretString>;

    /// Remove the entry at `id`, returning the deleted value.
    async fn delete(&self, id: &SecretId) -> Result<SecretString>;
}

fn logical_key(id: &SecretId) -> String {
    format!("logical/{}", id)
}

fn into_secret(bytes: Zeroizing<Vec<u8>>, id: &SecretId) -> Result<SecretString> {
    std::str::from_utf8(&bytes)
        .map(SecretString::new)
        .map_err(|_| SecretsError::encryption(format!("entry '{}' is not valid UTF-8", id)))
}

/// [`SecretVault`] over the AES-GCM [`Barrier`].
#[derive(Debug, Clone)]
pub struct BarrierVault {
    barrier: Arc<Barrier>,
}

impl BarrierVault {
    pub fn new(barrier: Arc<Barrier>) -> Self {
        Self { barrier }
    }

    pub fn barrier(&self) -> &Arc<Barrier> {
        &self.barrier
    }
}

#[async_trait]
impl SecretVault for BarrierVault {
    #[instrument(skip(self, value), fields(secret_id = %id))]
    async fn create(&self, id: &SecretId, value: &SecretString) -> Result<()> {
        self.barrier.put_new(&logical_key(id), value.expose_secret().as_bytes()).await?;
        debug!("Secret created");
        Ok(())
    }

    #[instrument(skip(self), fields(secret_id = %id))]
    async fn get(&self, id: &SecretId) -> Result<SecretString> {
        let bytes = self.barrier.get(&logical_key(id)).await.map_err(|e| match e {
            SecretsError::NotFound { .. } => SecretsError::not_found(id.as_str()),
            other => other,
        })?;
        into_secret(bytes, id)
    }

    #[instrument(skip(self, value), fields(old_secret_id = %old_id, new_secret_id = %new_id))]
    async fn replace(
        &self,
        old_id: &SecretId,
        new_id: &SecretId,
        value: &SecretString,
    ) -> Result<SecretString> {
        let previous = self
            .barrier
            .swap(&logical_key(old_id), &logical_key(new_id), value.expose_secret().as_bytes())
            .await
            .map_err(|e| match e {
                SecretsError::NotFound { .. } => SecretsError::not_found(old_id.as_str()),
                SecretsError::AlreadyExists { .. } => SecretsError::already_exists(new_id.as_str()),
                other => other,
            })?;
        debug!("Secret replaced");
        into_secret(previous, old_id)
    }

    #[instrument(skip(self), fields(secret_id = %id))]
    async fn delete(&self, id: &SecretId) -> Result<SecretString> {
        let previous = self.barrier.remove(&logical_key(id)).await.map_err(|e| match e {
            SecretsError::NotFound { .. } => SecretsError::not_found(id.as_str()),
            other => other,
        })?;
        debug!("Secret deleted");
        into_secret(previous, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::physical::MemoryBackend;
    use crate::secrets::types::MasterKey;

    async fn vault() -> BarrierVault {
        let barrier = Arc::new(Barrier::new(Arc::new(MemoryBackend::new())));
        let key = MasterKey::from_bytes(&[9u8; 32]).unwrap();
        barrier.initialize(&key).await.unwrap();
        barrier.unseal(&key).await.unwrap();
        BarrierVault::new(barrier)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let vault = vault().await;
        let id = SecretId::new();
        vault.create(&id, &SecretString::new("AKIAEXAMPLE")).await.unwrap();
        assert_eq!(vault.get(&id).await.unwrap().expose_secret(), "AKIAEXAMPLE");
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let vault = vault().await;
        let id = SecretId::new();
        vault.create(&id, &SecretString::new("a")).await.unwrap();
        let err = vault.create(&id, &SecretString::new("b")).await.unwrap_err();
        assert!(matches!(err, SecretsError::AlreadyExists { .. }));
        assert_eq!(vault.get(&id).await.unwrap().expose_secret(), "a");
    }

    #[tokio::test]
    async fn test_replace_and_revert_restores_pair() {
        let vault = vault().await;
        let original = SecretId::new();
        let rotated = SecretId::new();
        vault.create(&original, &SecretString::new("v1")).await.unwrap();

        let old_value = vault.replace(&original, &rotated, &SecretString::new("v2")).await.unwrap();
        assert_eq!(old_value.expose_secret(), "v1");

        vault.replace(&rotated, &original, &old_value).await.unwrap();
        assert_eq!(vault.get(&original).await.unwrap().expose_secret(), "v1");
        assert!(matches!(vault.get(&rotated).await, Err(SecretsError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_replace_missing_reports_old_id() {
        let vault = vault().await;
        let missing = SecretId::new();
        let err = vault
            .replace(&missing, &SecretId::new(), &SecretString::new("x"))
            .await
            .unwrap_err();
        match err {
            SecretsError::NotFound { key } => assert_eq!(key, missing.as_str()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_returns_value() {
        let vault = vault().await;
        let id = SecretId::new();
        vault.create(&id, &SecretString::new("gone")).await.unwrap();

        assert_eq!(vault.delete(&id).await.unwrap().expose_secret(), "gone");
        assert!(matches!(vault.get(&id).await, Err(SecretsError::NotFound { .. })));
    }
}
