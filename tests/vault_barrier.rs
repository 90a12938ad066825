//! Secret vault contract over the encryption barrier.

mod common;

use std::sync::Arc;

use clusterplane::domain::SecretId;
use clusterplane::secrets::{
    open_vault, Barrier, BarrierVault, MasterKey, MemoryBackend, PhysicalBackend, SecretString,
    SecretVault, SecretsError,
};
use common::{memory_vault, TEST_MASTER_KEY};

#[tokio::test]
async fn initialization_is_idempotent() {
    let backend: Arc<dyn PhysicalBackend> = Arc::new(MemoryBackend::new());
    let key = MasterKey::from_bytes(&TEST_MASTER_KEY).unwrap();

    let first = open_vault(backend.clone(), &key).await.unwrap();
    let id = SecretId::new();
    first.create(&id, &SecretString::new("value-1")).await.unwrap();

    let second = open_vault(backend, &key).await.unwrap();
    assert_eq!(second.get(&id).await.unwrap().expose_secret(), "value-1");
    assert_eq!(first.get(&id).await.unwrap(), second.get(&id).await.unwrap());
}

#[tokio::test]
async fn wrong_master_key_is_rejected() {
    let backend: Arc<dyn PhysicalBackend> = Arc::new(MemoryBackend::new());
    open_vault(backend.clone(), &MasterKey::from_bytes(&TEST_MASTER_KEY).unwrap()).await.unwrap();

    let wrong = MasterKey::from_bytes(&[9u8; 32]).unwrap();
    let err = open_vault(backend, &wrong).await.unwrap_err();

    assert!(matches!(err, SecretsError::InvalidKey { .. }), "unexpected error: {err:?}");
}

#[tokio::test]
async fn sealed_vault_rejects_operations() {
    let backend: Arc<dyn PhysicalBackend> = Arc::new(MemoryBackend::new());
    let barrier = Arc::new(Barrier::new(backend));
    barrier.initialize(&MasterKey::from_bytes(&TEST_MASTER_KEY).unwrap()).await.unwrap();
    let vault = BarrierVault::new(barrier);

    let err = vault.create(&SecretId::new(), &SecretString::new("x")).await.unwrap_err();

    assert!(matches!(err, SecretsError::Sealed));
}

#[tokio::test]
async fn create_refuses_taken_ids() {
    let (vault, _) = memory_vault().await;
    let id = SecretId::new();
    vault.create(&id, &SecretString::new("a")).await.unwrap();

    let err = vault.create(&id, &SecretString::new("b")).await.unwrap_err();

    assert!(matches!(err, SecretsError::AlreadyExists { .. }));
    assert_eq!(vault.get(&id).await.unwrap().expose_secret(), "a");
}

#[tokio::test]
async fn replace_moves_entry_and_returns_previous_value() {
    let (vault, backend) = memory_vault().await;
    let old_id = SecretId::new();
    let new_id = SecretId::new();
    vault.create(&old_id, &SecretString::new("old")).await.unwrap();

    let previous = vault.replace(&old_id, &new_id, &SecretString::new("new")).await.unwrap();

    assert_eq!(previous.expose_secret(), "old");
    assert!(matches!(vault.get(&old_id).await, Err(SecretsError::NotFound { .. })));
    assert_eq!(vault.get(&new_id).await.unwrap().expose_secret(), "new");
    assert_eq!(backend.len().await, 2);
}

#[tokio::test]
async fn replace_of_missing_entry_changes_nothing() {
    let (vault, backend) = memory_vault().await;
    let new_id = SecretId::new();

    let err = vault.replace(&SecretId::new(), &new_id, &SecretString::new("new")).await.unwrap_err();

    assert!(matches!(err, SecretsError::NotFound { .. }));
    assert!(vault.get(&new_id).await.is_err());
    assert_eq!(backend.len().await, 1);
}

#[tokio::test]
async fn delete_returns_removed_value() {
    let (vault, _) = memory_vault().await;
    let id = SecretId::new();
    vault.create(&id, &SecretString::new("gone")).await.unwrap();

    assert_eq!(vault.delete(&id).await.unwrap().expose_secret(), "gone");
    assert!(matches!(vault.delete(&id).await, Err(SecretsError::NotFound { .. })));
}

#[tokio::test]
async fn values_are_encrypted_at_rest() {
    let (vault, backend) = memory_vault().await;
    let id = SecretId::new();
    vault.create(&id, &SecretString::new("plaintext-marker")).await.unwrap();

    let entry = backend.get(&format!("logical/{}", id)).await.unwrap().unwrap();
    let haystack = String::from_utf8_lossy(&entry.ciphertext);
    assert!(!haystack.contains("plaintext-marker"));
}
