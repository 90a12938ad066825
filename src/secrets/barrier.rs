//! AES-256-GCM encryption barrier.
//!
//! The barrier keeps a randomly generated data key in a keyring entry sealed
//! with the operator's master key. Entries are sealed with the data key, a
//! fresh nonce, and the entry's storage key as additional authenticated data
//! so ciphertext cannot be moved between keys.
//!
//! Lifecycle: [`Barrier::initialize`] once (repeat calls are no-ops), then
//! [`Barrier::unseal`] on every process start. Until unsealed, every read and
//! write fails with [`SecretsError::Sealed`].

use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use zeroize::Zeroizing;

use super::error::{Result, SecretsError};
use super::physical::PhysicalBackend;
use super::types::{MasterKey, SealedEntry, KEY_SIZE};

/// Size of AES-256-GCM nonce in bytes
const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

/// Storage key of the sealed data key
pub const KEYRING_KEY: &str = "core/keyring";

/// Single-use nonce sequence for AES-GCM
struct SingleNonce(Option<[u8; NONCE_SIZE]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

fn seal_with(
    rng: &SystemRandom,
    key: &[u8; KEY_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<SealedEntry> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce)
        .map_err(|_| SecretsError::encryption("failed to generate random nonce"))?;

    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| SecretsError::encryption("failed to create sealing key"))?;
    let mut sealing_key = aead::SealingKey::new(unbound, SingleNonce(Some(nonce)));

    let mut ciphertext = plaintext.to_vec();
    ciphertext.reserve(TAG_SIZE);
    sealing_key
        .seal_in_place_append_tag(Aad::from(aad), &mut ciphertext)
        .map_err(|_| SecretsError::encryption("failed to seal entry"))?;

    Ok(SealedEntry { ciphertext, nonce: nonce.to_vec() })
}

fn open_with(key: &[u8; KEY_SIZE], aad: &[u8], entry: &SealedEntry) -> Result<Zeroizing<Vec<u8>>> {
    let nonce: [u8; NONCE_SIZE] = entry.nonce.as_slice().try_into().map_err(|_| {
        SecretsError::encryption(format!(
            "invalid nonce length: expected {} bytes, got {}",
            NONCE_SIZE,
            entry.nonce.len()
        ))
    })?;
    if entry.ciphertext.len() < TAG_SIZE {
        return Err(SecretsError::encryption("ciphertext too short"));
    }

    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| SecretsError::encryption("failed to create opening key"))?;
    let mut opening_key = aead::OpeningKey::new(unbound, SingleNonce(Some(nonce)));

    let mut buffer = Zeroizing::new(entry.ciphertext.clone());
    let plaintext_len = opening_key
        .open_in_place(Aad::from(aad), &mut buffer)
        .map_err(|_| SecretsError::encryption("authentication failed"))?
        .len();
    buffer.truncate(plaintext_len);
    Ok(buffer)
}

/// Encryption barrier over a physical backend.
pub struct Barrier {
    physical: Arc<dyn PhysicalBackend>,
    data_key: RwLock<Option<Zeroizing<[u8; KEY_SIZE]>>>,
    rng: SystemRandom,
}

impl Barrier {
    pub fn new(physical: Arc<dyn PhysicalBackend>) -> Self {
        Self { physical, data_key: RwLock::new(None), rng: SystemRandom::new() }
    }

    /// Create the keyring if it does not exist yet.
    ///
    /// Calling this on an initialized barrier succeeds without touching the
    /// keyring, whatever key is supplied; [`Barrier::unseal`] is what checks it.
    #[instrument(skip_all)]
    pub async fn initialize(&self, master_key: &MasterKey) -> Result<()> {
        if self.physical.get(KEYRING_KEY).await?.is_some() {
            debug!("Vault barrier already initialized");
            return Ok(());
        }

        let mut data_key = Zeroizing::new([0u8; KEY_SIZE]);
        self.rng
            .fill(&mut data_key[..])
            .map_err(|_| SecretsError::encryption("failed to generate data key"))?;
        let keyring =
            seal_with(&self.rng, master_key.as_bytes(), KEYRING_KEY.as_bytes(), &data_key[..])?;

        match self.physical.insert(KEYRING_KEY, keyring).await {
            Ok(()) => {
                info!("Vault barrier initialized");
                Ok(())
            }
            // Lost a race against a concurrent initializer.
            Err(SecretsError::AlreadyExists { .. }) => {
                debug!("Vault barrier already initialized");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Open the keyring with the master key and hold the data key in memory.
    #[instrument(skip_all)]
    pub async fn unseal(&self, master_key: &MasterKey) -> Result<()> {
        let keyring = self.physical.get(KEYRING_KEY).await?.ok_or(SecretsError::NotInitialized)?;

        let opened = open_with(master_key.as_bytes(), KEYRING_KEY.as_bytes(), &keyring).map_err(
            |_| {
                error!("Failed to open vault keyring with the supplied master key");
                SecretsError::invalid_key("master key does not open the keyring")
            },
        )?;
        if opened.len() != KEY_SIZE {
            return Err(SecretsError::encryption("keyring holds a key of unexpected length"));
        }

        let mut data_key = Zeroizing::new([0u8; KEY_SIZE]);
        data_key.copy_from_slice(&opened);
        *self.data_key.write().await = Some(data_key);

        info!("Vault barrier unsealed");
        Ok(())
    }

    /// Drop the in-memory data key.
    pub async fn seal(&self) {
        *self.data_key.write().await = None;
        info!("Vault barrier sealed");
    }

    pub async fn is_sealed(&self) -> bool {
        self.data_key.read().await.is_none()
    }

    async fn seal_entry(&self, key: &str, plaintext: &[u8]) -> Result<SealedEntry> {
        let guard = self.data_key.read().await;
        let data_key = guard.as_ref().ok_or(SecretsError::Sealed)?;
        seal_with(&self.rng, data_key, key.as_bytes(), plaintext)
    }

    async fn open_entry(&self, key: &str, entry: &SealedEntry) -> Result<Zeroizing<Vec<u8>>> {
        let guard = self.data_key.read().await;
        let data_key = guard.as_ref().ok_or(SecretsError::Sealed)?;
        open_with(data_key, key.as_bytes(), entry)
    }

    async fn ensure_unsealed(&self) -> Result<()> {
        if self.is_sealed().await {
            return Err(SecretsError::Sealed);
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.ensure_unsealed().await?;
        let entry = self.physical.get(key).await?.ok_or_else(|| SecretsError::not_found(key))?;
        self.open_entry(key, &entry).await
    }

    pub async fn put_new(&self, key: &str, plaintext: &[u8]) -> Result<()> {
        let entry = self.seal_entry(key, plaintext).await?;
        self.physical.insert(key, entry).await
    }

    /// Read and open the entry at `key`, keeping the sealed form as well.
    async fn open_existing(&self, key: &str) -> Result<(SealedEntry, Zeroizing<Vec<u8>>)> {
        let entry = self.physical.get(key).await?.ok_or_else(|| SecretsError::not_found(key))?;
        let plaintext = self.open_entry(key, &entry).await?;
        Ok((entry, plaintext))
    }

    /// Move `old_key` to `new_key` with a new value, returning the old value.
    ///
    /// The old entry is opened before anything is written, so an entry that
    /// fails authentication stays where it is.
    pub async fn swap(
        &self,
        old_key: &str,
        new_key: &str,
        plaintext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        self.ensure_unsealed().await?;
        let (current, value) = self.open_existing(old_key).await?;
        let entry = self.seal_entry(new_key, plaintext).await?;
        let previous = self.physical.swap(old_key, new_key, entry).await?;
        if previous != current {
            // Rewritten between the read and the swap.
            return self.open_entry(old_key, &previous).await;
        }
        Ok(value)
    }

    /// Delete `key`, returning its value. Entries that fail to open are kept.
    pub async fn remove(&self, key: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.ensure_unsealed().await?;
        let (current, value) = self.open_existing(key).await?;
        let previous = self.physical.remove(key).await?;
        if previous != current {
            return self.open_entry(key, &previous).await;
        }
        Ok(value)
    }
}

impl std::fmt::Debug for Barrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Barrier").field("data_key", &"[REDACTED]").finish()
    }
}
