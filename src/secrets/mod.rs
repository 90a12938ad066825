//! Secret vault for credential material.
//!
//! Credential values (object-storage keys, monitoring API keys, cluster
//! connection profiles) live only here, addressed by opaque [`SecretId`]s.
//! The metadata store holds ids, never values.
//!
//! # Layers
//!
//! - [`SecretVault`]: the create/get/replace/delete contract used by services
//! - [`BarrierVault`]: implementation over the encryption [`Barrier`]
//! - [`PhysicalBackend`]: sealed-entry storage ([`PostgresBackend`], [`MemoryBackend`])
//!
//! # Example
//!
//! ```rust,ignore
//! let barrier = Arc::new(Barrier::new(Arc::new(PostgresBackend::new(pool))));
//! barrier.initialize(&master_key).await?;
//! barrier.unseal(&master_key).await?;
//! let vault = BarrierVault::new(barrier);
//! vault.create(&SecretId::new(), &SecretString::new("AKIA...")).await?;
//! ```
//!
//! [`SecretId`]: crate::domain::SecretId

pub mod barrier;
pub mod error;
pub mod physical;
pub mod types;
pub mod vault;

pub use barrier::Barrier;
pub use error::{Result, SecretsError};
pub use physical::{MemoryBackend, PhysicalBackend, PostgresBackend};
pub use types::{MasterKey, SealedEntry, SecretString};
pub use vault::{BarrierVault, SecretVault};

use std::sync::Arc;

/// Build a vault over `physical`, initializing the barrier if needed and
/// unsealing it with `master_key`.
pub async fn open_vault(
    physical: Arc<dyn PhysicalBackend>,
    master_key: &MasterKey,
) -> Result<BarrierVault> {
    let barrier = Arc::new(Barrier::new(physical));
    barrier.initialize(master_key).await?;
    barrier.unseal(master_key).await?;
    Ok(BarrierVault::new(barrier))
}
