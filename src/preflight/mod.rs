//! # Preflight Checks
//!
//! Calls to external endpoints made before any credential is written:
//! verifying that object-storage keys can reach their bucket, and minting
//! a PMM API key from an admin login. A failure here is reported as a
//! validation error and leaves the vault and the metadata store untouched.

pub mod pmm;
pub mod s3;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{PmmLogin, StorageType};
use crate::errors::Result;
use crate::secrets::SecretString;

pub use pmm::PmmKeyIssuer;
pub use s3::S3AccessCheck;

/// Everything needed to reach an object-storage bucket
#[derive(Debug, Clone)]
pub struct StorageTarget {
    pub storage_type: StorageType,
    pub bucket: String,
    pub region: String,
    pub url: Option<String>,
    pub access_key: SecretString,
    pub secret_key: SecretString,
}

/// Verifies that a set of object-storage credentials can reach its bucket
#[async_trait]
pub trait StorageAccessCheck: Send + Sync {
    async fn verify(&self, target: &StorageTarget) -> Result<()>;
}

/// Accepts every target. Used when access checks are switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipStorageCheck;

#[async_trait]
impl StorageAccessCheck for SkipStorageCheck {
    async fn verify(&self, target: &StorageTarget) -> Result<()> {
        debug!(bucket = %target.bucket, "Storage access check disabled");
        Ok(())
    }
}

/// Mints monitoring API keys from an admin login
#[async_trait]
pub trait ApiKeyIssuer: Send + Sync {
    /// Create a key called `key_name` on the instance at `url`.
    async fn issue_key(&self, url: &str, key_name: &str, login: &PmmLogin) -> Result<SecretString>;
}

/// Name of a key minted for the resource `name`
pub fn minted_key_name(name: &str) -> String {
    format!("clusterplane-{}-{}", name, uuid::Uuid::new_v4())
}
