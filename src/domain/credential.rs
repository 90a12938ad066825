//! Credential resources: object-storage and monitoring endpoints whose
//! definitions reference secret material held in the vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::id::{CredentialId, SecretId};
use crate::secrets::SecretString;

/// Object storage provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    S3,
    Azure,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Azure => "azure",
        }
    }
}

impl FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(Self::S3),
            "azure" => Ok(Self::Azure),
            _ => Err(format!("Unknown storage type: {}", s)),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitoring endpoint flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringType {
    Pmm,
}

impl MonitoringType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pmm => "pmm",
        }
    }
}

/// Kind of credential resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    ObjectStorage,
    Monitoring,
}

impl CredentialKind {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectStorage => "object_storage",
            Self::Monitoring => "monitoring",
        }
    }

    /// Human label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::ObjectStorage => "Backup storage",
            Self::Monitoring => "Monitoring instance",
        }
    }

    /// Secret fields a resource of this kind carries, in provisioning order
    pub fn secret_fields(&self) -> &'static [SecretField] {
        match self {
            Self::ObjectStorage => &[SecretField::AccessKey, SecretField::SecretKey],
            Self::Monitoring => &[SecretField::ApiKey],
        }
    }
}

impl FromStr for CredentialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object_storage" => Ok(Self::ObjectStorage),
            "monitoring" => Ok(Self::Monitoring),
            _ => Err(format!("Unknown credential kind: {}", s)),
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential field whose value lives in the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretField {
    AccessKey,
    SecretKey,
    ApiKey,
}

impl SecretField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessKey => "access_key",
            Self::SecretKey => "secret_key",
            Self::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer from a resource field to a vault entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub field: SecretField,
    pub id: SecretId,
}

/// Kind-specific, non-secret definition of a credential resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialSpec {
    ObjectStorage {
        storage_type: StorageType,
        bucket: String,
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Monitoring {
        monitoring_type: MonitoringType,
        url: String,
    },
}

impl CredentialSpec {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::ObjectStorage { .. } => CredentialKind::ObjectStorage,
            Self::Monitoring { .. } => CredentialKind::Monitoring,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::ObjectStorage { url, .. } => url.as_deref(),
            Self::Monitoring { url, .. } => Some(url),
        }
    }
}

/// A committed credential resource as held by the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResource {
    pub id: CredentialId,
    pub name: String,
    pub description: Option<String>,
    pub spec: CredentialSpec,
    pub secret_refs: Vec<SecretRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialResource {
    pub fn kind(&self) -> CredentialKind {
        self.spec.kind()
    }

    /// Vault id currently backing `field`
    pub fn secret_id(&self, field: SecretField) -> Option<&SecretId> {
        self.secret_refs.iter().find(|r| r.field == field).map(|r| &r.id)
    }

    pub fn secret_ids(&self) -> Vec<SecretId> {
        self.secret_refs.iter().map(|r| r.id.clone()).collect()
    }
}

/// PMM admin login used to mint an API key in place of a supplied one
#[derive(Debug, Clone)]
pub struct PmmLogin {
    pub user: String,
    pub password: SecretString,
}

/// Input for creating a credential resource
#[derive(Debug, Clone)]
pub struct CreateCredentialRequest {
    pub name: String,
    pub description: Option<String>,
    pub spec: CredentialSpec,
    pub secrets: BTreeMap<SecretField, SecretString>,
    /// Mint the API key from this login instead of taking it from `secrets`
    pub pmm_login: Option<PmmLogin>,
}

/// Partial update of a credential resource; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateCredentialRequest {
    pub description: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub url: Option<String>,
    pub secrets: BTreeMap<SecretField, SecretString>,
    pub pmm_login: Option<PmmLogin>,
}

impl UpdateCredentialRequest {
    /// True when nothing non-secret changes
    pub fn is_secrets_only(&self) -> bool {
        self.description.is_none()
            && self.bucket.is_none()
            && self.region.is_none()
            && self.url.is_none()
    }
}
