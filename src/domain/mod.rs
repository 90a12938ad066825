//! Domain layer
//!
//! Plain data types for registered clusters and credential resources, plus
//! the validation applied to them before any store is touched.
//!
//! ## Module Organization
//!
//! - `id`: Type-safe domain identifiers with NewType pattern
//! - `cluster`: Remote cluster registrations
//! - `credential`: Object-storage and monitoring resources and their secret references
//! - `validation`: Name, URL and request validation

pub mod cluster;
pub mod credential;
pub mod id;
pub mod validation;

pub use cluster::{ClusterRegistration, RegisterClusterRequest};
pub use credential::{
    CreateCredentialRequest, CredentialKind, CredentialResource, CredentialSpec, MonitoringType,
    PmmLogin, SecretField, SecretRef, StorageType, UpdateCredentialRequest,
};
pub use id::{ClusterId, CredentialId, SecretId};
