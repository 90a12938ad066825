//! Metadata store contracts.
//!
//! The coordinator and the registration service depend only on these traits.
//! Every operation is independently atomic; nothing here spans tables or
//! calls, so multi-store consistency is the caller's job.

use async_trait::async_trait;

use crate::domain::{ClusterId, ClusterRegistration, CredentialId, CredentialKind, CredentialResource};
use crate::errors::Result;

/// Registered remote clusters
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Insert a registration. A duplicate name fails with `Conflict`.
    async fn create(&self, registration: &ClusterRegistration) -> Result<ClusterRegistration>;

    /// Fails with `NotFound` when absent
    async fn get(&self, id: &ClusterId) -> Result<ClusterRegistration>;

    async fn get_by_name(&self, name: &str) -> Result<Option<ClusterRegistration>>;

    async fn list(&self) -> Result<Vec<ClusterRegistration>>;

    /// Fails with `NotFound` when absent
    async fn delete(&self, id: &ClusterId) -> Result<()>;
}

/// Credential resource descriptors
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a descriptor. A duplicate name fails with `Conflict`.
    async fn create(&self, resource: &CredentialResource) -> Result<CredentialResource>;

    /// Fails with `NotFound` when absent
    async fn get(&self, id: &CredentialId) -> Result<CredentialResource>;

    async fn get_by_name(&self, name: &str) -> Result<Option<CredentialResource>>;

    /// All descriptors, optionally restricted to one kind, ordered by name
    async fn list(&self, kind: Option<CredentialKind>) -> Result<Vec<CredentialResource>>;

    /// Overwrite description, spec and secret pointers of an existing row.
    /// The name is never changed.
    async fn update(&self, resource: &CredentialResource) -> Result<CredentialResource>;

    /// Fails with `NotFound` when absent
    async fn delete(&self, id: &CredentialId) -> Result<()>;
}
