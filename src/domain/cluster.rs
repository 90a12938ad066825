//! Registered remote clusters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ClusterId, SecretId};
use crate::secrets::SecretString;

/// A remote cluster known to the control plane.
///
/// The connection profile itself lives in the vault under
/// `connection_secret_id`; `uid` is the namespace UID captured when the
/// cluster was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRegistration {
    pub id: ClusterId,
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub connection_secret_id: SecretId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a cluster
#[derive(Debug, Clone)]
pub struct RegisterClusterRequest {
    pub name: String,
    pub namespace: String,
    /// Base64-encoded kubeconfig
    pub kubeconfig: SecretString,
}
