//! Cluster DTOs for API request/response handling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::validation::validate_name_field;
use crate::domain::{ClusterRegistration, RegisterClusterRequest};
use crate::secrets::SecretString;

/// Request body for registering a remote cluster
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClusterDto {
    #[validate(custom(function = "validate_name_field"))]
    pub name: String,

    #[serde(default = "default_namespace")]
    #[validate(length(min = 1, max = 63))]
    pub namespace: String,

    /// Base64-encoded kubeconfig
    pub kubeconfig: SecretString,
}

fn default_namespace() -> String {
    "percona-everest".to_string()
}

impl From<RegisterClusterDto> for RegisterClusterRequest {
    fn from(dto: RegisterClusterDto) -> Self {
        Self { name: dto.name, namespace: dto.namespace, kubeconfig: dto.kubeconfig }
    }
}

/// Registered cluster as returned by the API; the connection profile is never exposed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResponse {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClusterRegistration> for ClusterResponse {
    fn from(registration: ClusterRegistration) -> Self {
        Self {
            id: registration.id.into_string(),
            name: registration.name,
            namespace: registration.namespace,
            created_at: registration.created_at,
            updated_at: registration.updated_at,
        }
    }
}

/// Query parameters for unregistering a cluster
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterQuery {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub ignore_unavailable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_dto_defaults_namespace() {
        let dto: RegisterClusterDto =
            serde_json::from_value(serde_json::json!({"name": "east", "kubeconfig": "Zm9v"})).unwrap();
        assert_eq!(dto.namespace, "percona-everest");
        assert!(dto.validate().is_ok());
        assert!(!format!("{:?}", dto).contains("Zm9v"));
    }

    #[test]
    fn unregister_query_reads_camel_case() {
        let query: UnregisterQuery =
            serde_json::from_value(serde_json::json!({"force": false, "ignoreUnavailable": true})).unwrap();
        assert!(!query.force);
        assert!(query.ignore_unavailable);
    }
}
