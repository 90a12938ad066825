//! Mapping from credential resources to their cluster-local representation.

use std::collections::BTreeMap;

use super::crd::{BackupStorageSpec, MonitoringConfigSpec, PmmConfig};
use super::SecretData;
use crate::domain::{CredentialResource, CredentialSpec, SecretField};
use crate::secrets::SecretString;

/// Name of the cluster-local secret that backs the mirror of `resource_name`
pub fn secret_name(resource_name: &str) -> String {
    format!("{}-secret", resource_name)
}

/// Data key the remote operators expect for `field`
pub fn secret_data_key(field: SecretField) -> &'static str {
    match field {
        SecretField::AccessKey => "AWS_ACCESS_KEY_ID",
        SecretField::SecretKey => "AWS_SECRET_ACCESS_KEY",
        SecretField::ApiKey => "apiKey",
    }
}

/// Cluster-local secret data built from vault values
pub fn secret_data(values: &BTreeMap<SecretField, SecretString>) -> SecretData {
    values
        .iter()
        .map(|(field, value)| (secret_data_key(*field).to_string(), value.clone()))
        .collect()
}

pub fn backup_storage_spec(resource: &CredentialResource) -> Option<BackupStorageSpec> {
    match &resource.spec {
        CredentialSpec::ObjectStorage { storage_type, bucket, region, url } => {
            Some(BackupStorageSpec {
                storage_type: storage_type.as_str().to_string(),
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint_url: url.clone(),
                credentials_secret_name: secret_name(&resource.name),
            })
        }
        CredentialSpec::Monitoring { .. } => None,
    }
}

pub fn monitoring_config_spec(resource: &CredentialResource) -> Option<MonitoringConfigSpec> {
    match &resource.spec {
        CredentialSpec::Monitoring { monitoring_type, url } => Some(MonitoringConfigSpec {
            monitoring_type: monitoring_type.as_str().to_string(),
            pmm: PmmConfig { url: url.clone() },
            credentials_secret_name: secret_name(&resource.name),
        }),
        CredentialSpec::ObjectStorage { .. } => None,
    }
}
