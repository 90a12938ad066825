//! # Remote Custom Resources
//!
//! The subset of the `everest.percona.com/v1alpha1` resources this control
//! plane reads or writes. Unknown fields are ignored on read, so only the
//! fields we act on are modelled.

use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "everest.percona.com";
pub const API_VERSION: &str = "v1alpha1";

/// Workload resource scanned by the in-use check.
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "DatabaseCluster",
    group = "everest.percona.com",
    version = "v1alpha1",
    namespaced,
    shortname = "dbc"
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringSpec>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub schedules: Vec<BackupSchedule>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupSchedule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub backup_storage_name: String,
}

/// Where a cluster is restored from at creation time
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_cluster_backup_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_source: Option<BackupSource>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupSource {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub backup_storage_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_config_name: Option<String>,
}

impl DatabaseCluster {
    /// Names of backup storages this workload references, deduplicated
    pub fn backup_storage_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        if let Some(source) = self.spec.data_source.as_ref().and_then(|d| d.backup_source.as_ref()) {
            names.push(&source.backup_storage_name);
        }
        if let Some(backup) = &self.spec.backup {
            names.extend(backup.schedules.iter().map(|s| s.backup_storage_name.as_str()));
        }
        names.retain(|n| !n.is_empty());
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn monitoring_config_name(&self) -> Option<&str> {
        self.spec
            .monitoring
            .as_ref()
            .and_then(|m| m.monitoring_config_name.as_deref())
            .filter(|n| !n.is_empty())
    }
}

/// Mirror of an object-storage credential resource
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "BackupStorage",
    group = "everest.percona.com",
    version = "v1alpha1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageSpec {
    #[serde(rename = "type")]
    pub storage_type: String,
    pub bucket: String,
    pub region: String,
    #[serde(rename = "endpointURL", default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    pub credentials_secret_name: String,
}

/// Mirror of a monitoring credential resource
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "MonitoringConfig",
    group = "everest.percona.com",
    version = "v1alpha1",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfigSpec {
    #[serde(rename = "type")]
    pub monitoring_type: String,
    pub pmm: PmmConfig,
    pub credentials_secret_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct PmmConfig {
    pub url: String,
}
