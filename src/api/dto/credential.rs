//! Backup storage and monitoring instance DTOs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::validation::validate_name_field;
use crate::domain::{
    CreateCredentialRequest, CredentialResource, CredentialSpec, MonitoringType, PmmLogin,
    SecretField, StorageType, UpdateCredentialRequest,
};
use crate::secrets::SecretString;

/// Request body for creating a backup storage
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupStorageDto {
    #[validate(custom(function = "validate_name_field"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    #[validate(length(min = 1))]
    pub bucket_name: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[serde(default)]
    pub url: Option<String>,
    pub access_key: SecretString,
    pub secret_key: SecretString,
}

impl From<CreateBackupStorageDto> for CreateCredentialRequest {
    fn from(dto: CreateBackupStorageDto) -> Self {
        let secrets = BTreeMap::from([
            (SecretField::AccessKey, dto.access_key),
            (SecretField::SecretKey, dto.secret_key),
        ]);
        Self {
            name: dto.name,
            description: dto.description,
            spec: CredentialSpec::ObjectStorage {
                storage_type: dto.storage_type,
                bucket: dto.bucket_name,
                region: dto.region,
                url: dto.url,
            },
            secrets,
            pmm_login: None,
        }
    }
}

/// Partial update of a backup storage
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBackupStorageDto {
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub bucket_name: Option<String>,
    #[validate(length(min = 1))]
    pub region: Option<String>,
    pub url: Option<String>,
    pub access_key: Option<SecretString>,
    pub secret_key: Option<SecretString>,
}

impl From<UpdateBackupStorageDto> for UpdateCredentialRequest {
    fn from(dto: UpdateBackupStorageDto) -> Self {
        let mut secrets = BTreeMap::new();
        if let Some(value) = dto.access_key {
            secrets.insert(SecretField::AccessKey, value);
        }
        if let Some(value) = dto.secret_key {
            secrets.insert(SecretField::SecretKey, value);
        }
        Self {
            description: dto.description,
            bucket: dto.bucket_name,
            region: dto.region,
            url: dto.url,
            secrets,
            pmm_login: None,
        }
    }
}

/// A login is only formed when both halves are present; a lone `user` or
/// `password` is passed through as an empty counterpart so validation names it.
fn pmm_login(user: Option<String>, password: Option<SecretString>) -> Option<PmmLogin> {
    match (user, password) {
        (None, None) => None,
        (user, password) => Some(PmmLogin {
            user: user.unwrap_or_default(),
            password: password.unwrap_or_else(|| SecretString::new("")),
        }),
    }
}

/// Request body for creating a monitoring instance.
///
/// Supply either `apiKey`, or `user` and `password` to have a key minted.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMonitoringInstanceDto {
    #[validate(custom(function = "validate_name_field"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub monitoring_type: MonitoringType,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
}

impl From<CreateMonitoringInstanceDto> for CreateCredentialRequest {
    fn from(dto: CreateMonitoringInstanceDto) -> Self {
        let mut secrets = BTreeMap::new();
        if let Some(value) = dto.api_key {
            secrets.insert(SecretField::ApiKey, value);
        }
        Self {
            name: dto.name,
            description: dto.description,
            spec: CredentialSpec::Monitoring { monitoring_type: dto.monitoring_type, url: dto.url },
            secrets,
            pmm_login: pmm_login(dto.user, dto.password),
        }
    }
}

/// Partial update of a monitoring instance
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMonitoringInstanceDto {
    pub description: Option<String>,
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

impl From<UpdateMonitoringInstanceDto> for UpdateCredentialRequest {
    fn from(dto: UpdateMonitoringInstanceDto) -> Self {
        let mut secrets = BTreeMap::new();
        if let Some(value) = dto.api_key {
            secrets.insert(SecretField::ApiKey, value);
        }
        Self {
            description: dto.description,
            url: dto.url,
            secrets,
            pmm_login: pmm_login(dto.user, dto.password),
            ..Default::default()
        }
    }
}

/// Descriptor of a credential resource. Secret values are never included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<CredentialResource> for CredentialResponse {
    fn from(resource: CredentialResource) -> Self {
        let (resource_type, bucket_name, region, url) = match resource.spec {
            CredentialSpec::ObjectStorage { storage_type, bucket, region, url } => {
                (storage_type.as_str().to_string(), Some(bucket), Some(region), url)
            }
            CredentialSpec::Monitoring { monitoring_type, url } => {
                (monitoring_type.as_str().to_string(), None, None, Some(url))
            }
        };
        Self {
            id: resource.id.into_string(),
            name: resource.name,
            description: resource.description,
            resource_type,
            bucket_name,
            region,
            url,
        }
    }
}
