//! Input validation shared by the API layer and the services.
//!
//! Everything here runs before any store is touched.

use regex::Regex;
use std::sync::LazyLock;
use validator::ValidationError;

use super::credential::{
    CreateCredentialRequest, CredentialKind, CredentialResource, CredentialSpec, PmmLogin,
    SecretField, UpdateCredentialRequest,
};
use crate::errors::{ClusterplaneError, Result};

/// Maximum length of a resource name; names become remote object names
/// with suffixes appended.
pub const MAX_NAME_LENGTH: usize = 22;

/// Maximum length of a namespace (RFC-1123 label)
pub const MAX_NAMESPACE_LENGTH: usize = 63;

static RFC1035_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$").expect("RFC1035 label regex is valid")
});

static RFC1123_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("RFC1123 label regex is valid")
});

/// Validate a resource name: lowercase RFC-1035 label of at most 22 characters.
pub fn validate_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' is longer than {} characters", name, MAX_NAME_LENGTH),
            "name",
        ));
    }
    if !RFC1035_LABEL.is_match(name) {
        return Err(ClusterplaneError::validation_field(
            format!(
                "'{}' must start with a lowercase letter, contain only lowercase letters, digits and '-', and end with a letter or digit",
                name
            ),
            "name",
        ));
    }
    Ok(())
}

/// Validate a namespace name.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.len() > MAX_NAMESPACE_LENGTH || !RFC1123_LABEL.is_match(namespace) {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' is not a valid namespace name", namespace),
            "namespace",
        ));
    }
    Ok(())
}

/// Validate a decoded path segment forwarded to a remote API server.
///
/// Only RFC-1123 labels pass, which rules out `.`, `..` and anything that
/// could add a segment once re-encoded.
pub fn validate_path_segment(field: &str, segment: &str) -> Result<()> {
    if segment.len() > MAX_NAMESPACE_LENGTH || !RFC1123_LABEL.is_match(segment) {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' is not a valid {} path segment", segment, field),
            field,
        ));
    }
    Ok(())
}

/// Validate an endpoint URL: absolute, http or https, with a host.
pub fn validate_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| {
        ClusterplaneError::validation_field(format!("'{}' is an invalid URL: {}", field, e), field)
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' must be an http or https URL", field),
            field,
        ));
    }
    Ok(())
}

/// `validator` adapter for DTO fields holding resource names.
pub fn validate_name_field(name: &str) -> std::result::Result<(), ValidationError> {
    validate_name(name).map_err(|_| {
        let mut err = ValidationError::new("resource_name");
        err.message = Some(
            format!(
                "must be an RFC-1035 label of at most {} characters",
                MAX_NAME_LENGTH
            )
            .into(),
        );
        err
    })
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' is required", field),
            field,
        ));
    }
    Ok(())
}

fn validate_spec(spec: &CredentialSpec) -> Result<()> {
    match spec {
        CredentialSpec::ObjectStorage { bucket, region, url, .. } => {
            require_non_empty("bucket", bucket)?;
            require_non_empty("region", region)?;
            if let Some(url) = url {
                validate_url("url", url)?;
            }
        }
        CredentialSpec::Monitoring { url, .. } => validate_url("url", url)?,
    }
    Ok(())
}

/// A login is only accepted for monitoring, and never next to an API key.
fn validate_login(
    kind: CredentialKind,
    login: Option<&PmmLogin>,
    api_key_given: bool,
) -> Result<()> {
    let Some(login) = login else {
        return Ok(());
    };
    if kind != CredentialKind::Monitoring {
        return Err(ClusterplaneError::validation(format!(
            "user and password do not apply to {}",
            kind.label().to_lowercase()
        )));
    }
    if api_key_given {
        return Err(ClusterplaneError::validation_field(
            "specify either 'api_key' or 'user' and 'password', not both",
            SecretField::ApiKey.as_str(),
        ));
    }
    require_non_empty("user", &login.user)?;
    if login.password.is_empty() {
        return Err(ClusterplaneError::validation_field("'password' is required", "password"));
    }
    Ok(())
}

/// Validate a create request in full, including that exactly the secret
/// fields of its kind are supplied. A PMM login stands in for the API key.
pub fn validate_create(request: &CreateCredentialRequest) -> Result<()> {
    validate_name(&request.name)?;
    validate_spec(&request.spec)?;

    let kind = request.spec.kind();
    let api_key_given = request.secrets.contains_key(&SecretField::ApiKey);
    validate_login(kind, request.pmm_login.as_ref(), api_key_given)?;

    for field in kind.secret_fields() {
        if *field == SecretField::ApiKey && request.pmm_login.is_some() {
            continue;
        }
        match request.secrets.get(field) {
            Some(value) if !value.is_empty() => {}
            _ => {
                return Err(ClusterplaneError::validation_field(
                    format!("'{}' is required for {}", field, kind.label().to_lowercase()),
                    field.as_str(),
                ))
            }
        }
    }
    if let Some(field) = request.secrets.keys().find(|f| !kind.secret_fields().contains(f)) {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' does not apply to {}", field, kind.label().to_lowercase()),
            field.as_str(),
        ));
    }
    Ok(())
}

/// Apply an update to a copy of `current`'s spec, validating the result.
pub fn apply_update(
    current: &CredentialResource,
    request: &UpdateCredentialRequest,
) -> Result<CredentialSpec> {
    let kind = current.kind();
    if let Some(field) = request.secrets.keys().find(|f| !kind.secret_fields().contains(f)) {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' does not apply to {}", field, kind.label().to_lowercase()),
            field.as_str(),
        ));
    }
    if let Some((field, _)) = request.secrets.iter().find(|(_, value)| value.is_empty()) {
        return Err(ClusterplaneError::validation_field(
            format!("'{}' cannot be empty", field),
            field.as_str(),
        ));
    }
    validate_login(
        kind,
        request.pmm_login.as_ref(),
        request.secrets.contains_key(&SecretField::ApiKey),
    )?;

    let mut spec = current.spec.clone();
    match &mut spec {
        CredentialSpec::ObjectStorage { bucket, region, url, .. } => {
            if let Some(value) = &request.bucket {
                *bucket = value.clone();
            }
            if let Some(value) = &request.region {
                *region = value.clone();
            }
            if let Some(value) = &request.url {
                *url = Some(value.clone());
            }
        }
        CredentialSpec::Monitoring { url, .. } => {
            if request.bucket.is_some() || request.region.is_some() {
                return Err(ClusterplaneError::validation(
                    "bucket and region do not apply to monitoring instances",
                ));
            }
            if let Some(value) = &request.url {
                *url = value.clone();
            }
        }
    }
    validate_spec(&spec)?;
    Ok(spec)
}

/// Kind a storage path segment addresses, if any.
pub fn kind_for_collection(collection: &str) -> Option<CredentialKind> {
    match collection {
        "backup-storages" => Some(CredentialKind::ObjectStorage),
        "monitoring-instances" => Some(CredentialKind::Monitoring),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::{MonitoringType, StorageType};
    use crate::domain::CredentialId;
    use crate::secrets::SecretString;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn s3_request(name: &str) -> CreateCredentialRequest {
        let mut secrets = BTreeMap::new();
        secrets.insert(SecretField::AccessKey, SecretString::new("AKIA"));
        secrets.insert(SecretField::SecretKey, SecretString::new("shh"));
        CreateCredentialRequest {
            name: name.to_string(),
            description: None,
            spec: CredentialSpec::ObjectStorage {
                storage_type: StorageType::S3,
                bucket: "backups".into(),
                region: "us-east-1".into(),
                url: Some("https://s3.amazonaws.com".into()),
            },
            secrets,
            pmm_login: None,
        }
    }

    fn pmm_request(api_key: Option<&str>, login: Option<(&str, &str)>) -> CreateCredentialRequest {
        let mut secrets = BTreeMap::new();
        if let Some(key) = api_key {
            secrets.insert(SecretField::ApiKey, SecretString::new(key));
        }
        CreateCredentialRequest {
            name: "pmm".into(),
            description: None,
            spec: CredentialSpec::Monitoring {
                monitoring_type: MonitoringType::Pmm,
                url: "https://pmm.example.com".into(),
            },
            secrets,
            pmm_login: login.map(|(user, password)| PmmLogin {
                user: user.into(),
                password: SecretString::new(password),
            }),
        }
    }

    #[test]
    fn test_valid_names() {
        for name in ["a", "s3-main", "backup1", "a-b-c"] {
            assert!(validate_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "1abc", "Upper", "trailing-", "under_score", "a-very-long-name-over-22"] {
            assert!(validate_name(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn test_namespace_allows_leading_digit() {
        assert!(validate_namespace("1ns").is_ok());
        assert!(validate_namespace("Bad").is_err());
    }

    #[test]
    fn test_path_segments() {
        for segment in ["database-clusters", "pg-1", "0abc"] {
            assert!(validate_path_segment("name", segment).is_ok(), "{segment} should be valid");
        }
        for segment in ["..", ".", "", "a/b", "a.b", "%2e%2e", "Upper", "-lead"] {
            assert!(validate_path_segment("name", segment).is_err(), "{segment} should be invalid");
        }
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("url", "https://pmm.example.com").is_ok());
        assert!(validate_url("url", "ftp://example.com").is_err());
        assert!(validate_url("url", "not a url").is_err());
    }

    #[test]
    fn test_create_requires_both_keys() {
        let mut request = s3_request("s3-main");
        assert!(validate_create(&request).is_ok());

        request.secrets.remove(&SecretField::SecretKey);
        let err = validate_create(&request).unwrap_err();
        assert!(err.to_string().contains("secret_key"));
    }

    #[test]
    fn test_create_rejects_foreign_secret_field() {
        let mut request = s3_request("s3-main");
        request.secrets.insert(SecretField::ApiKey, SecretString::new("k"));
        assert!(validate_create(&request).is_err());
    }

    #[test]
    fn test_monitoring_accepts_key_or_login() {
        assert!(validate_create(&pmm_request(Some("key"), None)).is_ok());
        assert!(validate_create(&pmm_request(None, Some(("admin", "pw")))).is_ok());

        assert!(validate_create(&pmm_request(None, None)).is_err());
        assert!(validate_create(&pmm_request(Some("key"), Some(("admin", "pw")))).is_err());
        assert!(validate_create(&pmm_request(None, Some(("", "pw")))).is_err());
        assert!(validate_create(&pmm_request(None, Some(("admin", "")))).is_err());
    }

    #[test]
    fn test_login_rejected_for_object_storage() {
        let mut request = s3_request("s3-main");
        request.pmm_login = Some(PmmLogin { user: "admin".into(), password: SecretString::new("pw") });
        assert!(validate_create(&request).is_err());
    }

    #[test]
    fn test_apply_update_changes_only_given_fields() {
        let current = CredentialResource {
            id: CredentialId::new(),
            name: "s3-main".into(),
            description: None,
            spec: s3_request("s3-main").spec,
            secret_refs: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let request = UpdateCredentialRequest {
            bucket: Some("new-bucket".into()),
            ..Default::default()
        };

        let spec = apply_update(&current, &request).unwrap();
        match spec {
            CredentialSpec::ObjectStorage { bucket, region, .. } => {
                assert_eq!(bucket, "new-bucket");
                assert_eq!(region, "us-east-1");
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_apply_update_rejects_bucket_on_monitoring() {
        let current = CredentialResource {
            id: CredentialId::new(),
            name: "pmm".into(),
            description: None,
            spec: CredentialSpec::Monitoring {
                monitoring_type: MonitoringType::Pmm,
                url: "https://pmm.example.com".into(),
            },
            secret_refs: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let request = UpdateCredentialRequest {
            bucket: Some("b".into()),
            ..Default::default()
        };
        assert!(apply_update(&current, &request).is_err());
    }
}
