//! # Error Types
//!
//! Error taxonomy for the Clusterplane control plane using `thiserror`.
//!
//! Variants fall into five classes: validation, not-found, conflict,
//! upstream (metadata store, secret vault, remote cluster) and
//! inconsistency. Only [`ClusterplaneError::Inconsistency`] leaves a
//! resource in a state that needs an operator.

use crate::secrets::SecretsError;
use std::fmt;

/// Custom result type for Clusterplane operations
pub type Result<T> = std::result::Result<T, ClusterplaneError>;

/// Boxed error used for transport failures crossing the remote-cluster seam
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A workload in a registered cluster that references a credential resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceReference {
    /// Registered cluster name
    pub cluster: String,
    /// Referencing workload name
    pub workload: String,
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.workload)
    }
}

/// Main error type for the Clusterplane control plane
#[derive(thiserror::Error, Debug)]
pub enum ClusterplaneError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Metadata store errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Malformed input, rejected before any store is touched
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Resource not found errors
    #[error("{resource_type} with ID '{id}' not found")]
    NotFound {
        resource_type: String,
        id: String,
    },

    /// Resource conflict errors (e.g., already exists)
    #[error("{message}")]
    Conflict {
        message: String,
        resource_type: String,
    },

    /// Deletion vetoed because workloads still reference the resource
    #[error("{resource_type} '{name}' is used by the following database clusters: {}", join_references(.references))]
    InUse {
        resource_type: String,
        name: String,
        references: Vec<ResourceReference>,
    },

    /// Secret vault failure
    #[error("Secret vault error: {0}")]
    Vault(#[from] SecretsError),

    /// The stored connection profile of a registration could not be decoded
    #[error("Malformed connection profile for cluster '{cluster}': {reason}")]
    MalformedConnectionProfile { cluster: String, reason: String },

    /// The remote cluster refused the connection or did not answer in time
    #[error("{cluster} kubernetes cluster is unavailable")]
    ClusterUnavailable {
        cluster: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Any other failure talking to a remote cluster
    #[error("Upstream failure from cluster '{cluster}': {message}")]
    Upstream {
        cluster: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A compensating action failed; state no longer matches the pre-operation state
    #[error("Operation '{operation}' on {resource} left orphaned state requiring manual intervention")]
    Inconsistency {
        operation: String,
        resource: String,
        orphaned_ids: Vec<String>,
    },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

fn join_references(references: &[ResourceReference]) -> String {
    references.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl ClusterplaneError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(message: S, source: BoxError) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    /// Create an upstream error for a remote cluster
    pub fn upstream<C: Into<String>, M: Into<String>>(cluster: C, message: M) -> Self {
        Self::Upstream { cluster: cluster.into(), message: message.into(), source: None }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// HTTP status code this error maps to at the API boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::MalformedConnectionProfile { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } | Self::InUse { .. } => 409,
            Self::Vault(err) => err.status_code(),
            Self::Upstream { .. } => 502,
            Self::ClusterUnavailable { .. } => 503,
            Self::Config { .. }
            | Self::Database { .. }
            | Self::Serialization { .. }
            | Self::Inconsistency { .. }
            | Self::Internal { .. } => 500,
        }
    }

    /// Check whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ClusterUnavailable { .. } | Self::Upstream { .. } | Self::Database { .. })
    }

    /// True for a metadata-store unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database { source, .. } => source
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false),
            Self::Conflict { .. } => true,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for ClusterplaneError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database { source: err, context: "Database operation failed".to_string() }
    }
}

impl From<serde_json::Error> for ClusterplaneError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { source: err, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for ClusterplaneError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|field| field.to_string());
        Self::Validation { message: err.to_string(), field }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ClusterplaneError::validation("name is required");
        assert!(matches!(err, ClusterplaneError::Validation { .. }));
        assert_eq!(err.to_string(), "Validation error: name is required");

        let err = ClusterplaneError::not_found("Backup storage", "abc");
        assert_eq!(err.to_string(), "Backup storage with ID 'abc' not found");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ClusterplaneError::validation("x").status_code(), 400);
        assert_eq!(ClusterplaneError::not_found("x", "y").status_code(), 404);
        assert_eq!(ClusterplaneError::conflict("x", "y").status_code(), 409);
        assert_eq!(ClusterplaneError::upstream("east", "boom").status_code(), 502);
        assert_eq!(
            ClusterplaneError::ClusterUnavailable { cluster: "east".into(), source: None }
                .status_code(),
            503
        );
        assert_eq!(
            ClusterplaneError::Inconsistency {
                operation: "create".into(),
                resource: "s3".into(),
                orphaned_ids: vec!["id".into()],
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn test_in_use_message_names_clusters() {
        let err = ClusterplaneError::InUse {
            resource_type: "Backup storage".into(),
            name: "s3-main".into(),
            references: vec![
                ResourceReference { cluster: "east".into(), workload: "pg-1".into() },
                ResourceReference { cluster: "west".into(), workload: "mysql-2".into() },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Backup storage 's3-main' is used by the following database clusters: east/pg-1, west/mysql-2"
        );
    }

    #[test]
    fn test_inconsistency_message_omits_ids() {
        let err = ClusterplaneError::Inconsistency {
            operation: "create".into(),
            resource: "backup storage 's3-main'".into(),
            orphaned_ids: vec!["orphan-1".into()],
        };
        assert!(!err.to_string().contains("orphan-1"));
    }

    #[test]
    fn test_retryable() {
        assert!(ClusterplaneError::upstream("east", "reset").is_retryable());
        assert!(!ClusterplaneError::validation("bad").is_retryable());
    }
}
