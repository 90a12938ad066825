//! Error types for secret vault operations.

use thiserror::Error;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur during secret vault operations.
///
/// Messages carry entry ids only, never secret material.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Secret not found in the backend.
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    /// An entry with this id already exists.
    #[error("Secret already exists: {key}")]
    AlreadyExists { key: String },

    /// The barrier has not been unsealed.
    #[error("Secret vault is sealed")]
    Sealed,

    /// The barrier has no keyring yet.
    #[error("Secret vault is not initialized")]
    NotInitialized,

    /// The master key is malformed or does not open the keyring.
    #[error("Invalid master key: {reason}")]
    InvalidKey { reason: String },

    /// Sealing or opening an entry failed.
    #[error("Encryption error: {message}")]
    Encryption { message: String },

    /// Physical storage failure.
    #[error("Storage error: {context}")]
    Storage {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Backend-specific error.
    #[error("Backend error: {message}")]
    BackendError { message: String },
}

impl SecretsError {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an already-exists error.
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create an invalid key error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey { reason: reason.into() }
    }

    /// Create an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption { message: message.into() }
    }

    /// Create a backend error.
    pub fn backend_error(message: impl Into<String>) -> Self {
        Self::BackendError { message: message.into() }
    }

    /// Create a storage error with context.
    pub fn storage(source: sqlx::Error, context: impl Into<String>) -> Self {
        Self::Storage { source, context: context.into() }
    }

    /// HTTP status code this error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } => 409,
            Self::Sealed | Self::NotInitialized => 503,
            _ => 500,
        }
    }
}
