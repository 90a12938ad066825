//! # Configuration Management
//!
//! Configuration is read from the environment (and an optional `.env` file
//! loaded by the binary) exactly once, validated, and handed to each
//! component by value or reference. Nothing reads the environment after
//! startup.

pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, DatabaseConfig, ObservabilityConfig, PreflightConfig, RemoteConfig,
    ServerConfig, VaultConfig,
};
