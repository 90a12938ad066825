//! # Clusterplane
//!
//! Control plane that registers remote Kubernetes clusters, keeps
//! object-storage and monitoring credentials in an encrypted vault, and
//! proxies workload API calls to the registered clusters.
//!
//! ## Architecture
//!
//! ```text
//! REST API ──► Resource Lifecycle Coordinator ──► Secret Vault (AES-GCM barrier)
//!    │                     │                 └──► Metadata Store (PostgreSQL)
//!    │                     └──► Remote clusters (mirrors)
//!    └──► Reverse Proxy ──► Remote cluster API servers
//! ```
//!
//! Multi-store writes are sagas: every step that succeeded is journaled as
//! a compensating action and unwound newest-first on failure.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod preflight;
pub mod proxy;
pub mod remote;
pub mod secrets;
pub mod services;
pub mod storage;

pub use config::AppConfig;
pub use errors::{ClusterplaneError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
