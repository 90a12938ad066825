//! # Storage and Persistence
//!
//! Metadata store for cluster registrations and credential resource
//! descriptors. Secret material never lands here; see [`crate::secrets`].

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod repository;

pub use crate::config::DatabaseConfig;

pub use memory::{MemoryClusterStore, MemoryCredentialStore};
pub use pool::{create_pool, get_pool_stats, DbPool, PoolStats};
pub use repositories::{ClusterRepository, CredentialRepository};
pub use repository::{ClusterStore, CredentialStore};

use crate::errors::{ClusterplaneError, Result};

/// Apply the embedded migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Database migration failed");
        ClusterplaneError::Internal {
            message: "Failed to run database migrations".to_string(),
            source: Some(Box::new(e)),
        }
    })?;

    tracing::info!("Database migrations applied");
    Ok(())
}

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| ClusterplaneError::Database {
        source: e,
        context: "Database connectivity check failed".to_string(),
    })?;

    Ok(())
}
