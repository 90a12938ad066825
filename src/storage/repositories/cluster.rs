//! Cluster registration repository

use async_trait::async_trait;
use sqlx::FromRow;
use tracing::instrument;

use crate::domain::{ClusterId, ClusterRegistration, SecretId};
use crate::errors::{ClusterplaneError, Result};
use crate::storage::repository::ClusterStore;
use crate::storage::DbPool;

const COLUMNS: &str =
    "id, name, namespace, uid, connection_secret_id, created_at, updated_at";

/// Database row structure for cluster registrations
#[derive(Debug, Clone, FromRow)]
struct ClusterRow {
    pub id: ClusterId,
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub connection_secret_id: SecretId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ClusterRow> for ClusterRegistration {
    fn from(row: ClusterRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            namespace: row.namespace,
            uid: row.uid,
            connection_secret_id: row.connection_secret_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed [`ClusterStore`]
#[derive(Debug, Clone)]
pub struct ClusterRepository {
    pool: DbPool,
}

impl ClusterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClusterStore for ClusterRepository {
    #[instrument(skip(self, registration), fields(cluster_name = %registration.name), name = "db_create_cluster")]
    async fn create(&self, registration: &ClusterRegistration) -> Result<ClusterRegistration> {
        sqlx::query(
            "INSERT INTO cluster_registrations (id, name, namespace, uid, connection_secret_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&registration.id)
        .bind(&registration.name)
        .bind(&registration.namespace)
        .bind(&registration.uid)
        .bind(&registration.connection_secret_id)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = ClusterplaneError::Database {
                source: e,
                context: format!("Failed to create cluster registration '{}'", registration.name),
            };
            if err.is_unique_violation() {
                return ClusterplaneError::conflict(
                    format!("Kubernetes cluster '{}' already exists", registration.name),
                    "Kubernetes cluster",
                );
            }
            tracing::error!(error = %err, cluster_name = %registration.name, "Failed to create cluster registration");
            err
        })?;

        tracing::info!(
            cluster_id = %registration.id,
            cluster_name = %registration.name,
            namespace = %registration.namespace,
            "Created cluster registration"
        );

        Ok(registration.clone())
    }

    #[instrument(skip(self), fields(cluster_id = %id), name = "db_get_cluster")]
    async fn get(&self, id: &ClusterId) -> Result<ClusterRegistration> {
        let row = sqlx::query_as::<sqlx::Postgres, ClusterRow>(&format!(
            "SELECT {COLUMNS} FROM cluster_registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, cluster_id = %id, "Failed to get cluster registration");
            ClusterplaneError::Database {
                source: e,
                context: format!("Failed to get cluster registration '{}'", id),
            }
        })?;

        row.map(Into::into)
            .ok_or_else(|| ClusterplaneError::not_found("Kubernetes cluster", id.as_str()))
    }

    #[instrument(skip(self), fields(cluster_name = %name), name = "db_get_cluster_by_name")]
    async fn get_by_name(&self, name: &str) -> Result<Option<ClusterRegistration>> {
        let row = sqlx::query_as::<sqlx::Postgres, ClusterRow>(&format!(
            "SELECT {COLUMNS} FROM cluster_registrations WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ClusterplaneError::Database {
            source: e,
            context: format!("Failed to get cluster registration named '{}'", name),
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self), name = "db_list_clusters")]
    async fn list(&self) -> Result<Vec<ClusterRegistration>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ClusterRow>(&format!(
            "SELECT {COLUMNS} FROM cluster_registrations ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list cluster registrations");
            ClusterplaneError::Database {
                source: e,
                context: "Failed to list cluster registrations".to_string(),
            }
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(cluster_id = %id), name = "db_delete_cluster")]
    async fn delete(&self, id: &ClusterId) -> Result<()> {
        let result = sqlx::query("DELETE FROM cluster_registrations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, cluster_id = %id, "Failed to delete cluster registration");
                ClusterplaneError::Database {
                    source: e,
                    context: format!("Failed to delete cluster registration '{}'", id),
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(ClusterplaneError::not_found("Kubernetes cluster", id.as_str()));
        }

        tracing::info!(cluster_id = %id, "Deleted cluster registration");
        Ok(())
    }
}
