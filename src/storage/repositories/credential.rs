//! Credential resource repository
//!
//! Descriptors only. `spec` and `secret_refs` are stored as JSONB; the
//! values behind the refs live in the vault.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::instrument;

use crate::domain::{CredentialId, CredentialKind, CredentialResource, CredentialSpec, SecretRef};
use crate::errors::{ClusterplaneError, Result};
use crate::storage::repository::CredentialStore;
use crate::storage::DbPool;

const COLUMNS: &str = "id, name, description, spec, secret_refs, created_at, updated_at";

/// Database row structure for credential resources
#[derive(Debug, Clone, FromRow)]
struct CredentialRow {
    pub id: CredentialId,
    pub name: String,
    pub description: Option<String>,
    pub spec: Json<CredentialSpec>,
    pub secret_refs: Json<Vec<SecretRef>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<CredentialRow> for CredentialResource {
    fn from(row: CredentialRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            spec: row.spec.0,
            secret_refs: row.secret_refs.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed [`CredentialStore`]
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    pool: DbPool,
}

impl CredentialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    #[instrument(skip(self, resource), fields(resource_name = %resource.name, kind = %resource.kind()), name = "db_create_credential")]
    async fn create(&self, resource: &CredentialResource) -> Result<CredentialResource> {
        sqlx::query(
            "INSERT INTO credential_resources (id, name, kind, description, spec, secret_refs, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&resource.id)
        .bind(&resource.name)
        .bind(resource.kind().as_str())
        .bind(&resource.description)
        .bind(Json(&resource.spec))
        .bind(Json(&resource.secret_refs))
        .bind(resource.created_at)
        .bind(resource.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = ClusterplaneError::Database {
                source: e,
                context: format!("Failed to create credential resource '{}'", resource.name),
            };
            if err.is_unique_violation() {
                let label = resource.kind().label();
                return ClusterplaneError::conflict(
                    format!("{} '{}' already exists", label, resource.name),
                    label,
                );
            }
            tracing::error!(error = %err, resource_name = %resource.name, "Failed to create credential resource");
            err
        })?;

        tracing::info!(resource_id = %resource.id, resource_name = %resource.name, "Created credential resource");
        Ok(resource.clone())
    }

    #[instrument(skip(self), fields(resource_id = %id), name = "db_get_credential")]
    async fn get(&self, id: &CredentialId) -> Result<CredentialResource> {
        let row = sqlx::query_as::<sqlx::Postgres, CredentialRow>(&format!(
            "SELECT {COLUMNS} FROM credential_resources WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, resource_id = %id, "Failed to get credential resource");
            ClusterplaneError::Database {
                source: e,
                context: format!("Failed to get credential resource '{}'", id),
            }
        })?;

        row.map(Into::into)
            .ok_or_else(|| ClusterplaneError::not_found("Credential resource", id.as_str()))
    }

    #[instrument(skip(self), fields(resource_name = %name), name = "db_get_credential_by_name")]
    async fn get_by_name(&self, name: &str) -> Result<Option<CredentialResource>> {
        let row = sqlx::query_as::<sqlx::Postgres, CredentialRow>(&format!(
            "SELECT {COLUMNS} FROM credential_resources WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ClusterplaneError::Database {
            source: e,
            context: format!("Failed to get credential resource named '{}'", name),
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self), fields(kind = ?kind), name = "db_list_credentials")]
    async fn list(&self, kind: Option<CredentialKind>) -> Result<Vec<CredentialResource>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query_as::<sqlx::Postgres, CredentialRow>(&format!(
                    "SELECT {COLUMNS} FROM credential_resources WHERE kind = $1 ORDER BY name"
                ))
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<sqlx::Postgres, CredentialRow>(&format!(
                    "SELECT {COLUMNS} FROM credential_resources ORDER BY name"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list credential resources");
            ClusterplaneError::Database {
                source: e,
                context: "Failed to list credential resources".to_string(),
            }
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, resource), fields(resource_id = %resource.id), name = "db_update_credential")]
    async fn update(&self, resource: &CredentialResource) -> Result<CredentialResource> {
        let row = sqlx::query_as::<sqlx::Postgres, CredentialRow>(&format!(
            "UPDATE credential_resources SET description = $2, spec = $3, secret_refs = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(&resource.id)
        .bind(&resource.description)
        .bind(Json(&resource.spec))
        .bind(Json(&resource.secret_refs))
        .bind(resource.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, resource_id = %resource.id, "Failed to update credential resource");
            ClusterplaneError::Database {
                source: e,
                context: format!("Failed to update credential resource '{}'", resource.id),
            }
        })?;

        row.map(Into::into)
            .ok_or_else(|| ClusterplaneError::not_found("Credential resource", resource.id.as_str()))
    }

    #[instrument(skip(self), fields(resource_id = %id), name = "db_delete_credential")]
    async fn delete(&self, id: &CredentialId) -> Result<()> {
        let result = sqlx::query("DELETE FROM credential_resources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, resource_id = %id, "Failed to delete credential resource");
                ClusterplaneError::Database {
                    source: e,
                    context: format!("Failed to delete credential resource '{}'", id),
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(ClusterplaneError::not_found("Credential resource", id.as_str()));
        }

        tracing::info!(resource_id = %id, "Deleted credential resource");
        Ok(())
    }
}
