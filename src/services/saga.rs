//! # Saga Journal
//!
//! Multi-store flows record a [`Compensation`] after each forward step that
//! touched the vault. On failure the journal is unwound newest-first. Every
//! compensation runs even if an earlier one failed; the ids left behind by
//! failed compensations are logged and reported as an inconsistency.
//!
//! Compensations are plain data so that tests can inspect the journal and
//! inject failures at any step.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::SecretId;
use crate::errors::ClusterplaneError;
use crate::observability::MetricsRecorder;
use crate::secrets::{self, SecretString, SecretVault};

/// The reverse of one successful vault step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Undo a create
    DeleteSecret { id: SecretId },
    /// Undo a rotation: move `current_id` back to `original_id` with its old value
    RestoreSecret { current_id: SecretId, original_id: SecretId, value: SecretString },
    /// Undo a delete
    RecreateSecret { id: SecretId, value: SecretString },
}

impl Compensation {
    pub fn action(&self) -> &'static str {
        match self {
            Self::DeleteSecret { .. } => "delete_secret",
            Self::RestoreSecret { .. } => "restore_secret",
            Self::RecreateSecret { .. } => "recreate_secret",
        }
    }

    /// Ids left in an unexpected state if this compensation fails
    pub fn affected_ids(&self) -> Vec<SecretId> {
        match self {
            Self::DeleteSecret { id } | Self::RecreateSecret { id, .. } => vec![id.clone()],
            Self::RestoreSecret { current_id, original_id, .. } => {
                vec![current_id.clone(), original_id.clone()]
            }
        }
    }

    async fn apply(&self, vault: &dyn SecretVault) -> secrets::Result<()> {
        match self {
            Self::DeleteSecret { id } => vault.delete(id).await.map(|_| ()),
            Self::RestoreSecret { current_id, original_id, value } => {
                vault.replace(current_id, original_id, value).await.map(|_| ())
            }
            Self::RecreateSecret { id, value } => vault.create(id, value).await,
        }
    }
}

/// Lifecycle of one resource within one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Absent,
    SecretsProvisioned,
    Committed,
    /// Every compensation succeeded; the stores match the pre-operation state
    Compensated,
    /// Terminal. A compensation failed and an operator has to reconcile.
    PartiallyCompensated,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::SecretsProvisioned => "secrets_provisioned",
            Self::Committed => "committed",
            Self::Compensated => "compensated",
            Self::PartiallyCompensated => "partially_compensated",
        }
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One create, update or delete flow against the vault and the metadata store.
pub struct Saga {
    operation: &'static str,
    kind: String,
    resource: String,
    vault: Arc<dyn SecretVault>,
    journal: Vec<Compensation>,
    state: SagaState,
    metrics: MetricsRecorder,
}

impl Saga {
    /// Start a flow for a resource that does not exist yet
    pub fn begin(
        operation: &'static str,
        kind: impl Into<String>,
        resource: impl Into<String>,
        vault: Arc<dyn SecretVault>,
    ) -> Self {
        Self {
            operation,
            kind: kind.into(),
            resource: resource.into(),
            vault,
            journal: Vec::new(),
            state: SagaState::Absent,
            metrics: MetricsRecorder::new(),
        }
    }

    /// Start a flow for a resource that is already committed
    pub fn begin_committed(
        operation: &'static str,
        kind: impl Into<String>,
        resource: impl Into<String>,
        vault: Arc<dyn SecretVault>,
    ) -> Self {
        let mut saga = Self::begin(operation, kind, resource, vault);
        saga.state = SagaState::Committed;
        saga
    }

    pub fn vault(&self) -> &dyn SecretVault {
        self.vault.as_ref()
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn journal(&self) -> &[Compensation] {
        &self.journal
    }

    /// Record the compensation for a vault step that just succeeded
    pub fn record(&mut self, compensation: Compensation) {
        if self.state == SagaState::Absent {
            self.state = SagaState::SecretsProvisioned;
        }
        self.journal.push(compensation);
    }

    /// Finish successfully; the journal is discarded
    pub fn commit(mut self) -> SagaState {
        self.state = SagaState::Committed;
        self.journal.clear();
        self.metrics.record_saga_outcome(self.operation, &self.kind, self.state.as_str());
        info!(operation = self.operation, resource = %self.resource, "Saga committed");
        self.state
    }

    /// Unwind the journal after `cause` and return the error to surface.
    ///
    /// Returns `cause` when every compensation succeeded, otherwise an
    /// [`ClusterplaneError::Inconsistency`] naming the orphaned ids.
    pub async fn abort(mut self, cause: ClusterplaneError) -> ClusterplaneError {
        warn!(
            operation = self.operation,
            resource = %self.resource,
            state = %self.state,
            steps = self.journal.len(),
            error = %cause,
            "Saga step failed, compensating"
        );

        let mut orphaned: Vec<String> = Vec::new();
        while let Some(compensation) = self.journal.pop() {
            let action = compensation.action();
            match compensation.apply(self.vault.as_ref()).await {
                Ok(()) => {
                    self.metrics.record_compensation(action, true);
                    info!(
                        operation = self.operation,
                        resource = %self.resource,
                        action,
                        secret_ids = ?compensation.affected_ids(),
                        "Compensation succeeded"
                    );
                }
                Err(err) => {
                    self.metrics.record_compensation(action, false);
                    let ids = compensation.affected_ids();
                    error!(
                        operation = self.operation,
                        resource = %self.resource,
                        action,
                        secret_ids = ?ids,
                        error = %err,
                        "Compensation failed, manual intervention required"
                    );
                    orphaned.extend(ids.into_iter().map(SecretId::into_string));
                }
            }
        }

        self.state = if orphaned.is_empty() {
            SagaState::Compensated
        } else {
            SagaState::PartiallyCompensated
        };
        self.metrics.record_saga_outcome(self.operation, &self.kind, self.state.as_str());

        if orphaned.is_empty() {
            return cause;
        }

        error!(
            operation = self.operation,
            resource = %self.resource,
            orphaned_ids = ?orphaned,
            original_error = %cause,
            "Saga left partially compensated, manual intervention required"
        );
        ClusterplaneError::Inconsistency {
            operation: self.operation.to_string(),
            resource: self.resource.clone(),
            orphaned_ids: orphaned,
        }
    }
}

impl fmt::Debug for Saga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Saga")
            .field("operation", &self.operation)
            .field("resource", &self.resource)
            .field("state", &self.state)
            .field("journal", &self.journal)
            .finish_non_exhaustive()
    }
}
