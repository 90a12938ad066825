//! Periodic gauge collection, independent of the request path.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::CredentialKind;
use crate::errors::Result;
use crate::observability::MetricsRecorder;
use crate::storage::{ClusterStore, CredentialStore};

/// Records inventory gauges on a fixed interval until cancelled
pub struct Housekeeper {
    clusters: Arc<dyn ClusterStore>,
    credentials: Arc<dyn CredentialStore>,
    metrics: MetricsRecorder,
}

impl Housekeeper {
    pub fn new(clusters: Arc<dyn ClusterStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { clusters, credentials, metrics: MetricsRecorder::new() }
    }

    /// One collection pass
    pub async fn collect(&self) -> Result<()> {
        let clusters = self.clusters.list().await?;
        self.metrics.set_registered_clusters(clusters.len());

        for kind in [CredentialKind::ObjectStorage, CredentialKind::Monitoring] {
            let count = self.credentials.list(Some(kind)).await?.len();
            self.metrics.set_credential_resources(kind.as_str(), count);
        }

        debug!(clusters = clusters.len(), "Housekeeping pass complete");
        Ok(())
    }

    /// Run until `shutdown` is cancelled. Failed passes are logged and retried
    /// on the next tick.
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Housekeeping started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.collect().await {
                        warn!(error = %err, "Housekeeping pass failed");
                    }
                }
            }
        }

        info!("Housekeeping stopped");
    }
}
