//! Bucket reachability check with static credentials.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::{debug, warn};

use super::{StorageAccessCheck, StorageTarget};
use crate::config::PreflightConfig;
use crate::domain::StorageType;
use crate::errors::{ClusterplaneError, Result};

const PROVIDER_NAME: &str = "clusterplane";

/// Issues `HeadBucket` against the target with the supplied keys
#[derive(Debug, Clone)]
pub struct S3AccessCheck {
    timeout: Duration,
}

impl S3AccessCheck {
    pub fn new(config: &PreflightConfig) -> Self {
        Self { timeout: config.timeout() }
    }

    fn client(&self, target: &StorageTarget) -> aws_sdk_s3::Client {
        let credentials = Credentials::new(
            target.access_key.expose_secret(),
            target.secret_key.expose_secret(),
            None,
            None,
            PROVIDER_NAME,
        );
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(target.region.clone()))
            .credentials_provider(credentials)
            .timeout_config(TimeoutConfig::builder().operation_timeout(self.timeout).build());
        // Custom endpoints (MinIO and friends) rarely support virtual-host addressing.
        if let Some(url) = target.url.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl StorageAccessCheck for S3AccessCheck {
    async fn verify(&self, target: &StorageTarget) -> Result<()> {
        if target.storage_type != StorageType::S3 {
            return Err(ClusterplaneError::validation(format!(
                "Access checks are not implemented for '{}' storage",
                target.storage_type
            )));
        }

        debug!(bucket = %target.bucket, region = %target.region, "Checking bucket access");
        self.client(target).head_bucket().bucket(&target.bucket).send().await.map_err(|e| {
            warn!(
                bucket = %target.bucket,
                error = %DisplayErrorContext(&e),
                "Bucket access check failed"
            );
            ClusterplaneError::validation(
                "Could not connect to the backup storage, please check the new credentials are correct",
            )
        })?;
        Ok(())
    }
}
