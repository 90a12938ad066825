//! # Cached Credential Validator
//!
//! Validates a password against the PBKDF2 hash kept in a cluster secret.
//! The hash is cached for a short TTL so a burst of requests costs one
//! fetch, and a changed password is picked up within the TTL.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ring::pbkdf2;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::domain::ClusterRegistration;
use crate::errors::{ClusterplaneError, Result};
use crate::observability::MetricsRecorder;
use crate::remote::ClusterConnector;
use crate::storage::ClusterStore;

/// Name of the secret holding the password hash
pub const PASSWORD_SECRET: &str = "everest-password";

/// Data key of the hex-encoded hash inside [`PASSWORD_SECRET`]
pub const PASSWORD_KEY: &str = "password";

pub const PBKDF2_ITERATIONS: u32 = 4096;
pub const HASH_LEN: usize = 32;
pub const DEFAULT_HASH_TTL: Duration = Duration::from_secs(3);

static PBKDF2_ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

/// Hex-encoded PBKDF2-HMAC-SHA256 hash of `password`
pub fn hash_password(password: &str, salt: &[u8]) -> String {
    let mut out = [0u8; HASH_LEN];
    pbkdf2::derive(PBKDF2_ALGORITHM, iterations(), salt, password.as_bytes(), &mut out);
    hex::encode(out)
}

/// A stored hash together with the salt it was derived with
#[derive(Clone, PartialEq, Eq)]
pub struct StoredHash {
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
}

/// Where the current hash comes from
#[async_trait]
pub trait HashSource: Send + Sync {
    async fn fetch(&self) -> Result<StoredHash>;
}

/// Reads the hash from the `everest-password` secret of a registered
/// cluster. The salt is the UID of the registration's namespace.
pub struct ClusterHashSource {
    clusters: Arc<dyn ClusterStore>,
    connector: Arc<dyn ClusterConnector>,
    cluster_name: String,
}

impl ClusterHashSource {
    pub fn new(
        clusters: Arc<dyn ClusterStore>,
        connector: Arc<dyn ClusterConnector>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self { clusters, connector, cluster_name: cluster_name.into() }
    }

    async fn registration(&self) -> Result<ClusterRegistration> {
        self.clusters
            .get_by_name(&self.cluster_name)
            .await?
            .ok_or_else(|| ClusterplaneError::not_found("Kubernetes cluster", self.cluster_name.as_str()))
    }
}

#[async_trait]
impl HashSource for ClusterHashSource {
    #[instrument(skip(self), fields(cluster = %self.cluster_name))]
    async fn fetch(&self) -> Result<StoredHash> {
        let registration = self.registration().await?;
        let remote = self.connector.connect(&registration).await?;
        let data = remote.get_secret(PASSWORD_SECRET).await?.ok_or_else(|| {
            ClusterplaneError::not_found("Kubernetes secret", PASSWORD_SECRET)
        })?;
        let encoded = data.get(PASSWORD_KEY).ok_or_else(|| {
            ClusterplaneError::internal(format!(
                "Secret '{}' has no '{}' entry",
                PASSWORD_SECRET, PASSWORD_KEY
            ))
        })?;
        let hash = hex::decode(encoded.expose_secret().trim()).map_err(|e| {
            ClusterplaneError::internal(format!("Stored password hash is not hex: {}", e))
        })?;

        Ok(StoredHash { salt: registration.uid.into_bytes(), hash })
    }
}

struct CachedHash {
    stored: Arc<StoredHash>,
    refreshed_at: Instant,
}

impl CachedHash {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.refreshed_at.elapsed() < ttl
    }
}

/// Password check with a TTL'd hash cache.
///
/// Readers share the cached hash; a stale or empty cache is refreshed by
/// exactly one writer while the others wait on the lock.
pub struct PasswordValidator {
    source: Arc<dyn HashSource>,
    ttl: Duration,
    cache: RwLock<Option<CachedHash>>,
    metrics: MetricsRecorder,
}

impl PasswordValidator {
    pub fn new(source: Arc<dyn HashSource>, ttl: Duration) -> Self {
        Self { source, ttl, cache: RwLock::new(None), metrics: MetricsRecorder::new() }
    }

    /// Whether `password` matches the stored hash.
    ///
    /// An empty password is `false` without a fetch. A failed fetch is an
    /// error, never a silent `false`.
    pub async fn validate(&self, password: &str) -> Result<bool> {
        if password.is_empty() {
            return Ok(false);
        }
        let stored = self.current_hash().await?;
        let matched = pbkdf2::verify(
            PBKDF2_ALGORITHM,
            iterations(),
            &stored.salt,
            password.as_bytes(),
            &stored.hash,
        )
        .is_ok();
        Ok(matched)
    }

    async fn current_hash(&self) -> Result<Arc<StoredHash>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(self.ttl)) {
                debug!("Using cached password hash");
                return Ok(cached.stored.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another writer may have refreshed while this one waited.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(self.ttl)) {
            return Ok(cached.stored.clone());
        }

        debug!("Fetching password hash");
        let fetched = self.source.fetch().await;
        self.metrics.record_password_hash_fetch(fetched.is_ok());
        let stored = Arc::new(fetched.inspect_err(|err| {
            warn!(error = %err, "Could not fetch the stored password hash");
        })?);
        *cache = Some(CachedHash { stored: stored.clone(), refreshed_at: Instant::now() });
        Ok(stored)
    }
}
