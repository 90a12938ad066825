//! Cached credential validator: TTL behavior and fetch counting.

mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clusterplane::auth::{hash_password, ClusterHashSource, HashSource, PasswordValidator, StoredHash};
use clusterplane::errors::{ClusterplaneError, Result};
use clusterplane::secrets::SecretString;
use common::{FakeCluster, Harness};

const TTL: Duration = Duration::from_secs(3);

struct CountingSource {
    stored: StoredHash,
    fetches: AtomicUsize,
    fail: bool,
}

impl CountingSource {
    fn new(password: &str, salt: &str) -> Self {
        let hash = hex::decode(hash_password(password, salt.as_bytes())).unwrap();
        Self {
            stored: StoredHash { salt: salt.as_bytes().to_vec(), hash },
            fetches: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HashSource for CountingSource {
    async fn fetch(&self) -> Result<StoredHash> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClusterplaneError::ClusterUnavailable { cluster: "east".into(), source: None });
        }
        Ok(self.stored.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn validations_within_ttl_share_one_fetch() {
    let source = Arc::new(CountingSource::new("s3cret", "ns-uid"));
    let validator = PasswordValidator::new(source.clone(), TTL);

    assert!(validator.validate("s3cret").await.unwrap());
    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!validator.validate("wrong").await.unwrap());

    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_hash_is_fetched_exactly_once() {
    let source = Arc::new(CountingSource::new("s3cret", "ns-uid"));
    let validator = PasswordValidator::new(source.clone(), TTL);
    validator.validate("s3cret").await.unwrap();

    tokio::time::advance(TTL + Duration::from_millis(1)).await;
    assert!(validator.validate("s3cret").await.unwrap());
    assert!(validator.validate("s3cret").await.unwrap());

    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_validations_after_expiry_fetch_once() {
    let source = Arc::new(CountingSource::new("s3cret", "ns-uid"));
    let validator = Arc::new(PasswordValidator::new(source.clone(), TTL));

    let checks: Vec<_> = (0..8)
        .map(|_| {
            let validator = validator.clone();
            tokio::spawn(async move { validator.validate("s3cret").await.unwrap() })
        })
        .collect();
    for check in checks {
        assert!(check.await.unwrap());
    }

    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn empty_password_skips_the_fetch() {
    let source = Arc::new(CountingSource::new("s3cret", "ns-uid"));
    let validator = PasswordValidator::new(source.clone(), TTL);

    assert!(!validator.validate("").await.unwrap());
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn fetch_failure_is_an_error_and_not_cached() {
    let mut source = CountingSource::new("s3cret", "ns-uid");
    source.fail = true;
    let source = Arc::new(source);
    let validator = PasswordValidator::new(source.clone(), TTL);

    assert!(validator.validate("s3cret").await.is_err());
    assert!(validator.validate("s3cret").await.is_err());
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn cluster_source_reads_hash_salted_with_namespace_uid() {
    let h = Harness::new().await;
    let (registration, east) = h.add_cluster(FakeCluster::new("east")).await;
    let hash = hash_password("admin-pass", registration.uid.as_bytes());
    east.secrets.lock().unwrap().insert(
        "everest-password".to_string(),
        BTreeMap::from([("password".to_string(), SecretString::new(hash))]),
    );

    let source = ClusterHashSource::new(h.cluster_store.clone(), h.connector.clone(), "east");
    let validator = PasswordValidator::new(Arc::new(source), TTL);

    assert!(validator.validate("admin-pass").await.unwrap());
    assert!(!validator.validate("other").await.unwrap());
}

#[tokio::test]
async fn cluster_source_without_secret_fails() {
    let h = Harness::new().await;
    h.add_cluster(FakeCluster::new("east")).await;

    let source = ClusterHashSource::new(h.cluster_store.clone(), h.connector.clone(), "east");

    assert!(matches!(source.fetch().await, Err(ClusterplaneError::NotFound { .. })));
}
