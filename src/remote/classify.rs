//! Remote failure classification.
//!
//! A refused connection or an elapsed deadline means the cluster is
//! unavailable; every other failure is a generic upstream failure. Both
//! name the registration.

use std::error::Error as StdError;
use std::io;

use crate::errors::{find_source, BoxError, ClusterplaneError};

/// True when the source chain holds a refused connection or a timeout.
pub fn is_unavailable(err: &(dyn StdError + 'static)) -> bool {
    if find_source::<tokio::time::error::Elapsed>(err).is_some() {
        return true;
    }
    matches!(
        find_source::<io::Error>(err).map(io::Error::kind),
        Some(io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut)
    )
}

/// Classify a transport failure for `cluster`.
pub fn classify_transport_error(cluster: &str, err: BoxError) -> ClusterplaneError {
    if is_unavailable(err.as_ref()) {
        tracing::warn!(cluster = %cluster, error = %err, "Remote cluster unavailable");
        return ClusterplaneError::ClusterUnavailable {
            cluster: cluster.to_string(),
            source: Some(err),
        };
    }
    ClusterplaneError::Upstream {
        cluster: cluster.to_string(),
        message: err.to_string(),
        source: Some(err),
    }
}

/// Map a typed kube API failure for `cluster`.
pub fn kube_error(cluster: &str, err: kube::Error) -> ClusterplaneError {
    match err {
        kube::Error::Api(status) if status.code == 404 => {
            ClusterplaneError::not_found("Kubernetes resource", status.message.clone())
        }
        kube::Error::Api(status) => ClusterplaneError::upstream(cluster, status.message.clone()),
        other => classify_transport_error(cluster, Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connect failed")]
    struct ConnectFailed(#[source] io::Error);

    #[test]
    fn refused_is_unavailable() {
        let err: BoxError = Box::new(ConnectFailed(io::Error::from(io::ErrorKind::ConnectionRefused)));
        let classified = classify_transport_error("east", err);
        assert!(matches!(classified, ClusterplaneError::ClusterUnavailable { .. }));
        assert_eq!(classified.status_code(), 503);
        assert_eq!(classified.to_string(), "east kubernetes cluster is unavailable");
    }

    #[test]
    fn timeout_is_unavailable() {
        let err: BoxError = Box::new(io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(
            classify_transport_error("east", err),
            ClusterplaneError::ClusterUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn elapsed_deadline_is_unavailable() {
        let elapsed = tokio::time::timeout(std::time::Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(is_unavailable(&elapsed));
    }

    #[test]
    fn other_failures_are_upstream() {
        let err: BoxError = Box::new(io::Error::other("tls handshake failed"));
        let classified = classify_transport_error("east", err);
        assert!(matches!(classified, ClusterplaneError::Upstream { .. }));
        assert_eq!(classified.status_code(), 502);
        assert!(classified.to_string().contains("east"));
    }
}
