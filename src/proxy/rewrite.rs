//! Friendlier messages in upstream `Status` bodies.

use http::StatusCode;
use serde_json::Value;

/// Upstream statuses whose body is inspected
pub fn should_rewrite(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND
            | StatusCode::CONFLICT
            | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn friendly_label(crd: &str) -> Option<&'static str> {
    match crd {
        "databaseclusters.everest.percona.com" => Some("Database cluster"),
        "databaseengines.everest.percona.com" => Some("Database engine"),
        "backupstorages.everest.percona.com" => Some("Backup storage"),
        "databaseclusterrestores.everest.percona.com" => Some("Restore"),
        "databaseclusterbackups.everest.percona.com" => Some("Backup"),
        "monitoringconfigs.everest.percona.com" => Some("Monitoring config"),
        _ => None,
    }
}

/// Replace a leading CRD name in a `Status` message with a label.
///
/// Returns `None` when the body is not a `Status` or its message does not
/// start with a known CRD name; the caller then forwards the original bytes.
pub fn rewrite_status_body(body: &[u8]) -> Option<Vec<u8>> {
    let mut status: Value = serde_json::from_slice(body).ok()?;
    let message = status.get("message")?.as_str()?;
    let (first, rest) = match message.split_once(' ') {
        Some((first, rest)) => (first, Some(rest)),
        None => (message, None),
    };
    let label = friendly_label(first)?;
    let rewritten = match rest {
        Some(rest) => format!("{} {}", label, rest),
        None => label.to_string(),
    };
    status["message"] = Value::String(rewritten);
    serde_json::to_vec(&status).ok()
}
