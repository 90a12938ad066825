//! External path to remote API path translation.

/// Prefix of every proxied external path
pub const EXTERNAL_PREFIX: &str = "/v1/kubernetes";

/// Root of the remote custom resource API
pub const REMOTE_API_ROOT: &str = "/apis/everest.percona.com/v1alpha1";

/// Map an external path onto the remote cluster's resource path.
///
/// `/v1/kubernetes/<id>/database-cluster-restores/my-name` in namespace
/// `ns1` becomes
/// `/apis/everest.percona.com/v1alpha1/namespaces/ns1/databaseclusterrestores/my-name`.
/// Hyphens are removed from the kind only; the resource name is kept as is.
pub fn translate(path: &str, registration_id: &str, resource_name: &str, namespace: &str) -> String {
    let scoped = format!("{}/{}", EXTERNAL_PREFIX, registration_id);
    let rest = path.strip_prefix(scoped.as_str()).unwrap_or(path);
    let rest = if resource_name.is_empty() {
        rest
    } else {
        rest.strip_suffix(resource_name).unwrap_or(rest)
    };
    let kind = rest.replace('-', "");
    format!("{}/namespaces/{}{}{}", REMOTE_API_ROOT, namespace, kind, resource_name)
}
