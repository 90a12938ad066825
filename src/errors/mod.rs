//! # Error Handling
//!
//! Error types for the Clusterplane control plane, defined with `thiserror`.

pub mod types;

pub use types::{BoxError, ClusterplaneError, ResourceReference, Result};

/// Walk an error's source chain looking for a value of type `T`.
pub fn find_source<'a, T: std::error::Error + 'static>(
    err: &'a (dyn std::error::Error + 'static),
) -> Option<&'a T> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<T>() {
            return Some(found);
        }
        current = e.source();
    }
    None
}
