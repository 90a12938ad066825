//! Request and response bodies of the HTTP API

pub mod cluster;
pub mod credential;

pub use cluster::{ClusterResponse, RegisterClusterDto, UnregisterQuery};
pub use credential::{
    CreateBackupStorageDto, CreateMonitoringInstanceDto, CredentialResponse, UpdateBackupStorageDto,
    UpdateMonitoringInstanceDto,
};
