//! PostgreSQL implementations of the metadata store traits.

pub mod cluster;
pub mod credential;

pub use cluster::ClusterRepository;
pub use credential::CredentialRepository;
