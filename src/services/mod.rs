//! Business logic services
//!
//! This module contains service layer components that encapsulate
//! business logic, separated from HTTP concerns.

pub mod cluster_service;
pub mod credential_service;
pub mod housekeeping;
pub mod reference_checker;
pub mod saga;

pub use cluster_service::{ClusterService, UnregisterOptions};
pub use credential_service::{CredentialService, Preflight};
pub use housekeeping::Housekeeper;
pub use reference_checker::{referencing_workloads, ReferenceChecker};
pub use saga::{Compensation, Saga, SagaState};
