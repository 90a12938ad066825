//! # REST API Components
//!
//! HTTP routing, handlers and error mapping for the control plane.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use routes::{build_router, AppState};
pub use server::start_api_server;
