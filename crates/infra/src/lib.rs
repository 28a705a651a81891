//! # Issuance Infrastructure
//!
//! Network-facing half of the request core.
//!
//! This crate contains:
//! - The HTTP request executor (reqwest)
//! - The retrying client and the `ApiClient` facade
//! - Configuration loading from environment and files
//! - Logging setup
//!
//! ## Architecture
//! - Builds on the retry and polling policies in `issuance-common`
//! - Depends on `issuance-domain` for configuration, request and error types
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, RetryingClient};
pub use errors::InfraError;
pub use http::{Attempt, RequestExecutor, RequestExecutorBuilder};
pub use observability::{init_tracing, LogFormat};
