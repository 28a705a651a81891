//! Issuance API client
//!
//! Layers, bottom up:
//!
//! - [`crate::http::RequestExecutor`]: one network attempt, classified
//! - [`RetryingClient`]: attempts repeated under a retry policy
//! - [`ApiClient`]: configuration binding, convenience verbs and the
//!   submit-then-poll workflow for deferred operations

pub mod client;
pub mod retrying;

pub use client::{ApiClient, ApiClientBuilder};
pub use retrying::RetryingClient;
