//! HTTP transport: one network attempt per call
//!
//! [`RequestExecutor`] owns the reqwest client, the encoded credential and the
//! per-attempt deadline. It never retries; retrying is layered on top through
//! the [`Attempt`] seam.

pub mod auth;
pub mod client;
pub mod decode;

use async_trait::async_trait;
use issuance_domain::{RequestSpec, Result, TypedResponse};
use tokio_util::sync::CancellationToken;

pub use client::{RequestExecutor, RequestExecutorBuilder};

/// A single attempt at a request.
///
/// Implemented by [`RequestExecutor`]; tests substitute scripted outcomes.
#[async_trait]
pub trait Attempt: Send + Sync {
    /// Perform one attempt. Failures are already classified.
    async fn attempt(&self, spec: &RequestSpec, cancel: &CancellationToken) -> Result<TypedResponse>;
}
