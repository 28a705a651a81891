//! # Issuance Domain
//!
//! Data types shared by every layer of the issuance client.
//!
//! This crate contains:
//! - Request/response values (`RequestSpec`, `TypedResponse`, `AsyncMarker`)
//! - The classified error type and its closed category set
//! - Retry, polling and client configuration values
//! - Wire-level constants (header names, defaults)
//!
//! ## Architecture
//! - No dependencies on other issuance crates
//! - No I/O; every value here is immutable once built

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
