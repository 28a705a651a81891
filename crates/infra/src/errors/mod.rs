//! Error conversion glue between external crates and [`ClassifiedError`].
//!
//! [`ClassifiedError`]: issuance_domain::ClassifiedError

pub mod conversions;

pub use conversions::{transport_failure, InfraError};
