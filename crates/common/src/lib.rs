//! Transport-independent request core shared by the issuance client.
//!
//! # Feature Tiers
//!
//! - `foundation`: error classification from status/body/transport failure
//! - `runtime`: retry policy, deferred-operation poller, cancellable sleeps

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

#[cfg(feature = "foundation")]
pub use error::{classify, TransportFailure};
#[cfg(feature = "runtime")]
pub use resilience::{
    poll, sleep_or_cancel, AsyncOperationPoller, AttemptObserver, RetryDecision, RetryPolicy,
};
