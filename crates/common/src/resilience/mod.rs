//! Resilience patterns for the request core
//!
//! - **Retry policy**: which classified failures are retried and how long to
//!   back off between attempts
//! - **Polling**: a generic loop that drives a deferred operation to a
//!   terminal state, a failure, or a timeout
//!
//! Every wait in this module is cancellable through a
//! [`CancellationToken`]; a cancelled wait yields a `Cancelled` error.

pub mod polling;
pub mod retry;

use std::time::Duration;

use issuance_domain::{ClassifiedError, Result};
use tokio_util::sync::CancellationToken;

pub use polling::{poll, AsyncOperationPoller, AttemptObserver};
pub use retry::{RetryDecision, RetryPolicy};

/// Sleep for `delay` unless `cancel` fires first.
///
/// # Errors
/// Returns a `Cancelled` error if the token is (or becomes) cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ClassifiedError::cancelled()),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// `delay × factor`, capped at `max`. Computed in nanoseconds so whole
/// millisecond inputs stay exact; saturates instead of overflowing.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn scale_capped(delay: Duration, factor: f64, max: Duration) -> Duration {
    let nanos = delay.as_nanos() as f64 * factor;
    if !nanos.is_finite() || nanos >= max.as_nanos() as f64 {
        return max;
    }
    Duration::from_nanos(nanos.max(0.0) as u64)
}
