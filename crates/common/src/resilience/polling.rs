//! Deferred-operation polling
//!
//! [`AsyncOperationPoller`] repeatedly invokes a status check until the
//! returned value is terminal, is a failure, or the polling budget is spent:
//!
//! ```text
//! Started -> Polling -> Completed | Failed | TimedOut | Cancelled
//! ```
//!
//! The first status check runs immediately. Between checks the poller sleeps
//! `initial_delay`, then `initial_delay × multiplier`, and so on, capped at
//! `max_delay`. It never starts a sleep that would end past the overall
//! timeout.

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use issuance_domain::{ClassifiedError, PollingConfig, Result};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{scale_capped, sleep_or_cancel};

/// Callback invoked with `(attempt_index, &result)` after every status check.
pub type AttemptObserver<T> = Arc<dyn Fn(u32, &T) + Send + Sync>;

/// Generic, cancellable poller for one deferred operation.
pub struct AsyncOperationPoller<T> {
    config: PollingConfig,
    observer: Option<AttemptObserver<T>>,
    cancel: CancellationToken,
}

impl<T> fmt::Debug for AsyncOperationPoller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperationPoller")
            .field("config", &self.config)
            .field("has_observer", &self.observer.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<T: Serialize> AsyncOperationPoller<T> {
    pub fn new(config: PollingConfig) -> Self {
        Self { config, observer: None, cancel: CancellationToken::new() }
    }

    /// Observe every status check. A panicking observer is logged and ignored.
    #[must_use]
    pub fn on_attempt<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &T) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Drive the operation to completion.
    ///
    /// # Errors
    /// - `ProcessingFailed` when `is_failure` matches; `details` holds the
    ///   serialized result
    /// - `Timeout` when `max_attempts` checks were made or the next sleep would
    ///   overrun the overall timeout
    /// - `Cancelled` when the cancellation token fires
    /// - any error returned by `status_fn`, unchanged
    pub async fn run<F, Fut, Term, Fail>(
        &self,
        mut status_fn: F,
        is_terminal: Term,
        is_failure: Fail,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        Term: Fn(&T) -> bool,
        Fail: Fn(&T) -> bool,
    {
        self.config.validate()?;

        let started = Instant::now();
        let mut delay = self.config.initial_delay.min(self.config.max_delay);
        let mut attempts: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(ClassifiedError::cancelled().with_attempts(attempts)),
                result = status_fn() => result?,
            };
            let attempt_index = attempts;
            attempts += 1;
            self.notify(attempt_index, &result);

            if is_failure(&result) {
                let diagnostic = serde_json::to_value(&result).ok();
                warn!(attempts, "deferred operation reached a failed state");
                return Err(ClassifiedError::processing_failed(
                    "deferred operation reached a failed state",
                    diagnostic,
                )
                .with_attempts(attempts));
            }

            if is_terminal(&result) {
                info!(attempts, elapsed_ms = started.elapsed().as_millis(), "deferred operation completed");
                return Ok(result);
            }

            let elapsed = started.elapsed();
            let past_deadline = elapsed.checked_add(delay).map_or(true, |end| end > self.config.timeout);
            if attempts >= self.config.max_attempts || past_deadline {
                warn!(
                    attempts,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = self.config.timeout.as_millis(),
                    "deferred operation did not complete in time"
                );
                return Err(ClassifiedError::timeout(format!(
                    "deferred operation still pending after {attempts} checks ({}ms)",
                    elapsed.as_millis()
                ))
                .with_attempts(attempts));
            }

            debug!(attempt = attempts, delay_ms = delay.as_millis(), "operation pending, waiting");
            sleep_or_cancel(delay, &self.cancel).await.map_err(|e| e.with_attempts(attempts))?;
            delay = scale_capped(delay, self.config.backoff_multiplier, self.config.max_delay);
        }
    }

    fn notify(&self, attempt_index: u32, result: &T) {
        let Some(observer) = &self.observer else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| observer(attempt_index, result))).is_err() {
            warn!(attempt = attempt_index, "polling observer panicked; ignoring");
        }
    }
}

/// Run one polling loop without building a poller first.
///
/// # Errors
/// See [`AsyncOperationPoller::run`].
pub async fn poll<T, F, Fut, Term, Fail>(
    status_fn: F,
    is_terminal: Term,
    is_failure: Fail,
    config: PollingConfig,
    cancel: CancellationToken,
) -> Result<T>
where
    T: Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Term: Fn(&T) -> bool,
    Fail: Fn(&T) -> bool,
{
    AsyncOperationPoller::new(config)
        .with_cancellation(cancel)
        .run(status_fn, is_terminal, is_failure)
        .await
}
