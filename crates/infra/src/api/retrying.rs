//! One logical call spanning several attempts

use issuance_common::resilience::{sleep_or_cancel, RetryDecision, RetryPolicy};
use issuance_domain::{RequestSpec, Result, RetryConfig, TypedResponse};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::http::{Attempt, RequestExecutor};

/// Composes an [`Attempt`] source with the retry policy.
///
/// Attempts are strictly sequential. Only the final error reaches the caller,
/// with the number of attempts made recorded on it.
#[derive(Debug, Clone)]
pub struct RetryingClient<A = RequestExecutor> {
    inner: A,
}

impl<A: Attempt> RetryingClient<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Execute `spec`, retrying transient failures per `config`.
    ///
    /// # Errors
    /// - `Configuration` if `config` is invalid (no attempt is made)
    /// - `Cancelled` if `cancel` fires during an attempt or a backoff sleep
    /// - otherwise the classified error of the last attempt
    #[instrument(skip_all, fields(method = %spec.method(), path = %spec.path()))]
    pub async fn execute(
        &self,
        spec: &RequestSpec,
        config: &RetryConfig,
        cancel: &CancellationToken,
    ) -> Result<TypedResponse> {
        config.validate()?;
        self.execute_with_policy(spec, &RetryPolicy::new(config.clone()), cancel).await
    }

    /// [`execute`](Self::execute) with a prepared policy.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub async fn execute_with_policy(
        &self,
        spec: &RequestSpec,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<TypedResponse> {
        let mut attempt_index: u32 = 0;

        loop {
            let attempts = attempt_index + 1;
            let error = match self.inner.attempt(spec, cancel).await {
                Ok(response) => {
                    if attempt_index > 0 {
                        debug!(attempts, status = response.status(), "request succeeded after retries");
                    }
                    return Ok(response);
                }
                Err(error) => error,
            };

            match policy.decide(&error, attempt_index) {
                RetryDecision::Stop => {
                    if error.is_retryable() {
                        warn!(attempts, category = %error.category(), error = %error, "retry budget exhausted");
                    }
                    return Err(error.with_attempts(attempts));
                }
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        attempt = attempts,
                        max_retries = policy.config().max_attempts,
                        category = %error.category(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "request failed, retrying"
                    );
                    sleep_or_cancel(delay, cancel).await.map_err(|e| e.with_attempts(attempts))?;
                    attempt_index += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use issuance_domain::{ClassifiedError, ErrorCategory, ResponseBody};
    use tokio::time::Instant;

    use super::*;

    /// Replays a fixed list of outcomes and records when each attempt started.
    struct ScriptedAttempts {
        outcomes: Mutex<VecDeque<Result<TypedResponse>>>,
        started_at: Mutex<Vec<Instant>>,
    }

    impl ScriptedAttempts {
        fn new(outcomes: Vec<Result<TypedResponse>>) -> Self {
            Self { outcomes: Mutex::new(outcomes.into()), started_at: Mutex::new(Vec::new()) }
        }

        fn attempt_times(&self) -> Vec<Instant> {
            self.started_at.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Attempt for ScriptedAttempts {
        async fn attempt(&self, _spec: &RequestSpec, _cancel: &CancellationToken) -> Result<TypedResponse> {
            self.started_at.lock().unwrap().push(Instant::now());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ClassifiedError::configuration("script exhausted")))
        }
    }

    fn ok() -> Result<TypedResponse> {
        Ok(TypedResponse::new(200, BTreeMap::new(), ResponseBody::Empty))
    }

    fn unavailable() -> Result<TypedResponse> {
        Err(ClassifiedError::server_fault("503 Service Unavailable").with_status(503))
    }

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(5))
            .backoff_multiplier(2.0)
            .no_jitter()
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_server_faults() {
        let client = RetryingClient::new(ScriptedAttempts::new(vec![unavailable(), unavailable(), ok()]));

        let response = client
            .execute(&RequestSpec::get("/invoices/1"), &config(3), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let times = client.inner().attempt_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_millis(100));
        assert_eq!(times[2] - times[1], Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn validation_error_is_not_retried() {
        let client = RetryingClient::new(ScriptedAttempts::new(vec![
            Err(ClassifiedError::validation("bad payload").with_status(400)),
            ok(),
        ]));

        let err = client
            .execute(&RequestSpec::post("/invoices"), &config(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(client.inner().attempt_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_reports_attempt_count() {
        let client = RetryingClient::new(ScriptedAttempts::new(vec![unavailable(); 5]));

        let err = client
            .execute(&RequestSpec::get("/invoices"), &config(2), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::ServerFault);
        assert_eq!(err.attempts(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_hint_is_honoured() {
        let client = RetryingClient::new(ScriptedAttempts::new(vec![
            Err(ClassifiedError::rate_limited("slow down")
                .with_status(429)
                .with_retry_after(Duration::from_secs(3))),
            ok(),
        ]));

        client
            .execute(&RequestSpec::get("/invoices"), &config(3), &CancellationToken::new())
            .await
            .unwrap();

        let times = client.inner().attempt_times();
        assert_eq!(times[1] - times[0], Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff() {
        let client = RetryingClient::new(ScriptedAttempts::new(vec![unavailable(), ok()]));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = client.execute(&RequestSpec::get("/invoices"), &config(3), &token).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Cancelled);
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(client.inner().attempt_times().len(), 1);
    }

    #[tokio::test]
    async fn invalid_config_makes_no_attempt() {
        let client = RetryingClient::new(ScriptedAttempts::new(vec![ok()]));
        let invalid = RetryConfig { backoff_multiplier: 1.0, ..RetryConfig::default() };

        let err = client
            .execute(&RequestSpec::get("/invoices"), &invalid, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(client.inner().attempt_times().is_empty());
    }
}
