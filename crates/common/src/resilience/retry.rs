//! Retry eligibility and backoff
//!
//! A failure is retried only when its category is transient (`Connection`,
//! `Timeout`, `ServerFault`, `RateLimited`) and the attempt index is still
//! below `RetryConfig::max_attempts`. The delay before retry `n` is
//!
//! ```text
//! min(base_delay × multiplier^n, max_delay) + U(0, jitter_ratio) × that
//! ```
//!
//! re-capped at `max_delay`. A rate-limited error carrying a server hint waits
//! at least as long as the hint.

use std::time::Duration;

use issuance_domain::{ClassifiedError, ErrorCategory, RetryConfig};
use rand::Rng;

use super::scale_capped;

/// Decision for whether to retry a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay
    RetryAfter(Duration),
    /// Surface the error to the caller
    Stop,
}

/// Whether `error`, raised by attempt `attempt_index` (0-based), may be retried.
pub fn should_retry(error: &ClassifiedError, attempt_index: u32, config: &RetryConfig) -> bool {
    if attempt_index >= config.max_attempts {
        return false;
    }
    match error.category() {
        ErrorCategory::RateLimited => config.retry_rate_limited,
        category => category.is_retryable(),
    }
}

/// Deterministic part of the backoff delay: `min(base × multiplier^n, max)`.
pub fn base_delay(attempt_index: u32, config: &RetryConfig) -> Duration {
    let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
    let factor = config.backoff_multiplier.powi(exponent);
    scale_capped(config.base_delay, factor, config.max_delay).min(config.max_delay)
}

/// Backoff delay before retry `attempt_index`, jittered with the thread RNG.
pub fn next_delay(attempt_index: u32, config: &RetryConfig) -> Duration {
    next_delay_with_rng(attempt_index, config, &mut rand::thread_rng())
}

/// [`next_delay`] with a caller-supplied random source.
pub fn next_delay_with_rng<R: Rng + ?Sized>(
    attempt_index: u32,
    config: &RetryConfig,
    rng: &mut R,
) -> Duration {
    let base = base_delay(attempt_index, config);
    let ratio = config.jitter_ratio;
    if !ratio.is_finite() || ratio <= 0.0 || base.is_zero() {
        return base;
    }
    let jitter = rng.gen_range(0.0..=ratio.min(1.0));
    scale_capped(base, 1.0 + jitter, config.max_delay)
}

/// Delay before retrying `error`, honouring a rate-limit hint when present.
pub fn delay_for(error: &ClassifiedError, attempt_index: u32, config: &RetryConfig) -> Duration {
    let computed = next_delay(attempt_index, config);
    match (error.category(), error.retry_after()) {
        (ErrorCategory::RateLimited, Some(hint)) => computed.max(hint),
        _ => computed,
    }
}

/// Combine [`should_retry`] and [`delay_for`] into one decision.
pub fn decide(error: &ClassifiedError, attempt_index: u32, config: &RetryConfig) -> RetryDecision {
    if should_retry(error, attempt_index, config) {
        RetryDecision::RetryAfter(delay_for(error, attempt_index, config))
    } else {
        RetryDecision::Stop
    }
}

/// A [`RetryConfig`] bound to the retry rules above.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn should_retry(&self, error: &ClassifiedError, attempt_index: u32) -> bool {
        should_retry(error, attempt_index, &self.config)
    }

    pub fn next_delay(&self, attempt_index: u32) -> Duration {
        next_delay(attempt_index, &self.config)
    }

    pub fn decide(&self, error: &ClassifiedError, attempt_index: u32) -> RetryDecision {
        decide(error, attempt_index, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn config() -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(5)
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(1_000))
            .backoff_multiplier(2.0)
            .no_jitter()
            .build()
            .unwrap()
    }

    #[test]
    fn base_delay_grows_then_caps() {
        let config = config();
        let delays: Vec<_> = (0..6).map(|i| base_delay(i, &config).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn base_delay_saturates_for_huge_indices() {
        assert_eq!(base_delay(u32::MAX, &config()), Duration::from_millis(1_000));
    }

    #[test]
    fn permanent_categories_are_never_retried() {
        let config = config();
        let permanent = [
            ClassifiedError::authentication("bad key"),
            ClassifiedError::validation("bad body"),
            ClassifiedError::not_found("missing"),
            ClassifiedError::conflict("state"),
            ClassifiedError::configuration("broken"),
            ClassifiedError::processing_failed("failed", None),
            ClassifiedError::cancelled(),
        ];
        for error in &permanent {
            for index in 0..config.max_attempts {
                assert!(!should_retry(error, index, &config), "{error}");
            }
        }
    }

    #[test]
    fn transient_categories_retry_until_budget_spent() {
        let config = config();
        let transient = [
            ClassifiedError::connection("reset"),
            ClassifiedError::timeout("slow"),
            ClassifiedError::server_fault("boom"),
            ClassifiedError::rate_limited("slow down"),
        ];
        for error in &transient {
            for index in 0..config.max_attempts {
                assert!(should_retry(error, index, &config));
            }
            assert!(!should_retry(error, config.max_attempts, &config));
        }
    }

    #[test]
    fn zero_max_attempts_means_single_attempt() {
        let error = ClassifiedError::server_fault("boom");
        assert!(!should_retry(&error, 0, &RetryConfig::none()));
    }

    #[test]
    fn rate_limited_retry_can_be_disabled() {
        let config = RetryConfig { retry_rate_limited: false, ..config() };
        assert!(!should_retry(&ClassifiedError::rate_limited("slow down"), 0, &config));
        assert!(should_retry(&ClassifiedError::server_fault("boom"), 0, &config));
    }

    #[test]
    fn jitter_stays_within_ratio_and_cap() {
        let config = RetryConfig { jitter_ratio: 0.1, ..config() };
        let mut rng = StdRng::seed_from_u64(7);
        for index in 0..8 {
            let base = base_delay(index, &config);
            for _ in 0..50 {
                let delay = next_delay_with_rng(index, &config, &mut rng);
                assert!(delay >= base);
                assert!(delay <= scale_capped(base, 1.1, config.max_delay));
            }
        }
    }

    #[test]
    fn rate_limit_hint_extends_delay() {
        let config = config();
        let hinted = ClassifiedError::rate_limited("slow down").with_retry_after(Duration::from_secs(5));
        assert_eq!(delay_for(&hinted, 0, &config), Duration::from_secs(5));

        let short_hint =
            ClassifiedError::rate_limited("slow down").with_retry_after(Duration::from_millis(10));
        assert_eq!(delay_for(&short_hint, 2, &config), Duration::from_millis(400));
    }

    #[test]
    fn policy_decides() {
        let policy = RetryPolicy::new(config());
        assert_eq!(
            policy.decide(&ClassifiedError::server_fault("boom"), 1),
            RetryDecision::RetryAfter(Duration::from_millis(200))
        );
        assert_eq!(policy.decide(&ClassifiedError::validation("bad"), 0), RetryDecision::Stop);
    }
}
