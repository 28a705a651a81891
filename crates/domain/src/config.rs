//! Configuration values
//!
//! `ClientConfig`, `RetryConfig` and `PollingConfig` are plain immutable
//! values. Changing the credential or base URL produces a new `ClientConfig`
//! rather than mutating one that an in-flight operation may be reading.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_URL, DEFAULT_JITTER_RATIO, DEFAULT_MAX_RETRIES,
    DEFAULT_POLL_INITIAL_DELAY, DEFAULT_POLL_MAX_ATTEMPTS, DEFAULT_POLL_MAX_DELAY,
    DEFAULT_POLL_MULTIPLIER, DEFAULT_POLL_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY,
};
use crate::errors::{ClassifiedError, Result};

/// Retry behaviour for one logical call.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries allowed after the initial attempt (`0` = a single attempt).
    pub max_attempts: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "base_delay_ms")]
    pub base_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Growth factor between consecutive delays; must be greater than 1.
    pub backoff_multiplier: f64,
    /// Upper bound of the uniform jitter, as a fraction of the delay.
    pub jitter_ratio: f64,
    /// Whether 429 responses are retried at all.
    pub retry_rate_limited: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_ratio: DEFAULT_JITTER_RATIO,
            retry_rate_limited: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn none() -> Self {
        Self { max_attempts: 0, ..Self::default() }
    }

    /// Start from the defaults and override fields fluently.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns a `Configuration` error when the multiplier is not greater
    /// than 1, the base delay exceeds the cap, or the jitter ratio is outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 1.0 {
            return Err(ClassifiedError::configuration(format!(
                "retry backoff_multiplier must be a finite value greater than 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(ClassifiedError::configuration(format!(
                "retry base_delay ({:?}) cannot be greater than max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(ClassifiedError::configuration(format!(
                "retry jitter_ratio must be within [0, 1], got {}",
                self.jitter_ratio
            )));
        }
        Ok(())
    }
}

/// Builder for [`RetryConfig`] with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    /// Retries allowed after the initial attempt.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    /// Cap applied to every computed delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Growth factor between consecutive delays.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    /// Upper bound of the random jitter, as a fraction of the delay.
    pub fn jitter_ratio(mut self, ratio: f64) -> Self {
        self.config.jitter_ratio = ratio;
        self
    }

    /// Disable jitter so delays are deterministic.
    pub fn no_jitter(mut self) -> Self {
        self.config.jitter_ratio = 0.0;
        self
    }

    /// Whether 429 responses are retried.
    pub fn retry_rate_limited(mut self, enabled: bool) -> Self {
        self.config.retry_rate_limited = enabled;
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    /// See [`RetryConfig::validate`].
    pub fn build(self) -> Result<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Backoff schedule and deadline for polling a deferred operation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Maximum number of status checks, including the first one.
    pub max_attempts: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "initial_delay_ms")]
    pub initial_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_delay_ms")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Overall deadline for the whole polling run.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms")]
    pub timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            initial_delay: DEFAULT_POLL_INITIAL_DELAY,
            max_delay: DEFAULT_POLL_MAX_DELAY,
            backoff_multiplier: DEFAULT_POLL_MULTIPLIER,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollingConfig {
    /// Validate the configuration
    ///
    /// # Errors
    /// Returns a `Configuration` error for a zero attempt budget, a zero
    /// timeout or a multiplier below 1.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ClassifiedError::configuration("polling max_attempts must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(ClassifiedError::configuration("polling timeout must be greater than 0"));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ClassifiedError::configuration(format!(
                "polling backoff_multiplier must be a finite value of at least 1, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Client-wide settings: credential, endpoint, per-attempt deadline and the
/// default retry/polling behaviour.
#[serde_as]
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Deadline for a single network attempt.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms", default = "default_request_timeout")]
    pub timeout: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl ClientConfig {
    /// Defaults for everything except the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: None,
            retry: RetryConfig::default(),
            polling: PollingConfig::default(),
        }
    }

    /// Copy of this configuration with another API key.
    #[must_use]
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), ..self }
    }

    /// Copy of this configuration with another base URL.
    #[must_use]
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..self }
    }

    /// Copy of this configuration with another per-attempt deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Copy of this configuration with another retry policy.
    #[must_use]
    pub fn with_retry(self, retry: RetryConfig) -> Self {
        Self { retry, ..self }
    }

    /// Copy of this configuration with another polling schedule.
    #[must_use]
    pub fn with_polling(self, polling: PollingConfig) -> Self {
        Self { polling, ..self }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns a `Configuration` error for a missing API key, an empty or
    /// unparsable base URL, a zero timeout, or invalid retry/polling sections.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ClassifiedError::configuration("api_key is required"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ClassifiedError::configuration("base_url is required"));
        }
        url::Url::parse(self.base_url.trim()).map_err(|e| {
            ClassifiedError::configuration(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        if self.timeout.is_zero() {
            return Err(ClassifiedError::configuration("timeout must be greater than 0"));
        }
        self.retry.validate()?;
        self.polling.validate()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .field("polling", &self.polling)
            .finish()
    }
}
