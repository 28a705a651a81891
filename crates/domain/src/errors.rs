//! Error types used throughout the client
//!
//! Every failure surfaced by the request core is a [`ClassifiedError`]: a
//! fixed [`ErrorCategory`] discriminant plus message, optional HTTP status and
//! an opaque `details` payload. Callers branch on the category, never on the
//! message text.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DurationMilliSeconds};
use thiserror::Error;

/// Closed set of failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credentials rejected (401)
    Authentication,
    /// Request rejected as invalid (400, 422, other 4xx)
    Validation,
    /// Resource does not exist (404)
    NotFound,
    /// Request conflicts with current resource state (409)
    Conflict,
    /// Server asked the client to slow down (429)
    RateLimited,
    /// Server-side failure (5xx)
    ServerFault,
    /// Connection, DNS or TLS failure
    Connection,
    /// An attempt or a polling run exceeded its deadline
    Timeout,
    /// A deferred operation finished in a failed business state
    ProcessingFailed,
    /// Invalid client configuration or broken server contract
    Configuration,
    /// The caller cancelled the operation
    Cancelled,
}

impl ErrorCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Authentication,
        Self::Validation,
        Self::NotFound,
        Self::Conflict,
        Self::RateLimited,
        Self::ServerFault,
        Self::Connection,
        Self::Timeout,
        Self::ProcessingFailed,
        Self::Configuration,
        Self::Cancelled,
    ];

    /// Whether failures of this category are transient and may be retried.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Connection | Self::Timeout | Self::ServerFault | Self::RateLimited)
    }

    /// Stable label suitable for logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate_limited",
            Self::ServerFault => "server_fault",
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::ProcessingFailed => "processing_failed",
            Self::Configuration => "configuration",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully populated, serializable error drawn from [`ErrorCategory`].
#[serde_as]
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct ClassifiedError {
    category: ErrorCategory,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "retry_after_ms", skip_serializing_if = "Option::is_none")]
    retry_after: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u32>,
}

impl ClassifiedError {
    /// Error of `category` with no status, details or hint attached.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            status: None,
            details: None,
            retry_after: None,
            attempts: None,
        }
    }

    /// Credentials were rejected (401).
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Authentication, message)
    }

    /// The request was rejected as invalid.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    /// The addressed resource does not exist (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, message)
    }

    /// The request conflicts with the resource state (409).
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Conflict, message)
    }

    /// The server asked the caller to slow down (429).
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::RateLimited, message)
    }

    /// The server failed to handle the request (5xx).
    pub fn server_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ServerFault, message)
    }

    /// The request never got an HTTP answer.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Connection, message)
    }

    /// A deadline ran out before an answer arrived.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message)
    }

    /// A deferred operation ended in a failed state; `diagnostic` is the last
    /// observed status payload.
    pub fn processing_failed(message: impl Into<String>, diagnostic: Option<Value>) -> Self {
        let mut error = Self::new(ErrorCategory::ProcessingFailed, message);
        error.details = diagnostic;
        error
    }

    /// Local setup or server contract is wrong; never retried.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, message)
    }

    /// The caller cancelled the operation.
    pub fn cancelled() -> Self {
        Self::new(ErrorCategory::Cancelled, "operation cancelled")
    }

    /// Attach the HTTP status that produced this error.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the decoded error body.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the server's `Retry-After` hint.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Record how many attempts were made before this error became final.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Category that drives retry decisions.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Decoded error body or failure diagnostic.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Server-provided `Retry-After` hint, only set on rate-limited errors.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Number of attempts made, once the error is final.
    pub fn attempts(&self) -> Option<u32> {
        self.attempts
    }

    /// Whether the category is eligible for another attempt.
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Uniform diagnostic representation, regardless of category.
    pub fn to_diagnostic(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "category": self.category, "message": self.message })
        })
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClassifiedError>;
