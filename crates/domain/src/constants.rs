//! Wire and configuration constants
//!
//! Centralized location for header names and default values used by the
//! request core.

use std::time::Duration;

// Headers consumed from responses
pub const HEADER_LOCATION: &str = "location";
pub const HEADER_RETRY_AFTER: &str = "retry-after";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";

/// Status reported by an [`crate::AsyncMarker`] until polling resolves it.
pub const PENDING_STATUS: &str = "pending";

// Client defaults
pub const DEFAULT_BASE_URL: &str = "https://api.issuance.dev/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Retry defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Upper bound of the uniform jitter added on top of a backoff delay (10%).
pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

// Polling defaults
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_POLL_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_MAX_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);
