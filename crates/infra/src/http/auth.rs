//! Credential encoding for the `Authorization` header

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use issuance_domain::{ClassifiedError, Result};
use reqwest::header::HeaderValue;

/// `Basic base64(api_key)`, marked sensitive so it never shows up in debug
/// output of requests.
///
/// # Errors
/// Returns a `Configuration` error for an empty key.
pub fn basic_authorization(api_key: &str) -> Result<HeaderValue> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(ClassifiedError::configuration("api_key is required"));
    }
    let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(api_key)))
        .map_err(|e| ClassifiedError::configuration(format!("invalid api key: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}
