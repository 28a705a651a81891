//! Error classification
//!
//! Maps the outcome of a single HTTP attempt onto the closed
//! [`ErrorCategory`] set:
//!
//! | Input | Category |
//! |-------|----------|
//! | connection, DNS or TLS failure | `Connection` |
//! | attempt deadline exceeded | `Timeout` |
//! | 401 | `Authentication` |
//! | 400, 422, other 4xx | `Validation` |
//! | 404 | `NotFound` |
//! | 409 | `Conflict` |
//! | 429 | `RateLimited` |
//! | 5xx | `ServerFault` |
//! | anything else | `Configuration` |
//!
//! A transport failure always wins over a status. Classification is pure: the
//! same inputs always produce the same error.

use std::fmt;
use std::time::Duration;

use http::StatusCode;
use issuance_domain::{ClassifiedError, ErrorCategory, ResponseBody};
use serde_json::Value;

/// Failure below the HTTP layer, already stripped of transport-specific types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// TCP connect refused, reset or unreachable
    Connect(String),
    /// Host name could not be resolved
    Dns(String),
    /// TLS handshake or certificate failure
    Tls(String),
    /// The attempt exceeded its deadline
    Timeout(Option<Duration>),
    /// Any other I/O failure while sending or reading
    Other(String),
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(detail) => write!(f, "connection failed: {detail}"),
            Self::Dns(detail) => write!(f, "dns resolution failed: {detail}"),
            Self::Tls(detail) => write!(f, "tls failure: {detail}"),
            Self::Timeout(Some(after)) => write!(f, "request timed out after {}ms", after.as_millis()),
            Self::Timeout(None) => f.write_str("request timed out"),
            Self::Other(detail) => write!(f, "transport failure: {detail}"),
        }
    }
}

/// Classify one failed attempt.
///
/// `status` and `body` describe the HTTP response when one was received;
/// `transport` describes a failure that prevented a response altogether.
pub fn classify(
    status: Option<u16>,
    body: Option<&ResponseBody>,
    transport: Option<&TransportFailure>,
) -> ClassifiedError {
    if let Some(failure) = transport {
        let category = match failure {
            TransportFailure::Timeout(_) => ErrorCategory::Timeout,
            _ => ErrorCategory::Connection,
        };
        return ClassifiedError::new(category, failure.to_string());
    }

    let Some(status) = status else {
        return ClassifiedError::configuration("no response and no transport failure reported");
    };

    let category = category_for_status(status);
    let message = body
        .and_then(extract_message)
        .unwrap_or_else(|| fallback_message(status, category));

    let mut error = ClassifiedError::new(category, message).with_status(status);
    if let Some(details) = body.and_then(details_of) {
        error = error.with_details(details);
    }
    error
}

/// Category for an HTTP status, without looking at the body.
pub const fn category_for_status(status: u16) -> ErrorCategory {
    match status {
        401 => ErrorCategory::Authentication,
        404 => ErrorCategory::NotFound,
        409 => ErrorCategory::Conflict,
        429 => ErrorCategory::RateLimited,
        400..=499 => ErrorCategory::Validation,
        500..=599 => ErrorCategory::ServerFault,
        _ => ErrorCategory::Configuration,
    }
}

fn fallback_message(status: u16, category: ErrorCategory) -> String {
    if category == ErrorCategory::Configuration {
        return format!("unexpected server response: {status}");
    }
    match reason_phrase(status) {
        Some(reason) => format!("{status} {reason}"),
        None => format!("{status} HTTP error"),
    }
}

fn reason_phrase(status: u16) -> Option<&'static str> {
    StatusCode::from_u16(status).ok().and_then(|status| status.canonical_reason())
}

/// Pull a human-readable message out of an error body.
///
/// JSON bodies are searched for `message`, then `error` (string or object with
/// `message`), then `errors[0].message`. Text bodies are used as-is.
fn extract_message(body: &ResponseBody) -> Option<String> {
    match body {
        ResponseBody::Json(value) => json_message(value),
        ResponseBody::Text(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

fn json_message(value: &Value) -> Option<String> {
    let non_empty = |v: &Value| v.as_str().filter(|s| !s.trim().is_empty()).map(str::to_string);

    if let Some(message) = value.get("message").and_then(non_empty) {
        return Some(message);
    }
    if let Some(error) = value.get("error") {
        if let Some(message) = non_empty(error).or_else(|| error.get("message").and_then(non_empty)) {
            return Some(message);
        }
    }
    value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("message").and_then(non_empty).or_else(|| non_empty(first)))
}

fn details_of(body: &ResponseBody) -> Option<Value> {
    match body {
        ResponseBody::Json(Value::Null) => None,
        ResponseBody::Json(value) => Some(value.clone()),
        ResponseBody::Text(text) if !text.trim().is_empty() => Some(Value::String(text.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn json_body(value: Value) -> ResponseBody {
        ResponseBody::Json(value)
    }

    #[test]
    fn status_table() {
        let cases = [
            (400, ErrorCategory::Validation),
            (401, ErrorCategory::Authentication),
            (403, ErrorCategory::Validation),
            (404, ErrorCategory::NotFound),
            (409, ErrorCategory::Conflict),
            (422, ErrorCategory::Validation),
            (429, ErrorCategory::RateLimited),
            (500, ErrorCategory::ServerFault),
            (502, ErrorCategory::ServerFault),
            (503, ErrorCategory::ServerFault),
            (599, ErrorCategory::ServerFault),
            (302, ErrorCategory::Configuration),
        ];
        for (status, expected) in cases {
            assert_eq!(classify(Some(status), None, None).category(), expected, "status {status}");
        }
    }

    #[test]
    fn transport_failure_wins_over_status() {
        let err = classify(
            Some(500),
            None,
            Some(&TransportFailure::Timeout(Some(Duration::from_millis(250)))),
        );
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(err.status(), None);
        assert_eq!(err.message(), "request timed out after 250ms");

        let err = classify(None, None, Some(&TransportFailure::Dns("no such host".into())));
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[test]
    fn message_lookup_order() {
        let body = json_body(json!({ "message": "first", "error": "second" }));
        assert_eq!(classify(Some(400), Some(&body), None).message(), "first");

        let body = json_body(json!({ "error": { "message": "nested" } }));
        assert_eq!(classify(Some(400), Some(&body), None).message(), "nested");

        let body = json_body(json!({ "errors": [{ "code": 12, "message": "cityCode is required" }] }));
        assert_eq!(classify(Some(422), Some(&body), None).message(), "cityCode is required");
    }

    #[test]
    fn validation_keeps_field_details() {
        let payload = json!({ "errors": [{ "field": "borrower.federalTaxNumber", "message": "invalid" }] });
        let err = classify(Some(400), Some(&json_body(payload.clone())), None);
        assert_eq!(err.details(), Some(&payload));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn fallback_message_uses_reason_phrase() {
        assert_eq!(classify(Some(503), None, None).message(), "503 Service Unavailable");
        assert_eq!(classify(Some(418), None, None).message(), "418 I'm a teapot");
        assert_eq!(classify(Some(451), None, None).message(), "451 Unavailable For Legal Reasons");
        assert_eq!(classify(Some(599), None, None).message(), "599 HTTP error");
        assert_eq!(
            classify(Some(503), Some(&ResponseBody::Text("  upstream down \n".into())), None).message(),
            "upstream down"
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let body = json_body(json!({ "message": "busy" }));
        for status in [400, 401, 404, 409, 429, 500, 502, 503] {
            assert_eq!(
                classify(Some(status), Some(&body), None),
                classify(Some(status), Some(&body), None)
            );
        }
    }
}
