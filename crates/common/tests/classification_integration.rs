//! Integration tests for error classification
//!
//! Feeds realistic error bodies through `classify` and checks the category,
//! message and carried details.

#![cfg(feature = "foundation")]

use std::time::Duration;

use issuance_common::{classify, TransportFailure};
use issuance_domain::{ErrorCategory, ResponseBody};
use serde_json::json;

#[test]
fn unauthorized_key_is_authentication() {
    let body = ResponseBody::Json(json!({ "message": "API key invalid" }));
    let err = classify(Some(401), Some(&body), None);
    assert_eq!(err.category(), ErrorCategory::Authentication);
    assert_eq!(err.message(), "API key invalid");
    assert!(!err.is_retryable());
}

#[test]
fn unprocessable_entity_carries_field_errors() {
    let body = ResponseBody::Json(json!({
        "errors": [
            { "code": 1001, "message": "servicesAmount must be positive" },
            { "code": 1002, "message": "cityServiceCode is required" }
        ]
    }));
    let err = classify(Some(422), Some(&body), None);
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(err.message(), "servicesAmount must be positive");
    assert_eq!(err.details().unwrap()["errors"].as_array().unwrap().len(), 2);
}

#[test]
fn rate_limit_is_retryable() {
    let err = classify(Some(429), None, None);
    assert_eq!(err.category(), ErrorCategory::RateLimited);
    assert!(err.is_retryable());
    assert_eq!(err.status(), Some(429));
}

#[test]
fn gateway_html_page_becomes_server_fault() {
    let body = ResponseBody::Text("<html><body>502 Bad Gateway</body></html>".into());
    let err = classify(Some(502), Some(&body), None);
    assert_eq!(err.category(), ErrorCategory::ServerFault);
    assert!(err.is_retryable());
}

#[test]
fn transport_failures() {
    let cases = [
        (TransportFailure::Connect("connection refused".into()), ErrorCategory::Connection),
        (TransportFailure::Tls("certificate expired".into()), ErrorCategory::Connection),
        (TransportFailure::Other("body stream reset".into()), ErrorCategory::Connection),
        (TransportFailure::Timeout(Some(Duration::from_secs(30))), ErrorCategory::Timeout),
    ];
    for (failure, expected) in cases {
        let err = classify(None, None, Some(&failure));
        assert_eq!(err.category(), expected, "{failure}");
        assert!(err.is_retryable());
    }
}

#[test]
fn unexpected_status_is_configuration() {
    let err = classify(Some(304), None, None);
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(err.message(), "unexpected server response: 304");
}
