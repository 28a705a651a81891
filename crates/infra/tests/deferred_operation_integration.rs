//! End-to-end tests for deferred operations: submit, receive `202` with a
//! `Location`, poll the location until the operation resolves.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use issuance_domain::{ErrorCategory, PollingConfig, RequestSpec, RetryConfig, TypedResponse};
use issuance_infra::ApiClient;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::builder()
        .api_key("test-key")
        .base_url(server.uri())
        .retry(RetryConfig::none())
        .build()
        .expect("client should build")
}

fn polling(max_attempts: u32) -> PollingConfig {
    PollingConfig {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        backoff_multiplier: 2.0,
        timeout: Duration::from_secs(10),
    }
}

fn flow_status(response: &TypedResponse) -> Option<&str> {
    response.body().as_json().and_then(|body| body["flowStatus"].as_str())
}

fn issued(response: &TypedResponse) -> bool {
    flow_status(response) == Some("Issued")
}

fn failed(response: &TypedResponse) -> bool {
    flow_status(response) == Some("IssueFailed")
}

async fn mount_submission(server: &MockServer, location: &str) {
    Mock::given(method("POST"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", location))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_deferred_invoice_is_polled_until_issued() {
    let mock_server = MockServer::start().await;
    mount_submission(&mock_server, "/invoices/inv_123").await;

    Mock::given(method("GET"))
        .and(path("/invoices/inv_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "flowStatus": "Processing" })))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/invoices/inv_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "inv_123",
            "flowStatus": "Issued"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .create_and_wait(
            RequestSpec::post("/invoices").json(json!({ "amount": 100 })),
            issued,
            failed,
            polling(10),
        )
        .await
        .expect("operation should complete");

    let body: Value = response.json().unwrap();
    assert_eq!(body["id"], "inv_123");
    assert_eq!(body["flowStatus"], "Issued");
}

#[tokio::test]
async fn test_absolute_location_is_followed() {
    let mock_server = MockServer::start().await;
    let location = format!("{}/status/inv_9", mock_server.uri());
    mount_submission(&mock_server, &location).await;

    Mock::given(method("GET"))
        .and(path("/status/inv_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "flowStatus": "Issued" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .create_and_wait(RequestSpec::post("/invoices"), issued, failed, polling(3))
        .await
        .expect("operation should complete");

    assert!(issued(&response));
}

#[tokio::test]
async fn test_origin_relative_location_under_versioned_base() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/invoices"))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", "/v1/invoices/inv_1"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/invoices/inv_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "flowStatus": "Issued" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .api_key("test-key")
        .base_url(format!("{}/v1", mock_server.uri()))
        .retry(RetryConfig::none())
        .build()
        .expect("client should build");
    let response = client
        .create_and_wait(RequestSpec::post("/invoices"), issued, failed, polling(3))
        .await
        .expect("operation should complete");

    assert!(issued(&response));
}

#[tokio::test]
async fn test_failed_issuance_carries_diagnostic() {
    let mock_server = MockServer::start().await;
    mount_submission(&mock_server, "/invoices/inv_bad").await;

    Mock::given(method("GET"))
        .and(path("/invoices/inv_bad"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flowStatus": "IssueFailed",
            "flowMessage": "Tax authority rejected the document"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .create_and_wait(RequestSpec::post("/invoices"), issued, failed, polling(10))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::ProcessingFailed);
    assert_eq!(err.attempts(), Some(1));
    let details = err.details().expect("diagnostic should be attached");
    assert_eq!(details["body"]["value"]["flowMessage"], "Tax authority rejected the document");
}

#[tokio::test]
async fn test_still_processing_times_out() {
    let mock_server = MockServer::start().await;
    mount_submission(&mock_server, "/invoices/inv_slow").await;

    Mock::given(method("GET"))
        .and(path("/invoices/inv_slow"))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", "/invoices/inv_slow"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .create_and_wait(RequestSpec::post("/invoices"), issued, failed, polling(3))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert_eq!(err.attempts(), Some(3));
}

#[tokio::test]
async fn test_status_errors_propagate() {
    let mock_server = MockServer::start().await;
    mount_submission(&mock_server, "/invoices/inv_gone").await;

    Mock::given(method("GET"))
        .and(path("/invoices/inv_gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "not found" })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .create_and_wait(RequestSpec::post("/invoices"), issued, failed, polling(5))
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_generic_poll_with_custom_status_fn() {
    let mock_server = MockServer::start().await;
    let client = client_for(&mock_server);
    let checks = Arc::new(AtomicU32::new(0));

    let counter = checks.clone();
    let final_count = client
        .poll(
            move || {
                let counter = counter.clone();
                async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
            },
            |count: &u32| *count >= 3,
            |_: &u32| false,
            polling(10),
        )
        .await
        .expect("poll should complete");

    assert_eq!(final_count, 3);
    assert_eq!(checks.load(Ordering::SeqCst), 3);
}
