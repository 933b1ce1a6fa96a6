//! Integration tests for HttpTransport
//!
//! - Payloads are posted as JSON to the configured endpoint
//! - The API key is sent as a bearer token
//! - Non-2xx responses and timeouts are failures

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use beacon_core::ports::ITransport;
use beacon_transport::{HttpTransport, TransportError};

use crate::common::{self, INGEST_PATH};

#[tokio::test]
async fn test_send_posts_json_payload() {
    let (server, transport) = common::setup_endpoint(202).await;

    let payload = json!({"type": "batch", "events": [], "batch_size": 0});
    transport.send(&payload).await.expect("send should succeed");

    let bodies = common::received_bodies(&server).await;
    assert_eq!(bodies, vec![payload]);
}

#[tokio::test]
async fn test_api_key_is_sent_as_bearer_token() {
    let server = MockServer::start().await;
    let payload = json!({"type": "error", "error": "E: boom"});

    Mock::given(method("POST"))
        .and(path(INGEST_PATH))
        .and(header("authorization", "Bearer secret-key"))
        .and(header("content-type", "application/json"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::with_endpoint(format!("{}{}", server.uri(), INGEST_PATH))
        .unwrap()
        .with_api_key("secret-key");

    transport.send(&payload).await.expect("authorized send should succeed");
}

#[tokio::test]
async fn test_server_error_is_a_failure() {
    let (_server, transport) = common::setup_endpoint(503).await;

    let err = transport.post(&json!({"type": "batch"})).await.unwrap_err();
    match err {
        TransportError::Rejected { status, ref body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "ack");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert!(err.is_retryable());

    // Through the port the failure is still an error
    assert!(transport.send(&json!({"type": "batch"})).await.is_err());
}

#[tokio::test]
async fn test_client_error_is_not_retryable() {
    let (_server, transport) = common::setup_endpoint(400).await;

    let err = transport.post(&json!({})).await.unwrap_err();
    assert!(matches!(err, TransportError::Rejected { status: 400, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let transport = HttpTransport::with_endpoint(format!("{}{}", server.uri(), INGEST_PATH))
        .unwrap()
        .with_timeout(Duration::from_millis(100));

    let err = transport.post(&json!({})).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Port 9 (discard) on localhost is closed in test environments
    let transport = HttpTransport::with_endpoint("http://127.0.0.1:9/v1/ingest")
        .unwrap()
        .with_timeout(Duration::from_secs(2));

    let err = transport.post(&json!({})).await.unwrap_err();
    assert!(
        matches!(err, TransportError::Network(_) | TransportError::Timeout),
        "got {err:?}"
    );
    assert!(err.is_retryable());
}
