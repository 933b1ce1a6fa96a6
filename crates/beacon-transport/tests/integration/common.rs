//! Shared test helpers for transport integration tests
//!
//! Each helper starts a wiremock server with the ingestion route mounted and
//! returns an HttpTransport pointing at it.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use beacon_transport::HttpTransport;

/// Ingestion route used by every test
pub const INGEST_PATH: &str = "/v1/ingest";

/// Starts a mock endpoint that answers every POST with `status`
pub async fn setup_endpoint(status: u16) -> (MockServer, HttpTransport) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(INGEST_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("ack"))
        .mount(&server)
        .await;

    let transport = HttpTransport::with_endpoint(format!("{}{}", server.uri(), INGEST_PATH))
        .expect("mock server URI is a valid endpoint");

    (server, transport)
}

/// Bodies of every request the server received, parsed as JSON
pub async fn received_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).expect("request body is JSON"))
        .collect()
}
