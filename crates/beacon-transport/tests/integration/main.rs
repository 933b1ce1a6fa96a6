//! Integration tests for beacon-transport
//!
//! Uses wiremock to simulate the ingestion endpoint and verifies the
//! requests the HTTP transport produces and how it reports failures.

mod common;

mod test_http_transport;
