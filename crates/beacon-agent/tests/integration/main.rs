//! Integration tests for the telemetry agent
//!
//! In-memory adapters drive the batching, crash and profile scenarios under a
//! paused clock; the end-to-end tests run the default adapters against a
//! wiremock endpoint and a temporary directory.

mod common;
mod test_batching;
mod test_crashes;
mod test_end_to_end;
mod test_profile;
