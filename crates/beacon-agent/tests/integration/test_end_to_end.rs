//! Default adapters against a mock HTTP endpoint and a temporary directory

use std::time::Duration;

use tempfile::TempDir;
use wiremock::MockServer;

use beacon_agent::{CrashOutcome, TelemetryAgent};
use beacon_core::config::StorageBackend;
use beacon_core::domain::{Attributes, CapturedError};

use crate::common::{http_config, received_bodies, respond_with, INGEST_PATH};

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<serde_json::Value> {
    for _ in 0..200 {
        let bodies = received_bodies(server).await;
        if bodies.len() >= count {
            return bodies;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("endpoint did not receive {count} request(s)");
}

fn crash_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_filesystem_store_round_trip() {
    let server = MockServer::start().await;
    respond_with(&server, 503).await;
    let dir = TempDir::new().unwrap();
    let endpoint = format!("{}{}", server.uri(), INGEST_PATH);

    let config = http_config(&endpoint, dir.path(), StorageBackend::Filesystem).build();
    let agent = TelemetryAgent::from_config(config).await.unwrap();
    agent.initialize().await.unwrap();

    let outcome = agent
        .track_error(
            &CapturedError::new("IoError", "disk unavailable"),
            Some("at storage::flush".into()),
            Attributes::new(),
        )
        .unwrap()
        .await
        .unwrap();
    let CrashOutcome::Stored(id) = outcome else {
        panic!("expected the crash to be stored, got {outcome:?}");
    };

    let files = crash_files(&dir.path().join("crashes"));
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(format!("{id}.json")));

    let on_disk: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&files[0]).unwrap()).unwrap();
    assert_eq!(on_disk["type"], "error");
    assert_eq!(on_disk["storage"]["id"], id.as_str());
    assert_eq!(on_disk["storage"]["retry_count"], 0);

    respond_with(&server, 200).await;
    let report = agent.force_retry_all().await.unwrap();
    assert_eq!(report.success, 1);
    assert!(crash_files(&dir.path().join("crashes")).is_empty());

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["retry_info"]["retry_count"], 1);
    assert_eq!(bodies[0]["attributes"]["service.name"], "e2e");

    agent.dispose().await;
}

#[tokio::test]
async fn test_sqlite_store_round_trip() {
    let server = MockServer::start().await;
    respond_with(&server, 500).await;
    let dir = TempDir::new().unwrap();
    let endpoint = format!("{}{}", server.uri(), INGEST_PATH);

    let config = http_config(&endpoint, dir.path(), StorageBackend::Sqlite).build();
    let agent = TelemetryAgent::from_config(config).await.unwrap();
    agent.initialize().await.unwrap();

    agent
        .track_error(&CapturedError::new("DbError", "locked"), None, Attributes::new())
        .unwrap()
        .await
        .unwrap();
    assert!(dir.path().join("crashes").join("offline.db").exists());
    assert_eq!(agent.offline_store().count().await.unwrap(), 1);

    respond_with(&server, 202).await;
    let report = agent.force_retry_all().await.unwrap();
    assert_eq!(report.success, 1);
    assert_eq!(agent.offline_store().count().await.unwrap(), 0);

    agent.dispose().await;
}

#[tokio::test]
async fn test_events_are_posted_as_batches() {
    let server = MockServer::start().await;
    respond_with(&server, 200).await;
    let dir = TempDir::new().unwrap();
    let endpoint = format!("{}{}", server.uri(), INGEST_PATH);

    let config = http_config(&endpoint, dir.path(), StorageBackend::Filesystem)
        .batch_size(3)
        .build();
    let agent = TelemetryAgent::from_config(config).await.unwrap();
    agent.initialize().await.unwrap();

    for name in ["launch", "login", "home"] {
        agent.track_event(name, Attributes::new()).unwrap();
    }

    let bodies = wait_for_requests(&server, 1).await;
    assert_eq!(bodies[0]["type"], "batch");
    assert_eq!(bodies[0]["batch_size"], 3);
    assert_eq!(bodies[0]["events"][2]["eventName"], "home");

    agent.dispose().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panics_are_reported_through_the_hook() {
    let server = MockServer::start().await;
    respond_with(&server, 200).await;
    let dir = TempDir::new().unwrap();
    let endpoint = format!("{}{}", server.uri(), INGEST_PATH);

    let config = http_config(&endpoint, dir.path(), StorageBackend::Filesystem)
        .install_error_hooks(true)
        .build();
    let agent = TelemetryAgent::from_config(config).await.unwrap();
    agent.initialize().await.unwrap();

    let result = std::panic::catch_unwind(|| panic!("index out of range"));
    assert!(result.is_err());

    let bodies = wait_for_requests(&server, 1).await;
    assert_eq!(bodies[0]["type"], "error");
    assert_eq!(bodies[0]["error"], "Panic: index out of range");
    assert!(bodies[0]["stackTrace"].as_str().unwrap().starts_with("at "));

    agent.dispose().await;
}
