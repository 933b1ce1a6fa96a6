//! Shared test helpers for agent integration tests

use std::path::Path;
use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use beacon_agent::{AgentDeps, StaticContextProvider, TelemetryAgent};
use beacon_core::config::{Config, ConfigBuilder, StorageBackend};
use beacon_core::domain::Attributes;
use beacon_store::{MemoryDurableStore, MemoryKeyValueStore};
use beacon_transport::InMemoryTransport;

/// Ingestion route used by the end-to-end tests
pub const INGEST_PATH: &str = "/v1/ingest";

/// An initialized agent on in-memory adapters
pub struct Harness {
    pub agent: TelemetryAgent,
    pub transport: Arc<InMemoryTransport>,
    pub durable: Arc<MemoryDurableStore>,
    pub kv: Arc<MemoryKeyValueStore>,
}

/// Defaults with a pinned backoff (one minute) so retry cycles are predictable
pub fn memory_config() -> ConfigBuilder {
    ConfigBuilder::new()
        .service_name("integration")
        .install_error_hooks(false)
        .retry_base_delay_secs(60)
        .retry_max_delay_secs(60)
}

pub async fn start_agent(config: Config, transport: Arc<InMemoryTransport>) -> Harness {
    start_agent_with_kv(config, transport, Arc::new(MemoryKeyValueStore::new())).await
}

pub async fn start_agent_with_kv(
    config: Config,
    transport: Arc<InMemoryTransport>,
    kv: Arc<MemoryKeyValueStore>,
) -> Harness {
    let durable = Arc::new(MemoryDurableStore::new());
    let deps = AgentDeps {
        transport: transport.clone(),
        durable_store: durable.clone(),
        kv_store: kv.clone(),
        context: Arc::new(StaticContextProvider::new(
            Attributes::new().with("service.name", "integration"),
        )),
        error_hooks: None,
    };

    let agent = TelemetryAgent::new(config, deps).expect("valid test configuration");
    agent.initialize().await.expect("agent initializes");

    Harness {
        agent,
        transport,
        durable,
        kv,
    }
}

/// Configuration for the default adapters, rooted in `dir`
pub fn http_config(endpoint: &str, dir: &Path, backend: StorageBackend) -> ConfigBuilder {
    ConfigBuilder::new()
        .service_name("e2e")
        .install_error_hooks(false)
        .state_dir(dir.join("state"))
        .offline_backend(backend)
        .offline_directory(dir.join("crashes"))
        .retry_initial_delay_secs(3600)
        .retry_send_spacing_ms(1)
        .transport_endpoint(endpoint)
        .transport_timeout_secs(5)
}

/// Replaces every mounted route with one answering `status`
pub async fn respond_with(server: &MockServer, status: u16) {
    server.reset().await;
    Mock::given(method("POST"))
        .and(path(INGEST_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
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

/// Names of the events inside a batch payload
pub fn event_names(batch: &serde_json::Value) -> Vec<String> {
    batch["events"]
        .as_array()
        .map(|events| {
            events
                .iter()
                .map(|e| {
                    e.get("eventName")
                        .or_else(|| e.get("metricName"))
                        .and_then(|n| n.as_str())
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default()
}
