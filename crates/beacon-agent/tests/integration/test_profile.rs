//! User profile mutations and the persisted profile version

use std::sync::Arc;

use beacon_agent::profile_version::PROFILE_VERSION_KEY;
use beacon_core::domain::{Attributes, UserProfile};
use beacon_store::MemoryKeyValueStore;
use beacon_transport::InMemoryTransport;
use serde_json::Value;

use crate::common::{event_names, memory_config, start_agent, start_agent_with_kv};

fn events_named<'a>(batch: &'a Value, name: &str) -> Vec<&'a Value> {
    let names = event_names(batch);
    names
        .iter()
        .enumerate()
        .filter(|(_, n)| n.as_str() == name)
        .map(|(i, _)| &batch["events"][i])
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_set_profile_emits_versioned_events() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    let profile = UserProfile::new("u-42")
        .with_name("Ada")
        .with_email("ada@example.com")
        .with_custom(Attributes::new().with("plan", "pro"));
    let version = h.agent.set_user_profile(profile).unwrap();
    assert_eq!(version.value(), 1);
    assert_eq!(h.agent.current_user().unwrap().id, "u-42");

    h.agent.flush().unwrap();
    transport.wait_for_sent(1).await;
    let batch = &transport.sent()[0];

    let updated = events_named(batch, "user.profile_updated");
    assert_eq!(updated.len(), 1);
    let attrs = &updated[0]["attributes"];
    assert_eq!(attrs["user.id"], "u-42");
    assert_eq!(attrs["user.name"], "Ada");
    assert_eq!(attrs["user.email"], "ada@example.com");
    assert_eq!(attrs["user.plan"], "pro");
    assert_eq!(attrs["user.profile_version"], "1");
    assert!(attrs.get("user.phone").is_none());

    let set = events_named(batch, "user.profile_set");
    let attrs = &set[0]["attributes"];
    assert_eq!(attrs["user.has_name"], "true");
    assert_eq!(attrs["user.has_phone"], "false");
    assert_eq!(attrs["user.custom_attributes_count"], "1");
    assert_eq!(attrs["profile_version"], "1");

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_clear_profile_emits_cleared_events() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    h.agent.set_user_profile(UserProfile::new("u-1")).unwrap();
    let version = h.agent.clear_user_profile().unwrap();
    assert_eq!(version.value(), 2);
    assert!(h.agent.current_user().is_none());

    h.agent.flush().unwrap();
    transport.wait_for_sent(1).await;
    let batch = &transport.sent()[0];

    let updated = events_named(batch, "user.profile_updated");
    assert_eq!(updated.len(), 2);
    assert_eq!(updated[1]["attributes"]["user.id"], "");
    assert_eq!(updated[1]["attributes"]["user.profile_cleared"], "true");
    assert_eq!(updated[1]["attributes"]["user.profile_version"], "2");

    let cleared = events_named(batch, "user.profile_cleared");
    assert_eq!(cleared.len(), 1);
    assert_eq!(cleared[0]["attributes"]["profile_version"], "2");

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_version_resumes_from_persisted_value() {
    let kv = Arc::new(MemoryKeyValueStore::with_value(PROFILE_VERSION_KEY, "3"));
    let h = start_agent_with_kv(
        memory_config().build(),
        Arc::new(InMemoryTransport::new()),
        kv,
    )
    .await;

    assert_eq!(h.agent.profile_version().value(), 3);
    let version = h.agent.set_user_profile(UserProfile::new("u-9")).unwrap();
    assert_eq!(version.value(), 4);

    h.agent.dispose().await;
    assert_eq!(h.kv.value(PROFILE_VERSION_KEY).as_deref(), Some("4"));
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_version_restarts_at_zero() {
    let kv = Arc::new(MemoryKeyValueStore::with_value(PROFILE_VERSION_KEY, "{corrupt"));
    let h = start_agent_with_kv(
        memory_config().build(),
        Arc::new(InMemoryTransport::new()),
        kv,
    )
    .await;

    let version = h.agent.set_user_profile(UserProfile::new("u-9")).unwrap();
    assert_eq!(version.value(), 1);

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_keeps_counting() {
    let kv = Arc::new(MemoryKeyValueStore::new());

    let first = start_agent_with_kv(
        memory_config().build(),
        Arc::new(InMemoryTransport::new()),
        kv.clone(),
    )
    .await;
    for id in ["a", "b", "c"] {
        first.agent.set_user_profile(UserProfile::new(id)).unwrap();
    }
    first.agent.dispose().await;

    let second = start_agent_with_kv(
        memory_config().build(),
        Arc::new(InMemoryTransport::new()),
        kv,
    )
    .await;
    assert_eq!(second.agent.clear_user_profile().unwrap().value(), 4);
    second.agent.dispose().await;
}
