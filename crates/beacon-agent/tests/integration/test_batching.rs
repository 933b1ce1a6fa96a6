//! Event batching through the agent

use std::sync::Arc;
use std::time::Duration;

use beacon_core::domain::{Attributes, UserProfile};
use beacon_transport::InMemoryTransport;

use crate::common::{event_names, memory_config, start_agent};

#[tokio::test(start_paused = true)]
async fn test_batch_size_events_send_one_ordered_batch() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().batch_size(30).build(), transport.clone()).await;

    for i in 0..30 {
        h.agent
            .track_event(&format!("screen_{i}"), Attributes::new().with("index", i))
            .unwrap();
    }
    transport.wait_for_sent(1).await;

    assert_eq!(h.agent.queued_records(), 0);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["batch_size"], 30);
    let expected: Vec<_> = (0..30).map(|i| format!("screen_{i}")).collect();
    assert_eq!(event_names(&sent[0]), expected);

    let first = &sent[0]["events"][0];
    assert_eq!(first["type"], "event");
    assert_eq!(first["attributes"]["index"], "0");
    assert_eq!(first["attributes"]["service.name"], "integration");

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_remainder_goes_out_on_timeout() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(
        memory_config().batch_size(30).flush_timeout_secs(300).build(),
        transport.clone(),
    )
    .await;

    for i in 0..65 {
        h.agent.track_metric("frame_time_ms", i as f64, Attributes::new()).unwrap();
    }
    transport.wait_for_sent(2).await;
    assert_eq!(h.agent.queued_records(), 5);

    tokio::time::sleep(Duration::from_secs(301)).await;
    transport.wait_for_sent(3).await;

    let sizes: Vec<_> = transport
        .sent()
        .iter()
        .map(|b| b["batch_size"].as_u64().unwrap())
        .collect();
    assert_eq!(sizes, vec![30, 30, 5]);
    assert_eq!(transport.sent()[2]["events"][0]["type"], "metric");
    assert_eq!(transport.sent()[2]["events"][0]["value"], 60.0);

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispose_flushes_partial_batch() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    h.agent.track_event("a", Attributes::new()).unwrap();
    h.agent.track_event("b", Attributes::new()).unwrap();
    h.agent.dispose().await;

    transport.wait_for_sent(1).await;
    assert_eq!(event_names(&transport.sent()[0]), vec!["a", "b"]);
    assert!(h.agent.track_event("c", Attributes::new()).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_events_carry_current_user_id() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    h.agent.set_user_profile(UserProfile::new("u-7")).unwrap();
    h.agent.track_event("purchase", Attributes::new().with("sku", "A1")).unwrap();
    h.agent.flush().unwrap();
    transport.wait_for_sent(1).await;

    let batch = &transport.sent()[0];
    let names = event_names(batch);
    let purchase = names.iter().position(|n| n == "purchase").unwrap();
    assert_eq!(batch["events"][purchase]["attributes"]["user.id"], "u-7");
    assert_eq!(batch["events"][purchase]["attributes"]["sku"], "A1");

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_json_attributes_must_be_flat() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    h.agent
        .track_event_json("login", &serde_json::json!({"method": "sso", "attempt": 2}))
        .unwrap();
    assert!(h
        .agent
        .track_event_json("login", &serde_json::json!({"nested": {"a": 1}}))
        .is_err());
    assert_eq!(h.agent.queued_records(), 1);

    h.agent.dispose().await;
}
