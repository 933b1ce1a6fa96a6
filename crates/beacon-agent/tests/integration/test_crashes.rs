//! Crash reporting, offline storage and retry through the agent

use std::sync::Arc;
use std::time::Duration;

use beacon_agent::{AgentError, CrashOutcome, RetryReport};
use beacon_core::domain::{Attributes, BreadcrumbCategory, BreadcrumbLevel, CapturedError};
use beacon_transport::InMemoryTransport;

use crate::common::{memory_config, start_agent};

fn timeout_error() -> CapturedError {
    CapturedError::new("TimeoutError", "request to /sync timed out")
}

#[tokio::test(start_paused = true)]
async fn test_failed_crash_is_stored_then_dropped_after_three_cycles() {
    let transport = Arc::new(InMemoryTransport::failing());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    let outcome = h
        .agent
        .track_error(&timeout_error(), Some("at sync::run".into()), Attributes::new())
        .unwrap()
        .await
        .unwrap();
    assert!(matches!(outcome, CrashOutcome::Stored(_)));

    let stored = h.agent.offline_store().list_stored_crashes().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].retry_count(), 0);
    assert_eq!(transport.attempts(), 1);

    // First cycle after the initial delay, then one per minute of backoff
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(transport.attempts(), 2);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 3);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 4);
    let stored = h.agent.offline_store().list_stored_crashes().await.unwrap();
    assert_eq!(stored[0].retry_count(), 3);

    // Dropped by the following pass, never sent a fourth time
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 4);
    assert!(h.durable.is_empty());
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.attempts(), 4);

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_stored_crash_is_delivered_after_recovery() {
    let transport = Arc::new(InMemoryTransport::failing());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    h.agent
        .track_error(&timeout_error(), Some("at sync::run".into()), Attributes::new())
        .unwrap()
        .await
        .unwrap();
    let stored = h.agent.offline_store().list_stored_crashes().await.unwrap();
    let fingerprint = stored[0].payload().fingerprint().to_string();

    transport.set_failing(false);
    let report = h.agent.force_retry_all().await.unwrap();
    assert_eq!(report, RetryReport { success: 1, failure: 0, skipped: 0 });
    assert!(h.durable.is_empty());

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["fingerprint"], fingerprint.as_str());
    assert_eq!(sent[0]["attributes"]["crash.fingerprint"], fingerprint.as_str());
    assert_eq!(sent[0]["retry_info"]["retry_count"], 1);

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_crash_payload_carries_context() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    h.agent
        .add_breadcrumb("opened cart", BreadcrumbCategory::Navigation, BreadcrumbLevel::Info, None)
        .unwrap();
    h.agent
        .add_breadcrumb(
            "payment declined",
            BreadcrumbCategory::Network,
            BreadcrumbLevel::Warning,
            Some(Attributes::new().with("status", 402)),
        )
        .unwrap();

    let outcome = h
        .agent
        .track_error(
            &CapturedError::new("PaymentError", "card declined"),
            None,
            Attributes::new().with("checkout.step", "confirm"),
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(outcome, CrashOutcome::Sent);

    let crash = &transport.sent()[0];
    assert_eq!(crash["type"], "error");
    assert_eq!(crash["error"], "PaymentError: card declined");
    assert!(crash.get("stackTrace").is_none());
    assert_eq!(crash["attributes"]["service.name"], "integration");
    assert_eq!(crash["attributes"]["checkout.step"], "confirm");
    assert_eq!(crash["attributes"]["error.type"], "PaymentError");

    let crumbs: serde_json::Value =
        serde_json::from_str(crash["breadcrumbs"].as_str().unwrap()).unwrap();
    assert_eq!(crumbs[0]["message"], "payment declined");
    assert_eq!(crumbs[0]["data"]["status"], "402");
    assert_eq!(crumbs[1]["message"], "opened cart");

    // Crashes never go through the batcher
    assert_eq!(h.agent.queued_records(), 0);

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_recurring_crash_keeps_its_fingerprint() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    for line in [10, 57] {
        let stack = format!("at sync::run\nat worker.rs:{line}");
        h.agent
            .track_error(&timeout_error(), Some(stack), Attributes::new())
            .unwrap()
            .await
            .unwrap();
    }
    h.agent
        .track_error(&CapturedError::new("TimeoutError", "other"), Some("at sync::run".into()), Attributes::new())
        .unwrap()
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0]["fingerprint"], sent[1]["fingerprint"]);
    assert_ne!(sent[0]["fingerprint"], sent[2]["fingerprint"]);

    h.agent.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_clear_breadcrumbs() {
    let transport = Arc::new(InMemoryTransport::new());
    let h = start_agent(memory_config().build(), transport.clone()).await;

    h.agent
        .add_breadcrumb("x", BreadcrumbCategory::Custom, BreadcrumbLevel::Debug, None)
        .unwrap();
    assert_eq!(h.agent.breadcrumbs().len(), 1);
    h.agent.clear_breadcrumbs().unwrap();
    assert!(h.agent.breadcrumbs().is_empty());

    h.agent.dispose().await;
    assert!(matches!(
        h.agent.add_breadcrumb("y", BreadcrumbCategory::Custom, BreadcrumbLevel::Debug, None),
        Err(AgentError::NotInitialized)
    ));
}
