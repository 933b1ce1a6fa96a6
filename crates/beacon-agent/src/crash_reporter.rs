//! Crash reporter
//!
//! Builds a [`CrashPayload`] synchronously on the caller's thread (so the
//! breadcrumb snapshot reflects the moment of the error), then sends it once
//! in the background. A failed send hands the payload to the offline store.
//! Nothing here ever returns an error to the caller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use beacon_core::domain::{Attributes, CapturedError, CrashPayload, StorageId};
use beacon_core::ports::ITransport;

use crate::breadcrumbs::BreadcrumbTrail;
use crate::metrics::AgentMetrics;
use crate::offline_store::OfflineCrashStore;
use crate::schedule::TaskScheduler;

/// What happened to a reported crash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashOutcome {
    /// Delivered on the first attempt
    Sent,
    /// Delivery failed; the crash waits in the offline store
    Stored(StorageId),
    /// Delivery and storage both failed
    Lost,
}

impl CrashOutcome {
    fn label(&self) -> &'static str {
        match self {
            CrashOutcome::Sent => "sent",
            CrashOutcome::Stored(_) => "stored",
            CrashOutcome::Lost => "lost",
        }
    }
}

pub struct CrashReporter {
    breadcrumbs: Arc<BreadcrumbTrail>,
    store: Arc<OfflineCrashStore>,
    transport: Arc<dyn ITransport>,
    scheduler: TaskScheduler,
    metrics: Option<Arc<AgentMetrics>>,
}

impl CrashReporter {
    pub fn new(
        breadcrumbs: Arc<BreadcrumbTrail>,
        store: Arc<OfflineCrashStore>,
        transport: Arc<dyn ITransport>,
        scheduler: TaskScheduler,
        metrics: Option<Arc<AgentMetrics>>,
    ) -> Self {
        Self {
            breadcrumbs,
            store,
            transport,
            scheduler,
            metrics,
        }
    }

    /// Builds the payload for `error` without sending it
    pub fn build_payload(
        &self,
        error: &CapturedError,
        stack: Option<String>,
        attributes: Attributes,
    ) -> CrashPayload {
        CrashPayload::build(error, stack, &self.breadcrumbs.snapshot(), attributes)
    }

    /// Reports `error`; the returned handle resolves once the crash is sent
    /// or stored
    pub fn track_error(
        &self,
        error: &CapturedError,
        stack: Option<String>,
        attributes: Attributes,
    ) -> JoinHandle<CrashOutcome> {
        let payload = self.build_payload(error, stack, attributes);
        info!(
            error_type = error.type_name(),
            fingerprint = %payload.fingerprint(),
            "Reporting crash"
        );

        let transport = self.transport.clone();
        let store = self.store.clone();
        let metrics = self.metrics.clone();
        self.scheduler.spawn(async move {
            let outcome = deliver(&payload, transport.as_ref(), &store).await;
            if let Some(metrics) = &metrics {
                metrics.record_crash(outcome.label());
            }
            outcome
        })
    }
}

async fn deliver(
    payload: &CrashPayload,
    transport: &dyn ITransport,
    store: &OfflineCrashStore,
) -> CrashOutcome {
    let send_error = match transport.send(&payload.to_wire()).await {
        Ok(()) => {
            info!(fingerprint = %payload.fingerprint(), "Crash delivered");
            return CrashOutcome::Sent;
        }
        Err(e) => e,
    };

    warn!(
        fingerprint = %payload.fingerprint(),
        error = %send_error,
        "Crash delivery failed, storing for retry"
    );
    match store.store_crash(payload).await {
        Ok(id) => CrashOutcome::Stored(id),
        Err(e) => {
            error!(
                fingerprint = %payload.fingerprint(),
                error = %e,
                "Could not store crash, it is lost"
            );
            CrashOutcome::Lost
        }
    }
}

impl std::fmt::Debug for CrashReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashReporter").finish_non_exhaustive()
    }
}
