//! Retry scheduler
//!
//! Drains the offline crash store on a timer. Each cycle resends every
//! stored crash once, oldest first, and then picks the next delay:
//!
//! - no failures (or nothing stored): the idle interval
//! - at least one failure: randomized exponential backoff,
//!   `min(base * 2^k, max)` with `k` drawn from `0..=2`
//! - the cycle itself failed (store unreadable): the error delay
//!
//! State machine: `Idle -> Scheduled -> Retrying -> Scheduled ...`, and
//! `stop_retry_loop` returns to `Idle` from any state. A timer that fires
//! while a cycle is still running is a no-op.
//!
//! Scheduled cycles and [`RetryScheduler::force_retry_all`] share a drain
//! lock, so the same entry is never processed by two passes at once.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use beacon_core::config::RetryConfig;
use beacon_core::domain::StoredCrash;
use beacon_core::ports::ITransport;

use crate::error::OfflineStoreError;
use crate::metrics::AgentMetrics;
use crate::offline_store::OfflineCrashStore;
use crate::schedule::{CancelToken, TaskScheduler};

// ============================================================================
// Policy
// ============================================================================

/// Delays and limits governing the retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub idle_interval: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub error_delay: Duration,
    pub send_spacing: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay(),
            idle_interval: config.idle_interval(),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            error_delay: config.error_delay(),
            send_spacing: config.send_spacing(),
        }
    }

    /// Next delay after a cycle with failures
    pub fn backoff_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let exponent: u32 = rng.gen_range(0..=2);
        self.base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Outcome counts of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    /// Entries resent and removed
    pub success: usize,
    /// Entries whose resend failed
    pub failure: usize,
    /// Exhausted entries removed without a send
    pub skipped: usize,
}

impl RetryReport {
    pub fn is_empty(&self) -> bool {
        self.success + self.failure + self.skipped == 0
    }
}

/// Where the retry loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Idle,
    Scheduled,
    Retrying,
}

// ============================================================================
// Scheduler
// ============================================================================

struct RetryInner {
    store: Arc<OfflineCrashStore>,
    transport: Arc<dyn ITransport>,
    policy: RetryPolicy,
    scheduler: TaskScheduler,
    metrics: Option<Arc<AgentMetrics>>,
    running: AtomicBool,
    is_retrying: AtomicBool,
    timer: Mutex<Option<CancelToken>>,
    next_delay: Mutex<Option<Duration>>,
    drain_lock: tokio::sync::Mutex<()>,
}

/// Timer-driven drain of the offline crash store
#[derive(Clone)]
pub struct RetryScheduler {
    inner: Arc<RetryInner>,
}

impl RetryScheduler {
    pub fn new(
        store: Arc<OfflineCrashStore>,
        transport: Arc<dyn ITransport>,
        policy: RetryPolicy,
        scheduler: TaskScheduler,
        metrics: Option<Arc<AgentMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(RetryInner {
                store,
                transport,
                policy,
                scheduler,
                metrics,
                running: AtomicBool::new(false),
                is_retrying: AtomicBool::new(false),
                timer: Mutex::new(None),
                next_delay: Mutex::new(None),
                drain_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Schedules the first cycle after the initial delay
    ///
    /// Calling it while the loop is already running does nothing.
    pub fn start_retry_loop(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            initial_delay_secs = self.inner.policy.initial_delay.as_secs(),
            "Starting crash retry loop"
        );
        RetryInner::schedule_next(&self.inner, self.inner.policy.initial_delay);
    }

    /// Cancels the pending cycle; a cycle already running completes
    pub fn stop_retry_loop(&self) {
        if self.inner.running.swap(false, Ordering::SeqCst) {
            info!("Stopping crash retry loop");
        }
        if let Some(token) = lock(&self.inner.timer).take() {
            token.cancel();
        }
    }

    pub fn phase(&self) -> RetryPhase {
        if self.inner.is_retrying.load(Ordering::SeqCst) {
            RetryPhase::Retrying
        } else if self.inner.running.load(Ordering::SeqCst) {
            RetryPhase::Scheduled
        } else {
            RetryPhase::Idle
        }
    }

    /// Delay used for the most recently scheduled cycle
    pub fn next_delay(&self) -> Option<Duration> {
        *lock(&self.inner.next_delay)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    /// Drains the whole store now, outside the schedule
    ///
    /// Waits for a scheduled cycle in progress to finish first. The timer is
    /// left untouched.
    pub async fn force_retry_all(&self) -> Result<RetryReport, OfflineStoreError> {
        let _drain = self.inner.drain_lock.lock().await;
        let report = self.inner.drain().await?;
        info!(
            success = report.success,
            failure = report.failure,
            skipped = report.skipped,
            "Forced retry pass finished"
        );
        Ok(report)
    }
}

impl RetryInner {
    fn schedule_next(this: &Arc<Self>, delay: Duration) {
        if !this.running.load(Ordering::SeqCst) {
            return;
        }

        let weak: Weak<RetryInner> = Arc::downgrade(this);
        let token = this.scheduler.schedule(delay, move || async move {
            if let Some(inner) = weak.upgrade() {
                RetryInner::run_scheduled_cycle(inner).await;
            }
        });

        if let Some(previous) = lock(&this.timer).replace(token) {
            previous.cancel();
        }
        *lock(&this.next_delay) = Some(delay);
        debug!(delay_secs = delay.as_secs(), "Next retry cycle scheduled");
    }

    // Boxed: every cycle schedules the one after it
    fn run_scheduled_cycle(this: Arc<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let Some(retrying) = RetryingGuard::acquire(&this.is_retrying) else {
                debug!("Retry cycle already running, skipping timer fire");
                return;
            };

            let result = {
                let _drain = this.drain_lock.lock().await;
                this.drain().await
            };

            let (delay, outcome) = match result {
                Ok(report) if report.is_empty() => (this.policy.idle_interval, "empty"),
                Ok(report) if report.failure == 0 => (this.policy.idle_interval, "completed"),
                Ok(report) => {
                    let delay = this.policy.backoff_delay(&mut rand::thread_rng());
                    debug!(
                        failure = report.failure,
                        backoff_secs = delay.as_secs(),
                        "Retry cycle had failures, backing off"
                    );
                    (delay, "completed")
                }
                Err(e) => {
                    error!(error = %e, "Retry cycle failed");
                    (this.policy.error_delay, "error")
                }
            };

            if let Some(metrics) = &this.metrics {
                metrics.record_retry_cycle(outcome);
            }
            drop(retrying);
            RetryInner::schedule_next(&this, delay);
        })
    }

    /// One pass over every stored crash, oldest first
    async fn drain(&self) -> Result<RetryReport, OfflineStoreError> {
        let mut crashes = self.store.list_stored_crashes().await?;
        let mut report = RetryReport::default();
        if crashes.is_empty() {
            debug!("No stored crashes to retry");
            return Ok(report);
        }

        crashes.reverse();
        debug!(count = crashes.len(), "Retrying stored crashes");

        let mut sent_any = false;
        for crash in crashes {
            if crash.is_exhausted(self.policy.max_retries) {
                self.discard(&crash).await;
                report.skipped += 1;
                self.record_entry("skipped");
                continue;
            }

            if sent_any {
                tokio::time::sleep(self.policy.send_spacing).await;
            }
            sent_any = true;

            if self.resend(&crash).await {
                report.success += 1;
                self.record_entry("success");
            } else {
                report.failure += 1;
                self.record_entry("failure");
            }
        }

        Ok(report)
    }

    /// Resends one crash; returns whether the endpoint accepted it
    async fn resend(&self, crash: &StoredCrash) -> bool {
        let attempt = crash.retry_count() + 1;
        let wire = crash
            .payload()
            .retry_wire(attempt, self.policy.max_retries, Utc::now());

        match self.transport.send(&wire).await {
            Ok(()) => {
                info!(storage_id = %crash.id(), retry_count = attempt, "Stored crash delivered");
                if let Err(e) = self.store.delete_crash(crash.id()).await {
                    warn!(storage_id = %crash.id(), error = %e, "Failed to remove delivered crash");
                }
                true
            }
            Err(e) => {
                warn!(
                    storage_id = %crash.id(),
                    retry_count = attempt,
                    error = %e,
                    "Stored crash resend failed"
                );
                // An entry that reaches the limit is dropped by the next pass
                if let Err(e) = self.store.update_retry_count(crash.id(), attempt).await {
                    warn!(storage_id = %crash.id(), error = %e, "Failed to update retry count");
                }
                false
            }
        }
    }

    async fn discard(&self, crash: &StoredCrash) {
        warn!(
            storage_id = %crash.id(),
            fingerprint = %crash.payload().fingerprint(),
            retry_count = crash.retry_count(),
            "Dropping stored crash, retries exhausted"
        );
        if let Err(e) = self.store.delete_crash(crash.id()).await {
            warn!(storage_id = %crash.id(), error = %e, "Failed to remove stored crash");
        }
    }

    fn record_entry(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_retry_entry(outcome);
        }
    }
}

/// Holds the reentrancy flag for the duration of a scheduled cycle
struct RetryingGuard<'a>(&'a AtomicBool);

impl<'a> RetryingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RetryingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("phase", &self.phase())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}
