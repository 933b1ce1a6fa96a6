//! Event batcher
//!
//! Accumulates events and metrics and ships them as [`Batch`]es, either when
//! the queue reaches the batch size or when the flush timer fires.
//!
//! ## Ordering
//!
//! Batches are handed to a single dispatcher task over an unbounded channel.
//! A batch is queued on the channel before the queue lock is released, so
//! batches reach the transport in the order they were cut. Queuing on an
//! unbounded channel never blocks, and producers never wait on a send.
//!
//! ## Delivery
//!
//! A failed batch send is logged and counted, never retried.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use beacon_core::config::BatchingConfig;
use beacon_core::domain::{Batch, TelemetryRecord};
use beacon_core::ports::ITransport;

use crate::metrics::AgentMetrics;
use crate::schedule::{CancelToken, TaskScheduler};

#[derive(Default)]
struct QueueState {
    queue: Vec<TelemetryRecord>,
    /// Pending flush timer, tagged with the generation that armed it
    timer: Option<(u64, CancelToken)>,
    generation: u64,
}

impl QueueState {
    fn cancel_timer(&mut self) {
        if let Some((_, token)) = self.timer.take() {
            token.cancel();
        }
    }
}

struct BatcherInner {
    batch_size: usize,
    flush_timeout: Duration,
    scheduler: TaskScheduler,
    state: Mutex<QueueState>,
    outbox: mpsc::UnboundedSender<Batch>,
    metrics: Option<Arc<AgentMetrics>>,
}

/// Size- and time-bounded batcher for ordinary telemetry
#[derive(Clone)]
pub struct EventBatcher {
    inner: Arc<BatcherInner>,
}

impl EventBatcher {
    /// Creates a batcher and starts its dispatcher task on `scheduler`
    pub fn new(
        config: &BatchingConfig,
        transport: Arc<dyn ITransport>,
        scheduler: TaskScheduler,
        metrics: Option<Arc<AgentMetrics>>,
    ) -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        scheduler.spawn(dispatch_loop(inbox, transport, metrics.clone()));

        Self {
            inner: Arc::new(BatcherInner {
                batch_size: config.batch_size.max(1),
                flush_timeout: config.flush_timeout(),
                scheduler,
                state: Mutex::new(QueueState::default()),
                outbox,
                metrics,
            }),
        }
    }

    /// Queues `record`, cutting a batch when the queue is full
    pub fn enqueue(&self, record: TelemetryRecord) {
        let inner = &self.inner;
        if let Some(metrics) = &inner.metrics {
            metrics.record_accepted(&record.kind().to_string());
        }

        let mut state = inner.lock();
        state.queue.push(record);

        if state.queue.len() >= inner.batch_size {
            state.cancel_timer();
            let records = std::mem::take(&mut state.queue);
            inner.report_depth(0);
            inner.dispatch(records, "size");
        } else {
            self.arm_timer(&mut state);
            inner.report_depth(state.queue.len());
        }
    }

    /// Sends whatever is queued right now; returns the number of records sent
    pub fn flush(&self) -> usize {
        let mut state = self.inner.lock();
        state.cancel_timer();
        let records = std::mem::take(&mut state.queue);

        let count = records.len();
        self.inner.report_depth(0);
        if count > 0 {
            self.inner.dispatch(records, "manual");
        }
        count
    }

    /// Records waiting for the next batch
    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    fn arm_timer(&self, state: &mut QueueState) {
        state.cancel_timer();
        state.generation = state.generation.wrapping_add(1);
        let generation = state.generation;

        let weak: Weak<BatcherInner> = Arc::downgrade(&self.inner);
        let token = self
            .inner
            .scheduler
            .schedule(self.inner.flush_timeout, move || async move {
                if let Some(inner) = weak.upgrade() {
                    inner.flush_on_timeout(generation);
                }
            });
        state.timer = Some((generation, token));
    }
}

impl BatcherInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush_on_timeout(&self, generation: u64) {
        let mut state = self.lock();
        match state.timer {
            Some((armed, _)) if armed == generation => state.timer = None,
            _ => return,
        }
        let records = std::mem::take(&mut state.queue);

        if !records.is_empty() {
            self.report_depth(0);
            self.dispatch(records, "timeout");
        }
    }

    /// Called with the queue lock held
    fn dispatch(&self, records: Vec<TelemetryRecord>, trigger: &'static str) {
        let batch = Batch::new(records);
        debug!(batch_size = batch.size(), trigger, "Batch ready");
        if self.outbox.send(batch).is_err() {
            warn!(trigger, "Batch dispatcher has stopped, dropping batch");
            if let Some(metrics) = &self.metrics {
                metrics.record_batch("dropped");
            }
        }
    }

    fn report_depth(&self, depth: usize) {
        debug!(queue_depth = depth, "Batch queue depth");
        if let Some(metrics) = &self.metrics {
            metrics.set_queue_depth(depth);
        }
    }
}

async fn dispatch_loop(
    mut inbox: mpsc::UnboundedReceiver<Batch>,
    transport: Arc<dyn ITransport>,
    metrics: Option<Arc<AgentMetrics>>,
) {
    while let Some(batch) = inbox.recv().await {
        let size = batch.size();
        match transport.send(&batch.to_wire()).await {
            Ok(()) => {
                debug!(batch_size = size, "Batch sent");
                if let Some(metrics) = &metrics {
                    metrics.record_batch("sent");
                }
            }
            Err(e) => {
                warn!(batch_size = size, error = %e, "Batch send failed, dropping batch");
                if let Some(metrics) = &metrics {
                    metrics.record_batch("failed");
                }
            }
        }
    }
    debug!("Batch dispatcher stopped");
}

impl std::fmt::Debug for EventBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBatcher")
            .field("batch_size", &self.inner.batch_size)
            .field("flush_timeout", &self.inner.flush_timeout)
            .finish_non_exhaustive()
    }
}
