//! Prometheus metrics for the telemetry agent
//!
//! Typed counters and gauges for queue depth, batch delivery, crash outcomes,
//! the offline store and retry passes. Each agent owns its own registry.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metrics registry holding every agent metric.
pub struct AgentMetrics {
    registry: Registry,
    /// Gauge: records waiting in the batch queue
    pub queue_depth: IntGauge,
    /// Counter: records accepted by kind (event, metric)
    pub records_total: IntCounterVec,
    /// Counter: batch sends by status (sent, failed)
    pub batches_total: IntCounterVec,
    /// Counter: reported crashes by outcome (sent, stored, lost)
    pub crashes_total: IntCounterVec,
    /// Gauge: entries in the offline crash store at the last write or listing
    pub offline_entries: IntGauge,
    /// Counter: stored crashes evicted to respect the capacity limit
    pub offline_evictions_total: IntCounter,
    /// Counter: stored crashes removed because they could not be decoded
    pub offline_corrupt_total: IntCounter,
    /// Counter: per-entry retry outcomes (success, failure, skipped)
    pub retry_entries_total: IntCounterVec,
    /// Counter: retry passes by result (completed, empty, error)
    pub retry_cycles_total: IntCounterVec,
}

impl AgentMetrics {
    /// Creates a new `AgentMetrics` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("beacon".to_string()), None)?;

        let queue_depth = IntGauge::new("queue_depth", "Records waiting in the batch queue")?;
        registry.register(Box::new(queue_depth.clone()))?;

        let records_total = IntCounterVec::new(
            Opts::new("records_total", "Telemetry records accepted"),
            &["kind"],
        )?;
        registry.register(Box::new(records_total.clone()))?;

        let batches_total = IntCounterVec::new(
            Opts::new("batches_total", "Batch sends by status"),
            &["status"],
        )?;
        registry.register(Box::new(batches_total.clone()))?;

        let crashes_total = IntCounterVec::new(
            Opts::new("crashes_total", "Reported crashes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(crashes_total.clone()))?;

        let offline_entries = IntGauge::new("offline_entries", "Entries in the offline crash store")?;
        registry.register(Box::new(offline_entries.clone()))?;

        let offline_evictions_total = IntCounter::new(
            "offline_evictions_total",
            "Stored crashes evicted by the capacity limit",
        )?;
        registry.register(Box::new(offline_evictions_total.clone()))?;

        let offline_corrupt_total = IntCounter::new(
            "offline_corrupt_total",
            "Stored crashes removed as corrupt",
        )?;
        registry.register(Box::new(offline_corrupt_total.clone()))?;

        let retry_entries_total = IntCounterVec::new(
            Opts::new("retry_entries_total", "Stored crash retry outcomes"),
            &["outcome"],
        )?;
        registry.register(Box::new(retry_entries_total.clone()))?;

        let retry_cycles_total = IntCounterVec::new(
            Opts::new("retry_cycles_total", "Retry passes by result"),
            &["result"],
        )?;
        registry.register(Box::new(retry_cycles_total.clone()))?;

        Ok(Self {
            registry,
            queue_depth,
            records_total,
            batches_total,
            crashes_total,
            offline_entries,
            offline_evictions_total,
            offline_corrupt_total,
            retry_entries_total,
            retry_cycles_total,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    pub fn record_accepted(&self, kind: &str) {
        self.records_total.with_label_values(&[kind]).inc();
    }

    pub fn record_batch(&self, status: &str) {
        self.batches_total.with_label_values(&[status]).inc();
    }

    pub fn record_crash(&self, outcome: &str) {
        self.crashes_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_retry_entry(&self, outcome: &str) {
        self.retry_entries_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_retry_cycle(&self, result: &str) {
        self.retry_cycles_total.with_label_values(&[result]).inc();
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(depth as i64);
    }

    pub fn set_offline_entries(&self, count: usize) {
        self.offline_entries.set(count as i64);
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for AgentMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentMetrics")
            .field("queue_depth", &self.queue_depth.get())
            .field("offline_entries", &self.offline_entries.get())
            .finish_non_exhaustive()
    }
}
