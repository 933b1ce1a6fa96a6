//! Beacon Agent - Telemetry reliability engine
//!
//! Turns instrumentation calls into ordered, durable network deliveries:
//!
//! - [`EventBatcher`] - size- and time-bounded batching of events and metrics
//! - [`CrashReporter`] - immediate crash delivery with an offline fallback
//! - [`BreadcrumbTrail`] - bounded context attached to crash reports
//! - [`OfflineCrashStore`] - capacity-bounded durable queue of undelivered crashes
//! - [`RetryScheduler`] - backoff-driven drain of the offline store
//! - [`ProfileVersionCounter`] - persisted monotonic profile version
//!
//! [`TelemetryAgent`] wires them together around the ports defined in
//! `beacon-core`.

pub mod agent;
pub mod batcher;
pub mod breadcrumbs;
pub mod context;
pub mod crash_reporter;
pub mod error;
pub mod metrics;
pub mod offline_store;
pub mod panic_hook;
pub mod profile_version;
pub mod retry;
pub mod schedule;

pub use agent::{AgentDeps, AgentState, TelemetryAgent};
pub use batcher::EventBatcher;
pub use breadcrumbs::BreadcrumbTrail;
pub use context::StaticContextProvider;
pub use crash_reporter::{CrashOutcome, CrashReporter};
pub use error::{AgentError, OfflineStoreError};
pub use metrics::AgentMetrics;
pub use offline_store::OfflineCrashStore;
pub use panic_hook::PanicHookInstaller;
pub use profile_version::ProfileVersionCounter;
pub use retry::{RetryPhase, RetryPolicy, RetryReport, RetryScheduler};
pub use schedule::{CancelToken, TaskScheduler};
