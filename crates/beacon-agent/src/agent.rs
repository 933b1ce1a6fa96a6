//! Telemetry agent
//!
//! [`TelemetryAgent`] is the context object the host application constructs
//! once and clones wherever it instruments code. It wires the batcher, the
//! crash reporter, the offline store, the retry scheduler and the profile
//! version counter around the injected adapters.
//!
//! ## Lifecycle
//!
//! `new` -> `initialize` -> tracking calls -> `dispose`. Every tracking call
//! made outside the initialized window fails with
//! [`AgentError::NotInitialized`]. Inside it, tracking calls never fail for
//! delivery or storage reasons.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beacon_agent::TelemetryAgent;
//! use beacon_core::config::Config;
//! use beacon_core::domain::Attributes;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let agent = TelemetryAgent::from_config(Config::default()).await?;
//! agent.initialize().await?;
//! agent.track_event("checkout.completed", Attributes::new().with("items", 3))?;
//! agent.dispose().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use beacon_core::config::{Config, StorageBackend};
use beacon_core::domain::{
    AttributeEncodable, Attributes, Breadcrumb, BreadcrumbCategory, BreadcrumbLevel,
    CapturedError, ProfileMutation, ProfileVersion, TelemetryRecord, UserProfile,
};
use beacon_core::ports::{
    ErrorCallback, IContextProvider, IErrorHookInstaller, IKeyValueStore, IKeyedDurableStore,
    ITransport,
};
use beacon_store::{DatabasePool, FileDurableStore, FileKeyValueStore, SqliteDurableStore};
use beacon_transport::HttpTransport;

use crate::batcher::EventBatcher;
use crate::breadcrumbs::BreadcrumbTrail;
use crate::context::StaticContextProvider;
use crate::crash_reporter::{CrashOutcome, CrashReporter};
use crate::error::AgentError;
use crate::metrics::AgentMetrics;
use crate::offline_store::OfflineCrashStore;
use crate::panic_hook::PanicHookInstaller;
use crate::profile_version::ProfileVersionCounter;
use crate::retry::{RetryPhase, RetryPolicy, RetryReport, RetryScheduler};
use crate::schedule::TaskScheduler;

/// Attribute carrying the current user's id on every record
pub const USER_ID_ATTRIBUTE: &str = "user.id";

/// File name of the SQLite offline store inside `offline.directory`
pub const SQLITE_FILE_NAME: &str = "offline.db";

/// Adapters the agent runs on
pub struct AgentDeps {
    pub transport: Arc<dyn ITransport>,
    pub durable_store: Arc<dyn IKeyedDurableStore>,
    pub kv_store: Arc<dyn IKeyValueStore>,
    pub context: Arc<dyn IContextProvider>,
    pub error_hooks: Option<Arc<dyn IErrorHookInstaller>>,
}

/// Lifecycle state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Created,
    Ready,
    Disposed,
}

struct AgentInner {
    config: Config,
    state: Mutex<AgentState>,
    init_lock: tokio::sync::Mutex<()>,
    metrics: Arc<AgentMetrics>,
    context: Arc<dyn IContextProvider>,
    error_hooks: Option<Arc<dyn IErrorHookInstaller>>,
    breadcrumbs: Arc<BreadcrumbTrail>,
    batcher: EventBatcher,
    offline: Arc<OfflineCrashStore>,
    retry: RetryScheduler,
    crashes: CrashReporter,
    profile_version: ProfileVersionCounter,
    user: RwLock<Option<UserProfile>>,
}

/// Entry point for all instrumentation calls
#[derive(Clone)]
pub struct TelemetryAgent {
    inner: Arc<AgentInner>,
}

impl TelemetryAgent {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Builds an agent on the current tokio runtime
    pub fn new(config: Config, deps: AgentDeps) -> Result<Self, AgentError> {
        let handle = Handle::try_current().map_err(|e| AgentError::NoRuntime(e.to_string()))?;
        Self::with_handle(config, deps, handle)
    }

    /// Builds an agent that spawns its background work on `handle`
    pub fn with_handle(config: Config, deps: AgentDeps, handle: Handle) -> Result<Self, AgentError> {
        let errors = config.validate();
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AgentError::InvalidConfig(joined));
        }

        let scheduler = TaskScheduler::new(handle);
        let metrics = Arc::new(AgentMetrics::new().map_err(|e| AgentError::Setup(e.to_string()))?);

        let breadcrumbs = Arc::new(BreadcrumbTrail::new(config.breadcrumbs.capacity));
        let offline = Arc::new(
            OfflineCrashStore::new(deps.durable_store, config.offline.max_entries)
                .with_metrics(metrics.clone()),
        );
        let batcher = EventBatcher::new(
            &config.batching,
            deps.transport.clone(),
            scheduler.clone(),
            Some(metrics.clone()),
        );
        let retry = RetryScheduler::new(
            offline.clone(),
            deps.transport.clone(),
            RetryPolicy::from_config(&config.retry),
            scheduler.clone(),
            Some(metrics.clone()),
        );
        let crashes = CrashReporter::new(
            breadcrumbs.clone(),
            offline.clone(),
            deps.transport,
            scheduler.clone(),
            Some(metrics.clone()),
        );
        let profile_version = ProfileVersionCounter::new(deps.kv_store, scheduler);

        Ok(Self {
            inner: Arc::new(AgentInner {
                config,
                state: Mutex::new(AgentState::Created),
                init_lock: tokio::sync::Mutex::new(()),
                metrics,
                context: deps.context,
                error_hooks: deps.error_hooks,
                breadcrumbs,
                batcher,
                offline,
                retry,
                crashes,
                profile_version,
                user: RwLock::new(None),
            }),
        })
    }

    /// Builds an agent on the default adapters named by `config`
    ///
    /// HTTP transport, filesystem or SQLite offline store, file-backed
    /// profile version, and the panic hook when `agent.install_error_hooks`
    /// is set.
    pub async fn from_config(config: Config) -> Result<Self, AgentError> {
        let transport = HttpTransport::from_config(&config.transport)
            .map_err(|e| AgentError::Setup(e.to_string()))?;

        let durable_store: Arc<dyn IKeyedDurableStore> = match config.offline.backend {
            StorageBackend::Filesystem => {
                Arc::new(FileDurableStore::new(config.offline.directory.clone()))
            }
            StorageBackend::Sqlite => {
                let path = config.offline.directory.join(SQLITE_FILE_NAME);
                let pool = DatabasePool::new(&path)
                    .await
                    .map_err(|e| AgentError::Setup(e.to_string()))?;
                Arc::new(SqliteDurableStore::new(pool.pool().clone()))
            }
        };

        let error_hooks: Option<Arc<dyn IErrorHookInstaller>> = if config.agent.install_error_hooks
        {
            Some(Arc::new(PanicHookInstaller::new()))
        } else {
            None
        };

        let deps = AgentDeps {
            transport: Arc::new(transport),
            durable_store,
            kv_store: Arc::new(FileKeyValueStore::new(config.agent.state_dir.clone())),
            context: Arc::new(StaticContextProvider::from_config(&config.agent)),
            error_hooks,
        };
        Self::new(config, deps)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Loads persisted state, starts the retry loop and installs error hooks
    ///
    /// Calling it again once ready does nothing.
    pub async fn initialize(&self) -> Result<(), AgentError> {
        let _init = self.inner.init_lock.lock().await;
        match self.state() {
            AgentState::Ready => return Ok(()),
            AgentState::Disposed => {
                return Err(AgentError::Setup("agent has been disposed".to_string()))
            }
            AgentState::Created => {}
        }

        let version = self.inner.profile_version.load().await;
        self.inner.retry.start_retry_loop();

        if let Some(hooks) = &self.inner.error_hooks {
            if let Err(e) = hooks.install(self.error_callback()) {
                warn!(error = %e, "Failed to install error hooks");
            }
        }

        *self.lock_state() = AgentState::Ready;
        info!(
            service = %self.inner.config.agent.service_name,
            profile_version = %version,
            "Telemetry agent initialized"
        );
        Ok(())
    }

    /// Flushes queued records and stops background work
    ///
    /// In-flight sends are not awaited. Tracking calls fail afterwards.
    pub async fn dispose(&self) {
        {
            let mut state = self.lock_state();
            if *state != AgentState::Ready {
                *state = AgentState::Disposed;
                return;
            }
            *state = AgentState::Disposed;
        }

        let flushed = self.inner.batcher.flush();
        self.inner.retry.stop_retry_loop();
        if let Some(hooks) = &self.inner.error_hooks {
            hooks.uninstall();
        }
        self.inner.profile_version.flush().await;

        info!(flushed, "Telemetry agent disposed");
    }

    pub fn state(&self) -> AgentState {
        *self.lock_state()
    }

    fn ensure_ready(&self) -> Result<(), AgentError> {
        match self.state() {
            AgentState::Ready => Ok(()),
            _ => Err(AgentError::NotInitialized),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AgentState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Callback handed to the error hook installer
    ///
    /// Holds the agent weakly so an installed hook does not keep it alive.
    fn error_callback(&self) -> ErrorCallback {
        let weak = Arc::downgrade(&self.inner);
        Arc::new(move |error, stack| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let agent = TelemetryAgent { inner };
            if let Err(e) = agent.track_error(&error, stack, Attributes::new()) {
                debug!(error = %e, "Uncaught error not reported");
            }
        })
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Queues an event for the next batch
    pub fn track_event(&self, name: &str, attributes: Attributes) -> Result<(), AgentError> {
        self.ensure_ready()?;
        self.enqueue(TelemetryRecord::event(name, attributes));
        Ok(())
    }

    /// Queues an event whose attributes come from an encodable value
    pub fn track_event_with(
        &self,
        name: &str,
        value: &impl AttributeEncodable,
    ) -> Result<(), AgentError> {
        self.track_event(name, value.to_attributes())
    }

    /// Queues an event with attributes from a flat JSON object
    ///
    /// Nested values are rejected with [`AgentError::InvalidAttributes`].
    pub fn track_event_json(&self, name: &str, attributes: &Value) -> Result<(), AgentError> {
        self.ensure_ready()?;
        let attributes = Attributes::try_from_json(attributes)?;
        self.enqueue(TelemetryRecord::event(name, attributes));
        Ok(())
    }

    /// Queues a metric sample for the next batch
    pub fn track_metric(
        &self,
        name: &str,
        value: f64,
        attributes: Attributes,
    ) -> Result<(), AgentError> {
        self.ensure_ready()?;
        self.enqueue(TelemetryRecord::metric(name, value, attributes));
        Ok(())
    }

    /// Reports an error immediately, bypassing the batcher
    ///
    /// The handle resolves once the crash has been delivered or stored; it
    /// may be dropped.
    pub fn track_error(
        &self,
        error: &CapturedError,
        stack: Option<String>,
        attributes: Attributes,
    ) -> Result<JoinHandle<CrashOutcome>, AgentError> {
        self.ensure_ready()?;
        let attributes = attributes.layered_over(&self.common_attributes());
        Ok(self.inner.crashes.track_error(error, stack, attributes))
    }

    /// Reports a Rust error value, with a backtrace when one is enabled
    pub fn track_std_error<E: std::error::Error>(
        &self,
        error: &E,
        attributes: Attributes,
    ) -> Result<JoinHandle<CrashOutcome>, AgentError> {
        let backtrace = std::backtrace::Backtrace::capture();
        let stack = match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        self.track_error(&CapturedError::from_error(error), stack, attributes)
    }

    pub fn add_breadcrumb(
        &self,
        message: &str,
        category: BreadcrumbCategory,
        level: BreadcrumbLevel,
        data: Option<Attributes>,
    ) -> Result<(), AgentError> {
        self.ensure_ready()?;
        self.inner.breadcrumbs.add(message, category, level, data);
        Ok(())
    }

    pub fn clear_breadcrumbs(&self) -> Result<(), AgentError> {
        self.ensure_ready()?;
        self.inner.breadcrumbs.clear();
        Ok(())
    }

    /// Sends whatever is queued without waiting for the batch to fill
    pub fn flush(&self) -> Result<usize, AgentError> {
        self.ensure_ready()?;
        Ok(self.inner.batcher.flush())
    }

    /// Drains the offline store now
    pub async fn force_retry_all(&self) -> Result<RetryReport, AgentError> {
        self.ensure_ready()?;
        Ok(self.inner.retry.force_retry_all().await?)
    }

    // ========================================================================
    // User profile
    // ========================================================================

    /// Sets the current user and emits the profile events
    pub fn set_user_profile(&self, profile: UserProfile) -> Result<ProfileVersion, AgentError> {
        self.ensure_ready()?;
        let version = self.inner.profile_version.next();
        *self.write_user() = Some(profile.clone());
        self.emit_profile_events(ProfileMutation::Set(profile), version);
        debug!(profile_version = %version, "User profile set");
        Ok(version)
    }

    /// Forgets the current user and emits the profile events
    pub fn clear_user_profile(&self) -> Result<ProfileVersion, AgentError> {
        self.ensure_ready()?;
        let version = self.inner.profile_version.next();
        *self.write_user() = None;
        self.emit_profile_events(ProfileMutation::Cleared, version);
        debug!(profile_version = %version, "User profile cleared");
        Ok(version)
    }

    fn emit_profile_events(&self, mutation: ProfileMutation, version: ProfileVersion) {
        let events = mutation.events(version, Utc::now());
        self.enqueue(events.updated);
        self.enqueue(events.companion);
    }

    fn write_user(&self) -> std::sync::RwLockWriteGuard<'_, Option<UserProfile>> {
        self.inner.user.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Arc<AgentMetrics> {
        &self.inner.metrics
    }

    pub fn offline_store(&self) -> &Arc<OfflineCrashStore> {
        &self.inner.offline
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner
            .user
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn profile_version(&self) -> ProfileVersion {
        self.inner.profile_version.current()
    }

    /// Current breadcrumbs, newest first
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.inner.breadcrumbs.snapshot()
    }

    pub fn retry_phase(&self) -> RetryPhase {
        self.inner.retry.phase()
    }

    pub fn queued_records(&self) -> usize {
        self.inner.batcher.queue_len()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Context attributes plus the current user id
    fn common_attributes(&self) -> Attributes {
        let mut attributes = self.inner.context.attributes();
        if let Some(user) = self.current_user() {
            attributes.insert(USER_ID_ATTRIBUTE, user.id.as_str());
        }
        attributes
    }

    fn enqueue(&self, record: TelemetryRecord) {
        let record = record.with_base_attributes(&self.common_attributes());
        self.inner.batcher.enqueue(record);
    }
}

impl std::fmt::Debug for TelemetryAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryAgent")
            .field("state", &self.state())
            .field("service", &self.inner.config.agent.service_name)
            .finish_non_exhaustive()
    }
}
