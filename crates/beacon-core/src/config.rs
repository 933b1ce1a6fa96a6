//! Configuration module for Beacon.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the Beacon agent.
///
/// Every section is optional in the YAML file; missing sections and fields
/// take their default values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub batching: BatchingConfig,
    pub breadcrumbs: BreadcrumbsConfig,
    pub offline: OfflineConfig,
    pub retry: RetryConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

/// Identity of the instrumented application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Service name attached to every record as `service.name`.
    pub service_name: String,
    /// Deployment environment attached as `deployment.environment`.
    pub environment: String,
    /// Static attributes merged into every record.
    pub attributes: BTreeMap<String, String>,
    /// Whether to route uncaught panics to the crash reporter.
    pub install_error_hooks: bool,
    /// Directory holding small persisted state (profile version).
    pub state_dir: PathBuf,
}

/// Event batching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Number of records that triggers an immediate batch send.
    pub batch_size: usize,
    /// Seconds a partial batch may wait before it is sent anyway.
    pub flush_timeout_secs: u64,
}

/// Breadcrumb trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreadcrumbsConfig {
    /// Maximum number of breadcrumbs kept.
    pub capacity: usize,
}

/// Backend used for the offline crash store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One JSON file per stored crash.
    #[default]
    Filesystem,
    /// A single SQLite database.
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StorageBackend::Filesystem => "filesystem",
            StorageBackend::Sqlite => "sqlite",
        };
        write!(f, "{}", s)
    }
}

/// Offline crash store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Storage backend: `filesystem` or `sqlite`.
    pub backend: StorageBackend,
    /// Directory for crash files, or for `offline.db` with the sqlite backend.
    pub directory: PathBuf,
    /// Maximum number of stored crashes before the oldest are evicted.
    pub max_entries: usize,
}

/// Crash retry scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Resend attempts before a stored crash is dropped.
    pub max_retries: u32,
    /// Seconds between starting the retry loop and its first cycle.
    pub initial_delay_secs: u64,
    /// Seconds until the next cycle after a cycle without failures.
    pub idle_interval_secs: u64,
    /// Base of the randomized exponential backoff, in seconds.
    pub base_delay_secs: u64,
    /// Upper bound of the backoff, in seconds.
    pub max_delay_secs: u64,
    /// Seconds until the next cycle after a cycle that could not run.
    pub error_delay_secs: u64,
    /// Milliseconds between consecutive sends within one cycle.
    pub send_spacing_ms: u64,
}

/// Telemetry endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// URL that receives every payload as a JSON POST.
    pub endpoint: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/beacon/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("beacon")
            .join("config.yaml")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("beacon")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service_name: "beacon-app".to_string(),
            environment: "production".to_string(),
            attributes: BTreeMap::new(),
            install_error_hooks: true,
            state_dir: default_data_dir().join("state"),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: 30,
            flush_timeout_secs: 300,
        }
    }
}

impl Default for BreadcrumbsConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            directory: default_data_dir().join("crashes"),
            max_entries: 100,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_secs: 5,
            idle_interval_secs: 300,
            base_delay_secs: 60,
            max_delay_secs: 3600,
            error_delay_secs: 120,
            send_spacing_ms: 100,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4318/v1/telemetry".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Duration accessors
// ---------------------------------------------------------------------------

impl BatchingConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.error_delay_secs)
    }

    pub fn send_spacing(&self) -> Duration {
        Duration::from_millis(self.send_spacing_ms)
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"batching.batch_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- agent ---
        if self.agent.service_name.trim().is_empty() {
            errors.push(ValidationError::new("agent.service_name", "must not be empty"));
        }

        // --- batching ---
        if self.batching.batch_size == 0 {
            errors.push(ValidationError::new("batching.batch_size", "must be greater than 0"));
        }
        if self.batching.flush_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "batching.flush_timeout_secs",
                "must be greater than 0",
            ));
        }

        // --- breadcrumbs ---
        if self.breadcrumbs.capacity == 0 {
            errors.push(ValidationError::new("breadcrumbs.capacity", "must be greater than 0"));
        }

        // --- offline ---
        if self.offline.max_entries == 0 {
            errors.push(ValidationError::new("offline.max_entries", "must be greater than 0"));
        }

        // --- retry ---
        if self.retry.max_retries == 0 {
            errors.push(ValidationError::new("retry.max_retries", "must be greater than 0"));
        }
        if self.retry.idle_interval_secs == 0 {
            errors.push(ValidationError::new(
                "retry.idle_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.retry.base_delay_secs == 0 {
            errors.push(ValidationError::new("retry.base_delay_secs", "must be greater than 0"));
        }
        if self.retry.base_delay_secs > self.retry.max_delay_secs {
            errors.push(ValidationError::new(
                "retry.base_delay_secs",
                format!(
                    "base_delay_secs ({}) must not exceed max_delay_secs ({})",
                    self.retry.base_delay_secs, self.retry.max_delay_secs
                ),
            ));
        }
        if self.retry.error_delay_secs == 0 {
            errors.push(ValidationError::new(
                "retry.error_delay_secs",
                "must be greater than 0",
            ));
        }

        // --- transport ---
        let endpoint = self.transport.endpoint.as_str();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(ValidationError::new(
                "transport.endpoint",
                format!("must be an http(s) URL, got '{endpoint}'"),
            ));
        }
        if self.transport.timeout_secs == 0 {
            errors.push(ValidationError::new("transport.timeout_secs", "must be greater than 0"));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use beacon_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .service_name("checkout")
///     .batch_size(50)
///     .transport_endpoint("https://telemetry.example.com/v1/ingest")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- agent ---

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.agent.service_name = name.into();
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.agent.environment = environment.into();
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.agent.attributes.insert(key.into(), value.into());
        self
    }

    pub fn install_error_hooks(mut self, install: bool) -> Self {
        self.config.agent.install_error_hooks = install;
        self
    }

    pub fn state_dir(mut self, dir: PathBuf) -> Self {
        self.config.agent.state_dir = dir;
        self
    }

    // --- batching ---

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batching.batch_size = size;
        self
    }

    pub fn flush_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.batching.flush_timeout_secs = seconds;
        self
    }

    // --- breadcrumbs ---

    pub fn breadcrumb_capacity(mut self, capacity: usize) -> Self {
        self.config.breadcrumbs.capacity = capacity;
        self
    }

    // --- offline ---

    pub fn offline_backend(mut self, backend: StorageBackend) -> Self {
        self.config.offline.backend = backend;
        self
    }

    pub fn offline_directory(mut self, dir: PathBuf) -> Self {
        self.config.offline.directory = dir;
        self
    }

    pub fn offline_max_entries(mut self, n: usize) -> Self {
        self.config.offline.max_entries = n;
        self
    }

    // --- retry ---

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.retry.max_retries = n;
        self
    }

    pub fn retry_initial_delay_secs(mut self, seconds: u64) -> Self {
        self.config.retry.initial_delay_secs = seconds;
        self
    }

    pub fn retry_idle_interval_secs(mut self, seconds: u64) -> Self {
        self.config.retry.idle_interval_secs = seconds;
        self
    }

    pub fn retry_base_delay_secs(mut self, seconds: u64) -> Self {
        self.config.retry.base_delay_secs = seconds;
        self
    }

    pub fn retry_max_delay_secs(mut self, seconds: u64) -> Self {
        self.config.retry.max_delay_secs = seconds;
        self
    }

    pub fn retry_error_delay_secs(mut self, seconds: u64) -> Self {
        self.config.retry.error_delay_secs = seconds;
        self
    }

    pub fn retry_send_spacing_ms(mut self, ms: u64) -> Self {
        self.config.retry.send_spacing_ms = ms;
        self
    }

    // --- transport ---

    pub fn transport_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.transport.endpoint = endpoint.into();
        self
    }

    pub fn transport_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.transport.api_key = Some(key.into());
        self
    }

    pub fn transport_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.transport.timeout_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
