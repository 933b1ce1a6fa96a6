//! Command output
//!
//! Every command prints either human-readable text or exactly one JSON
//! document on stdout. Problems always go to stderr.

use serde_json::{json, Value};

use beacon_agent::RetryReport;
use beacon_core::domain::StoredCrash;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Writes command results in the selected [`OutputFormat`]
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// The command's JSON document; ignored in human mode
    pub fn json(&self, value: &Value) {
        if self.is_json() {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        }
    }

    /// Headline of a successful human-mode result
    pub fn success(&self, message: &str) {
        if !self.is_json() {
            println!("\u{2713} {}", message);
        }
    }

    /// Indented detail line; human mode only
    pub fn line(&self, message: &str) {
        if !self.is_json() {
            println!("  {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.is_json() {
            eprintln!("{}", json!({"success": false, "error": message}));
        } else {
            eprintln!("\u{2717} Error: {}", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.is_json() {
            eprintln!("{}", json!({"level": "warning", "message": message}));
        } else {
            eprintln!("\u{26a0} Warning: {}", message);
        }
    }
}

// ============================================================================
// Stored crash rendering
// ============================================================================

const ID_WIDTH: usize = 40;
const STORED_WIDTH: usize = 20;
const RETRIES_WIDTH: usize = 8;
const ERROR_WIDTH: usize = 36;

/// Header and separator of the crash listing table
pub fn crash_table_header() -> [String; 2] {
    let header = format!(
        "{:<id$} {:<stored$} {:<retries$} ERROR",
        "ID",
        "STORED",
        "RETRIES",
        id = ID_WIDTH,
        stored = STORED_WIDTH,
        retries = RETRIES_WIDTH
    );
    let width = ID_WIDTH + STORED_WIDTH + RETRIES_WIDTH + ERROR_WIDTH + 3;
    [header, "-".repeat(width)]
}

/// One row of the crash listing table
pub fn crash_table_row(crash: &StoredCrash) -> String {
    format!(
        "{:<id$} {:<stored$} {:<retries$} {}",
        crash.id().as_str(),
        crash.stored_at().format("%Y-%m-%d %H:%M:%S").to_string(),
        crash.retry_count(),
        truncate(crash.payload().error(), ERROR_WIDTH),
        id = ID_WIDTH,
        stored = STORED_WIDTH,
        retries = RETRIES_WIDTH
    )
}

/// JSON summary of a stored crash, without the payload body
pub fn crash_summary(crash: &StoredCrash) -> Value {
    json!({
        "id": crash.id().as_str(),
        "stored_at": crash.stored_at().to_rfc3339(),
        "retry_count": crash.retry_count(),
        "last_retry_at": crash.last_retry_at().map(|at| at.to_rfc3339()),
        "error": crash.payload().error(),
        "fingerprint": crash.payload().fingerprint().to_string(),
    })
}

/// One-line human summary of a drain pass
pub fn retry_report_line(report: &RetryReport) -> String {
    format!(
        "{} sent, {} failed, {} skipped",
        report.success, report.failure, report.skipped
    )
}

/// `"1 stored crash report"`, `"3 stored crash reports"`
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Shortens `text` to its first line and at most `max` characters,
/// marking the cut with `...`
pub fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max && first_line.len() == text.len() {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut short: String = first_line.chars().take(keep).collect();
    short.push_str("...");
    short
}
