//! Crashes command - Inspect and drain the offline crash store
//!
//! Provides the `beacon crashes` CLI command which:
//! 1. Lists stored crash reports, newest first
//! 2. Shows or deletes a single stored report
//! 3. Clears the store
//! 4. Retries delivery of every stored report against the configured endpoint

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use serde_json::{json, Value};
use tracing::info;

use beacon_agent::{RetryPolicy, RetryScheduler, TaskScheduler};
use beacon_core::config::Config;
use beacon_core::domain::{StorageId, StoredCrash};
use beacon_transport::HttpTransport;

use super::open_offline_store;
use crate::output::{
    crash_summary, crash_table_header, crash_table_row, plural, retry_report_line, Output,
    OutputFormat,
};

#[derive(Debug, Subcommand)]
pub enum CrashesCommand {
    /// List stored crash reports, newest first
    List,
    /// Show one stored crash report
    View {
        /// Storage id as printed by `crashes list`
        id: String,
    },
    /// Delete one stored crash report
    Delete {
        /// Storage id as printed by `crashes list`
        id: String,
    },
    /// Delete every stored crash report
    Clear,
    /// Resend every stored crash report now
    Retry {
        /// Print the payloads that would be sent, without sending them
        #[arg(long)]
        dry_run: bool,
    },
}

impl CrashesCommand {
    pub async fn execute(&self, format: OutputFormat, config: &Config) -> Result<()> {
        match self {
            CrashesCommand::List => execute_list(format, config).await,
            CrashesCommand::View { id } => execute_view(id, format, config).await,
            CrashesCommand::Delete { id } => execute_delete(id, format, config).await,
            CrashesCommand::Clear => execute_clear(format, config).await,
            CrashesCommand::Retry { dry_run } => execute_retry(*dry_run, format, config).await,
        }
    }
}

async fn execute_list(format: OutputFormat, config: &Config) -> Result<()> {
    let out = Output::new(format);
    let store = open_offline_store(config).await?;
    let crashes = store
        .list_stored_crashes()
        .await
        .context("Failed to list stored crashes")?;

    if out.is_json() {
        let items: Vec<Value> = crashes.iter().map(crash_summary).collect();
        out.json(&json!({
            "count": crashes.len(),
            "max_entries": store.max_entries(),
            "crashes": items,
        }));
        return Ok(());
    }

    if crashes.is_empty() {
        out.line("No stored crash reports");
        return Ok(());
    }

    for line in crash_table_header() {
        println!("{}", line);
    }
    for crash in &crashes {
        println!("{}", crash_table_row(crash));
    }
    println!();
    out.line(&format!(
        "{} of {} slots used",
        crashes.len(),
        store.max_entries()
    ));
    Ok(())
}

async fn execute_view(id: &str, format: OutputFormat, config: &Config) -> Result<()> {
    let out = Output::new(format);
    let id: StorageId = id.parse().context("Invalid storage id")?;
    let store = open_offline_store(config).await?;

    let Some(crash) = store.get_crash(&id).await? else {
        out.error(&format!("No stored crash with id {}", id));
        return Ok(());
    };

    if out.is_json() {
        let mut view = crash_summary(&crash);
        if let Value::Object(map) = &mut view {
            map.insert("payload".to_string(), crash.payload().to_wire());
        }
        out.json(&view);
        return Ok(());
    }

    let payload = crash.payload();
    out.success(&format!("Crash {}", crash.id()));
    out.line(&format!("Error:       {}", payload.error()));
    out.line(&format!("Fingerprint: {}", payload.fingerprint()));
    out.line(&format!("Occurred:    {}", payload.timestamp().to_rfc3339()));
    out.line(&format!("Stored:      {}", crash.stored_at().to_rfc3339()));
    out.line(&format!(
        "Retries:     {} of {}",
        crash.retry_count(),
        config.retry.max_retries
    ));
    if let Some(at) = crash.last_retry_at() {
        out.line(&format!("Last retry:  {}", at.to_rfc3339()));
    }

    if !payload.attributes().is_empty() {
        out.line("");
        out.line("Attributes:");
        for (key, value) in payload.attributes().iter() {
            out.line(&format!("  {} = {}", key, value));
        }
    }

    if let Some(stack) = payload.stack_trace() {
        out.line("");
        out.line("Stack trace:");
        for line in stack.lines() {
            out.line(&format!("  {}", line));
        }
    }

    out.line("");
    out.line(&format!("Breadcrumbs: {}", payload.breadcrumbs()));
    Ok(())
}

async fn execute_delete(id: &str, format: OutputFormat, config: &Config) -> Result<()> {
    let out = Output::new(format);
    let id: StorageId = id.parse().context("Invalid storage id")?;
    let store = open_offline_store(config).await?;

    let deleted = store.delete_crash(&id).await?;
    info!(storage_id = %id, deleted, "Delete stored crash");

    out.json(&json!({"id": id.as_str(), "deleted": deleted}));
    if deleted {
        out.success(&format!("Deleted {}", id));
    } else if !out.is_json() {
        out.warn(&format!("No stored crash with id {}", id));
    }
    Ok(())
}

async fn execute_clear(format: OutputFormat, config: &Config) -> Result<()> {
    let out = Output::new(format);
    let store = open_offline_store(config).await?;

    let removed = store.clear_all().await?;
    info!(removed, "Cleared offline crash store");

    out.json(&json!({"removed": removed}));
    out.success(&format!("Removed {}", plural(removed, "stored crash report")));
    Ok(())
}

async fn execute_retry(dry_run: bool, format: OutputFormat, config: &Config) -> Result<()> {
    let out = Output::new(format);
    let store = Arc::new(open_offline_store(config).await?);

    if dry_run {
        let crashes = store.list_stored_crashes().await?;
        let payloads: Vec<Value> = retry_plan(&crashes, config.retry.max_retries)
            .into_iter()
            .map(|crash| {
                crash.payload().retry_wire(
                    crash.retry_count() + 1,
                    config.retry.max_retries,
                    Utc::now(),
                )
            })
            .collect();

        out.json(&json!({"dry_run": true, "payloads": payloads}));
        if payloads.is_empty() {
            out.line("Nothing to retry");
        } else {
            out.success(&format!(
                "Would send {} to {}",
                plural(payloads.len(), "payload"),
                config.transport.endpoint
            ));
            for payload in &payloads {
                out.line(&serde_json::to_string(payload).unwrap_or_default());
            }
        }
        return Ok(());
    }

    let transport = HttpTransport::from_config(&config.transport)
        .context("Failed to build HTTP transport")?;
    let scheduler = RetryScheduler::new(
        store,
        Arc::new(transport),
        RetryPolicy::from_config(&config.retry),
        TaskScheduler::try_current()?,
        None,
    );

    info!(endpoint = %config.transport.endpoint, "Retrying stored crashes");
    let report = scheduler.force_retry_all().await?;

    out.json(&serde_json::to_value(report)?);
    if report.is_empty() {
        out.line("Nothing to retry");
    } else {
        out.success(&format!("Retry complete: {}", retry_report_line(&report)));
        if report.failure > 0 && !out.is_json() {
            out.warn("Failed reports stay stored until they reach the retry limit");
        }
    }
    Ok(())
}

/// Entries a drain would resend, oldest first
fn retry_plan(crashes: &[StoredCrash], max_retries: u32) -> Vec<&StoredCrash> {
    crashes
        .iter()
        .rev()
        .filter(|crash| !crash.is_exhausted(max_retries))
        .collect()
}
