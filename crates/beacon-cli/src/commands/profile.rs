//! Profile command - Inspect the persisted profile version

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use beacon_agent::profile_version::PROFILE_VERSION_KEY;
use beacon_agent::{ProfileVersionCounter, TaskScheduler};
use beacon_core::config::Config;
use beacon_core::domain::ProfileVersion;
use beacon_store::FileKeyValueStore;

use crate::output::{Output, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show the last persisted profile version
    Show,
}

impl ProfileCommand {
    pub async fn execute(&self, format: OutputFormat, config: &Config) -> Result<()> {
        match self {
            ProfileCommand::Show => execute_show(format, config).await,
        }
    }
}

async fn execute_show(format: OutputFormat, config: &Config) -> Result<()> {
    let out = Output::new(format);
    let state_dir = config.agent.state_dir.clone();
    let version = load_version(FileKeyValueStore::new(state_dir.clone())).await?;
    let path = state_dir.join(PROFILE_VERSION_KEY);

    if out.is_json() {
        out.json(&json!({
            "profile_version": version.value(),
            "next": version.value() + 1,
            "path": path.display().to_string(),
        }));
    } else {
        out.success(&format!("Profile version {}", version));
        out.line(&format!("Next mutation: {}", version.value() + 1));
        out.line(&format!("File: {}", path.display()));
    }
    Ok(())
}

async fn load_version(store: FileKeyValueStore) -> Result<ProfileVersion> {
    let counter = ProfileVersionCounter::new(Arc::new(store), TaskScheduler::try_current()?);
    Ok(counter.load().await)
}
