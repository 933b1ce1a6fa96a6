//! Config command - View and validate the Beacon configuration

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use beacon_core::config::Config;

use crate::output::{plural, Output, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(format, config_path),
            ConfigCommand::Validate => execute_validate(format, config_path),
        }
    }
}

fn execute_show(format: OutputFormat, config_path: &Path) -> Result<()> {
    let out = Output::new(format);
    let config = Config::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if out.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        out.json(&json);
    } else {
        out.success(&format!("Configuration ({})", config_path.display()));
        if !config_path.exists() {
            out.line("File not found, showing defaults");
        }
        out.line("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            out.line(line);
        }
    }

    Ok(())
}

fn execute_validate(format: OutputFormat, config_path: &Path) -> Result<()> {
    let out = Output::new(format);

    let errors = match check_file(config_path) {
        Ok(errors) => errors,
        Err(message) => {
            if out.is_json() {
                out.json(&json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                out.error(&message);
                out.line(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), errors = errors.len(), "Validated configuration");

    if out.is_json() {
        out.json(&json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": errors,
        }));
    } else if errors.is_empty() {
        out.success("Configuration is valid");
        out.line(&format!("File: {}", config_path.display()));
    } else {
        out.error(&format!("Configuration has {}:", plural(errors.len(), "error")));
        out.line(&format!("File: {}", config_path.display()));
        out.line("");
        for error in &errors {
            out.line(&format!("  {}", error));
        }
    }

    Ok(())
}

/// Loads `path` strictly and returns its validation errors
///
/// `Err` carries a message when the file is missing or does not parse.
fn check_file(path: &Path) -> Result<Vec<String>, String> {
    if !path.exists() {
        return Err(format!(
            "Configuration file not found at {}",
            path.display()
        ));
    }
    let config =
        Config::load(path).map_err(|e| format!("Failed to parse configuration: {}", e))?;
    Ok(config.validate().iter().map(|e| e.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_file(&dir.path().join("config.yaml")).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_check_file_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "batching: [not, a, map]\n").unwrap();

        let err = check_file(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse configuration"));
    }

    #[test]
    fn test_check_file_reports_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "batching:\n  batch_size: 0\n").unwrap();

        let errors = check_file(&path).unwrap();
        assert!(errors.iter().any(|e| e.starts_with("batching.batch_size")));
    }

    #[test]
    fn test_check_file_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "agent:\n  service_name: checkout\nretry:\n  max_retries: 5\n",
        )
        .unwrap();

        assert!(check_file(&path).unwrap().is_empty());
    }
}
