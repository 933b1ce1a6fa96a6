//! Breadcrumb value type
//!
//! A breadcrumb is a small, timestamped note about recent application
//! activity. Breadcrumbs are immutable once created and are attached to
//! crash reports as causal context.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use super::errors::DomainError;

/// What area of the application a breadcrumb describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbCategory {
    Navigation,
    User,
    System,
    Network,
    Ui,
    Custom,
}

impl BreadcrumbCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreadcrumbCategory::Navigation => "navigation",
            BreadcrumbCategory::User => "user",
            BreadcrumbCategory::System => "system",
            BreadcrumbCategory::Network => "network",
            BreadcrumbCategory::Ui => "ui",
            BreadcrumbCategory::Custom => "custom",
        }
    }
}

impl Display for BreadcrumbCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreadcrumbCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "navigation" => Ok(BreadcrumbCategory::Navigation),
            "user" => Ok(BreadcrumbCategory::User),
            "system" => Ok(BreadcrumbCategory::System),
            "network" => Ok(BreadcrumbCategory::Network),
            "ui" => Ok(BreadcrumbCategory::Ui),
            "custom" => Ok(BreadcrumbCategory::Custom),
            _ => Err(DomainError::InvalidCategory(s.to_string())),
        }
    }
}

/// Severity of a breadcrumb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl BreadcrumbLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreadcrumbLevel::Debug => "debug",
            BreadcrumbLevel::Info => "info",
            BreadcrumbLevel::Warning => "warning",
            BreadcrumbLevel::Error => "error",
            BreadcrumbLevel::Critical => "critical",
        }
    }
}

impl Display for BreadcrumbLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreadcrumbLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(BreadcrumbLevel::Debug),
            "info" => Ok(BreadcrumbLevel::Info),
            "warning" | "warn" => Ok(BreadcrumbLevel::Warning),
            "error" => Ok(BreadcrumbLevel::Error),
            "critical" => Ok(BreadcrumbLevel::Critical),
            _ => Err(DomainError::InvalidLevel(s.to_string())),
        }
    }
}

/// A single contextual note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    message: String,
    category: BreadcrumbCategory,
    level: BreadcrumbLevel,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Attributes>,
}

impl Breadcrumb {
    /// Creates a breadcrumb stamped with the current time
    pub fn new(
        message: impl Into<String>,
        category: BreadcrumbCategory,
        level: BreadcrumbLevel,
        data: Option<Attributes>,
    ) -> Self {
        Self {
            message: message.into(),
            category,
            level,
            timestamp: Utc::now(),
            data: data.filter(|d| !d.is_empty()),
        }
    }

    /// Overrides the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> BreadcrumbCategory {
        self.category
    }

    pub fn level(&self) -> BreadcrumbLevel {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> Option<&Attributes> {
        self.data.as_ref()
    }
}

/// Serializes a breadcrumb snapshot into the JSON string carried by crash payloads
pub fn serialize_snapshot(breadcrumbs: &[Breadcrumb]) -> String {
    serde_json::to_string(breadcrumbs).unwrap_or_else(|_| "[]".to_string())
}
