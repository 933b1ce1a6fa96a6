//! Context provider port
//!
//! Supplies device and application metadata. Collection itself is outside
//! the agent; the agent only merges the provided attributes underneath the
//! attributes of every event, metric and crash.

use crate::domain::Attributes;

/// Source of ambient attributes
pub trait IContextProvider: Send + Sync {
    /// Current context attributes
    fn attributes(&self) -> Attributes;
}
