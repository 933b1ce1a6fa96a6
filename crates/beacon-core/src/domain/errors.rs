//! Domain error types
//!
//! This module defines error types for domain-level validation: malformed
//! identifiers, attribute values that cannot be flattened to strings, and
//! unparseable enumerations.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Storage identifier is empty or contains path separators
    #[error("Invalid storage id: {0}")]
    InvalidStorageId(String),

    /// Attribute value has a shape that cannot be flattened to a string
    #[error("Unsupported attribute value for key '{key}': {reason}")]
    UnsupportedAttribute {
        /// The attribute key
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Attribute source was not a flat key/value object
    #[error("Attributes must be a JSON object, got {0}")]
    NotAnObject(String),

    /// Unknown breadcrumb category
    #[error("Invalid breadcrumb category: {0}")]
    InvalidCategory(String),

    /// Unknown breadcrumb level
    #[error("Invalid breadcrumb level: {0}")]
    InvalidLevel(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
