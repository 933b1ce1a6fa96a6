//! Crash payloads, fingerprints and persisted crash records
//!
//! A [`CrashPayload`] is built exactly once per reported error. Its
//! fingerprint is computed at construction and then carried unchanged
//! through every resend, including resends from the offline store.
//!
//! ## Wire shapes
//!
//! ```text
//! first attempt: {"type":"error","error":..,"stackTrace":..,"fingerprint":..,
//!                 "breadcrumbs":"[...]","timestamp":..,"attributes":{..}}
//! retry:         first attempt + "retry_info":{"retry_count","max_retries","retry_at"}
//! persisted:     first attempt + "storage":{"stored_at","id","retry_count","last_retry_at"}
//! ```

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::attributes::Attributes;
use super::breadcrumb::{serialize_snapshot, Breadcrumb};
use super::newtypes::{Fingerprint, StorageId};
use super::record::{wire_timestamp, RecordKind};

/// Attribute key carrying the fingerprint inside a crash payload
pub const FINGERPRINT_ATTRIBUTE: &str = "crash.fingerprint";

/// Attribute key carrying the error type name inside a crash payload
pub const ERROR_TYPE_ATTRIBUTE: &str = "error.type";

/// Number of hex characters kept from each hashed fingerprint component
const HASH_PREFIX_LEN: usize = 16;

// ============================================================================
// CapturedError
// ============================================================================

/// An error as seen by the crash reporter: a type name and a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    type_name: String,
    message: String,
}

impl CapturedError {
    /// Creates a captured error from explicit parts
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Captures a concrete error value, using its Rust type as the type name
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        Self::new(short_type_name(std::any::type_name::<E>()), error.to_string())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for CapturedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// Strips module paths and generic parameters: `std::io::error::Error` -> `Error`
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ============================================================================
// Fingerprint
// ============================================================================

fn hash_prefix(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..HASH_PREFIX_LEN].to_string()
}

/// First non-blank line of a stack trace, trimmed
fn top_frame(stack: Option<&str>) -> &str {
    stack
        .and_then(|s| s.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or("")
}

/// Computes the grouping fingerprint of an error
///
/// Only the top stack frame takes part, so line-number drift deeper in the
/// trace does not split a group.
pub fn compute_fingerprint(error: &CapturedError, stack: Option<&str>) -> Fingerprint {
    Fingerprint::from_string(format!(
        "{}-{}-{}",
        error.type_name(),
        hash_prefix(error.message()),
        hash_prefix(top_frame(stack)),
    ))
}

// ============================================================================
// CrashPayload
// ============================================================================

/// A fully built crash report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashPayload {
    #[serde(rename = "type")]
    kind: RecordKind,
    error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack_trace: Option<String>,
    fingerprint: Fingerprint,
    breadcrumbs: String,
    timestamp: DateTime<Utc>,
    attributes: Attributes,
}

impl CrashPayload {
    /// Builds the payload for `error`
    ///
    /// `breadcrumbs` must already be ordered most-recent-first.
    pub fn build(
        error: &CapturedError,
        stack: Option<String>,
        breadcrumbs: &[Breadcrumb],
        attributes: Attributes,
    ) -> Self {
        let stack = stack.filter(|s| !s.trim().is_empty());
        let fingerprint = compute_fingerprint(error, stack.as_deref());

        let mut attributes = attributes;
        attributes.insert(ERROR_TYPE_ATTRIBUTE, error.type_name());
        attributes.insert(FINGERPRINT_ATTRIBUTE, fingerprint.as_str());

        Self {
            kind: RecordKind::Error,
            error: error.to_string(),
            stack_trace: stack,
            fingerprint,
            breadcrumbs: serialize_snapshot(breadcrumbs),
            timestamp: Utc::now(),
            attributes,
        }
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The serialized breadcrumb snapshot (a JSON array string)
    pub fn breadcrumbs(&self) -> &str {
        &self.breadcrumbs
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Wire representation for the first delivery attempt
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Wire representation for a resend, carrying `retry_info`
    pub fn retry_wire(&self, retry_count: u32, max_retries: u32, retry_at: DateTime<Utc>) -> Value {
        let mut wire = self.to_wire();
        if let Value::Object(map) = &mut wire {
            map.insert(
                "retry_info".to_string(),
                json!({
                    "retry_count": retry_count,
                    "max_retries": max_retries,
                    "retry_at": wire_timestamp(&retry_at),
                }),
            );
        }
        wire
    }
}

// ============================================================================
// StoredCrash
// ============================================================================

/// Offline-store bookkeeping attached to a persisted crash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetadata {
    pub stored_at: DateTime<Utc>,
    pub id: StorageId,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<DateTime<Utc>>,
}

/// A crash payload persisted in the offline store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCrash {
    #[serde(flatten)]
    payload: CrashPayload,
    storage: StorageMetadata,
}

impl StoredCrash {
    /// Wraps a payload that has never been retried
    pub fn new(payload: CrashPayload, id: StorageId, stored_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            storage: StorageMetadata {
                stored_at,
                id,
                retry_count: 0,
                last_retry_at: None,
            },
        }
    }

    pub fn payload(&self) -> &CrashPayload {
        &self.payload
    }

    pub fn id(&self) -> &StorageId {
        &self.storage.id
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.storage.stored_at
    }

    pub fn retry_count(&self) -> u32 {
        self.storage.retry_count
    }

    pub fn last_retry_at(&self) -> Option<DateTime<Utc>> {
        self.storage.last_retry_at
    }

    pub fn metadata(&self) -> &StorageMetadata {
        &self.storage
    }

    /// Returns true once the entry may no longer be resent
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.storage.retry_count >= max_retries
    }

    /// Records a retry attempt
    pub fn record_retry(&mut self, retry_count: u32, at: DateTime<Utc>) {
        self.storage.retry_count = retry_count;
        self.storage.last_retry_at = Some(at);
    }

    /// Replaces the identifier with the one the entry is actually stored under
    pub fn with_id(mut self, id: StorageId) -> Self {
        self.storage.id = id;
        self
    }

    /// Encodes the persisted record
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Decodes a persisted record
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::breadcrumb::{BreadcrumbCategory, BreadcrumbLevel};
    use super::*;

    const STACK: &str = "\n   at checkout (cart.rs:10)\n   at main (main.rs:3)\n";

    #[test]
    fn test_fingerprint_is_deterministic() {
        let error = CapturedError::new("StateError", "cart is empty");
        let a = compute_fingerprint(&error, Some(STACK));
        let b = compute_fingerprint(&error, Some(STACK));
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("StateError-"));
        assert_eq!(a.as_str().len(), "StateError-".len() + 16 + 1 + 16);
    }

    #[test]
    fn test_fingerprint_ignores_deeper_frames() {
        let error = CapturedError::new("StateError", "cart is empty");
        let drifted = "at checkout (cart.rs:10)\nat main (main.rs:99)";
        assert_eq!(
            compute_fingerprint(&error, Some(STACK)),
            compute_fingerprint(&error, Some(drifted))
        );
    }

    #[test]
    fn test_fingerprint_differs_by_message_and_frame() {
        let base = compute_fingerprint(&CapturedError::new("E", "one"), Some(STACK));
        let other_message = compute_fingerprint(&CapturedError::new("E", "two"), Some(STACK));
        let other_frame =
            compute_fingerprint(&CapturedError::new("E", "one"), Some("at pay (pay.rs:1)"));
        assert_ne!(base, other_message);
        assert_ne!(base, other_frame);
    }

    #[test]
    fn test_from_error_uses_short_type_name() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let captured = CapturedError::from_error(&io);
        assert_eq!(captured.type_name(), "Error");
        assert_eq!(captured.message(), "disk gone");
        assert_eq!(captured.to_string(), "Error: disk gone");
    }

    #[test]
    fn test_payload_wire_shape() {
        let crumbs = vec![Breadcrumb::new(
            "tap pay",
            BreadcrumbCategory::User,
            BreadcrumbLevel::Info,
            None,
        )];
        let payload = CrashPayload::build(
            &CapturedError::new("PaymentError", "declined"),
            Some(STACK.to_string()),
            &crumbs,
            Attributes::new().with("screen", "pay"),
        );

        let wire = payload.to_wire();
        assert_eq!(wire["type"], "error");
        assert_eq!(wire["error"], "PaymentError: declined");
        assert!(wire["stackTrace"].as_str().unwrap().contains("checkout"));
        assert_eq!(wire["fingerprint"], payload.fingerprint().as_str());
        assert_eq!(wire["attributes"]["crash.fingerprint"], payload.fingerprint().as_str());
        assert_eq!(wire["attributes"]["error.type"], "PaymentError");
        assert_eq!(wire["attributes"]["screen"], "pay");

        let crumbs: Value = serde_json::from_str(wire["breadcrumbs"].as_str().unwrap()).unwrap();
        assert_eq!(crumbs[0]["message"], "tap pay");
        assert!(wire.get("retry_info").is_none());
    }

    #[test]
    fn test_blank_stack_is_omitted() {
        let payload = CrashPayload::build(
            &CapturedError::new("E", "m"),
            Some("   ".to_string()),
            &[],
            Attributes::new(),
        );
        assert!(payload.stack_trace().is_none());
        assert!(payload.to_wire().get("stackTrace").is_none());
        assert_eq!(payload.breadcrumbs(), "[]");
    }

    #[test]
    fn test_retry_wire_keeps_fingerprint() {
        let payload =
            CrashPayload::build(&CapturedError::new("E", "m"), None, &[], Attributes::new());
        let wire = payload.retry_wire(2, 3, Utc::now());
        assert_eq!(wire["retry_info"]["retry_count"], 2);
        assert_eq!(wire["retry_info"]["max_retries"], 3);
        assert!(wire["retry_info"]["retry_at"].is_string());
        assert_eq!(wire["fingerprint"], payload.fingerprint().as_str());
    }

    #[test]
    fn test_stored_crash_persisted_shape() {
        let payload =
            CrashPayload::build(&CapturedError::new("E", "m"), None, &[], Attributes::new());
        let id = StorageId::new("crash-1").unwrap();
        let mut stored = StoredCrash::new(payload.clone(), id.clone(), Utc::now());
        assert_eq!(stored.retry_count(), 0);
        assert!(stored.last_retry_at().is_none());

        stored.record_retry(1, Utc::now());
        let bytes = stored.to_bytes().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["storage"]["id"], "crash-1");
        assert_eq!(value["storage"]["retry_count"], 1);
        assert!(value["storage"]["last_retry_at"].is_string());

        let decoded = StoredCrash::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.payload(), &payload);
        assert_eq!(decoded.id(), &id);
        assert!(!decoded.is_exhausted(3));
    }

    #[test]
    fn test_stored_crash_rejects_garbage() {
        assert!(StoredCrash::from_bytes(b"{not json").is_err());
        assert!(StoredCrash::from_bytes(br#"{"type":"error"}"#).is_err());
    }
}
