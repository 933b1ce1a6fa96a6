//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the identifiers and counters that flow
//! between the agent components. Each newtype checks validity at
//! construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// StorageId
// ============================================================================

/// Identifier of a crash persisted in the offline store
///
/// Stable for the life of the stored entry. Generated identifiers have the
/// shape `crash-{yyyymmddHHMMSSmmm}-{seq6}-{uuid8}`: they sort by creation
/// time, and ids generated by one process within the same millisecond sort
/// in generation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(String);

static GENERATE_SEQUENCE: AtomicU32 = AtomicU32::new(0);
const SEQUENCE_MODULUS: u32 = 1_000_000;

impl StorageId {
    /// Create a validated StorageId
    ///
    /// Rejects empty strings and anything that could escape a storage
    /// directory (`/`, `\`, `..`).
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidStorageId("empty".to_string()));
        }
        if id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(DomainError::InvalidStorageId(id));
        }
        Ok(Self(id))
    }

    /// Generate a fresh identifier for a crash stored at `now`
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let seq = GENERATE_SEQUENCE.fetch_add(1, Ordering::Relaxed) % SEQUENCE_MODULUS;
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!(
            "crash-{}-{:06}-{}",
            now.format("%Y%m%d%H%M%S%3f"),
            seq,
            &uuid[..8]
        ))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for StorageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StorageId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Deterministic grouping key for crash reports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed fingerprint string
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the fingerprint as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ProfileVersion
// ============================================================================

/// Monotonic user profile version used by the backend for conflict resolution
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProfileVersion(u64);

impl ProfileVersion {
    /// The version before any profile mutation
    pub const ZERO: ProfileVersion = ProfileVersion(0);

    /// Create a version from a raw value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The version that follows this one
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for ProfileVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileVersion {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| DomainError::ValidationFailed(format!("Invalid profile version: {e}")))
    }
}
