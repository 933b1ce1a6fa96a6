//! Domain values and wire formats
//!
//! This module contains the core value types of the Beacon agent:
//! - Newtypes for storage identifiers, fingerprints and profile versions
//! - Flat attribute maps and the attribute-encoding capability
//! - Telemetry records and batches
//! - Breadcrumbs
//! - Crash payloads and persisted crash records
//! - User profiles and profile-mutation events
//! - Domain-specific error types

pub mod attributes;
pub mod breadcrumb;
pub mod crash;
pub mod errors;
pub mod newtypes;
pub mod profile;
pub mod record;

// Re-export commonly used types
pub use attributes::{AttributeEncodable, AttributeValue, Attributes};
pub use breadcrumb::{Breadcrumb, BreadcrumbCategory, BreadcrumbLevel};
pub use crash::{compute_fingerprint, CapturedError, CrashPayload, StorageMetadata, StoredCrash};
pub use errors::DomainError;
pub use newtypes::*;
pub use profile::{ProfileEvents, ProfileMutation, UserProfile};
pub use record::{Batch, RecordKind, TelemetryRecord};
