//! User profile and profile-mutation events
//!
//! Every profile mutation produces two records: a `user.profile_updated`
//! event consumed by the backend for persistence, and a companion analytics
//! event (`user.profile_set` or `user.profile_cleared`). Both carry the same
//! [`ProfileVersion`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attributes::Attributes;
use super::newtypes::ProfileVersion;
use super::record::{wire_timestamp, TelemetryRecord};

pub const PROFILE_UPDATED_EVENT: &str = "user.profile_updated";
pub const PROFILE_SET_EVENT: &str = "user.profile_set";
pub const PROFILE_CLEARED_EVENT: &str = "user.profile_cleared";

/// `user.*` keys owned by the update event; custom attributes never replace them
const RESERVED_USER_KEYS: &[&str] = &[
    "id",
    "name",
    "email",
    "phone",
    "profile_version",
    "profile_updated_at",
    "profile_cleared",
];

/// Identity and optional details of the current user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub custom: Attributes,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_custom(mut self, custom: Attributes) -> Self {
        self.custom = custom;
        self
    }
}

/// A change to the current user profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileMutation {
    Set(UserProfile),
    Cleared,
}

/// The pair of records emitted for one profile mutation
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEvents {
    pub updated: TelemetryRecord,
    pub companion: TelemetryRecord,
}

impl ProfileMutation {
    /// Builds the backend and analytics records for this mutation
    pub fn events(&self, version: ProfileVersion, at: DateTime<Utc>) -> ProfileEvents {
        let mut updated = Attributes::new()
            .with("user.profile_version", version.value())
            .with("user.profile_updated_at", wire_timestamp(&at));

        let companion = match self {
            ProfileMutation::Set(profile) => {
                updated.insert("user.id", profile.id.as_str());
                if let Some(name) = &profile.name {
                    updated.insert("user.name", name.as_str());
                }
                if let Some(email) = &profile.email {
                    updated.insert("user.email", email.as_str());
                }
                if let Some(phone) = &profile.phone {
                    updated.insert("user.phone", phone.as_str());
                }
                for (key, value) in profile.custom.iter() {
                    if RESERVED_USER_KEYS.contains(&key) {
                        continue;
                    }
                    updated.insert(format!("user.{key}"), value);
                }

                let set = Attributes::new()
                    .with("user.has_name", profile.name.is_some())
                    .with("user.has_email", profile.email.is_some())
                    .with("user.has_phone", profile.phone.is_some())
                    .with("user.custom_attributes_count", profile.custom.len())
                    .with("profile_version", version.value());
                TelemetryRecord::event(PROFILE_SET_EVENT, set)
            }
            ProfileMutation::Cleared => {
                updated.insert("user.id", "");
                updated.insert("user.profile_cleared", true);
                TelemetryRecord::event(
                    PROFILE_CLEARED_EVENT,
                    Attributes::new().with("profile_version", version.value()),
                )
            }
        };

        ProfileEvents {
            updated: TelemetryRecord::event(PROFILE_UPDATED_EVENT, updated).with_timestamp(at),
            companion: companion.with_timestamp(at),
        }
    }
}
