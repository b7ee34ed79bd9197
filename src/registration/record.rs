//! Finalized registration payloads.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Placeholder stored when the submitter has no platform username.
pub const UNKNOWN_USERNAME: &str = "N/A";

/// Format of the timestamp a sink assigns at write time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A confirmed registration, ready for persistence.
///
/// Built only from a session whose fields all passed validation and whose
/// user confirmed the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub name: String,
    pub age: u32,
    /// Canonical (international) phone form.
    pub phone: String,
    pub username: String,
    /// String form of the submitter's numeric platform id.
    pub user_id: String,
}

impl RegistrationRecord {
    pub fn new(
        name: impl Into<String>,
        age: u32,
        phone: impl Into<String>,
        username: Option<&str>,
        user_id: impl Into<String>,
    ) -> Self {
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(UNKNOWN_USERNAME);
        Self {
            name: name.into(),
            age,
            phone: phone.into(),
            username: username.to_string(),
            user_id: user_id.into(),
        }
    }
}

/// A record as written by a sink, with the timestamp the sink assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRegistration {
    pub record: RegistrationRecord,
    pub registered_at: NaiveDateTime,
}

impl StoredRegistration {
    /// Stamp `record` with the current local time, truncated to seconds.
    pub fn stamp_now(record: RegistrationRecord) -> Self {
        let now = Local::now().naive_local();
        Self {
            record,
            registered_at: now.with_nanosecond(0).unwrap_or(now),
        }
    }

    /// The registration time rendered the way sinks store it.
    pub fn registered_at_display(&self) -> String {
        self.registered_at.format(TIMESTAMP_FORMAT).to_string()
    }
}
