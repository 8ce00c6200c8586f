use std::fmt;

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const DEFAULT_NAME: &str = "arbor";
const DEFAULT_EMAIL: &str = "arbor@localhost";

/// Who made a commit and when.
///
/// Stored with whole-second precision plus the author's UTC offset, the
/// same granularity commit headers use.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the UNIX epoch.
    pub time: i64,
    /// Offset from UTC in minutes.
    pub offset_minutes: i32,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, time: i64, offset_minutes: i32) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
            offset_minutes,
        }
    }

    /// Signature stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Local::now();
        Self::new(
            name,
            email,
            now.timestamp(),
            now.offset().local_minus_utc() / 60,
        )
    }

    /// Author identity from `ARBOR_AUTHOR_NAME` / `ARBOR_AUTHOR_EMAIL`.
    pub fn author_from_env() -> Self {
        Self::from_env_vars("ARBOR_AUTHOR_NAME", "ARBOR_AUTHOR_EMAIL")
    }

    /// Committer identity from `ARBOR_COMMITTER_NAME` / `ARBOR_COMMITTER_EMAIL`.
    pub fn committer_from_env() -> Self {
        Self::from_env_vars("ARBOR_COMMITTER_NAME", "ARBOR_COMMITTER_EMAIL")
    }

    fn from_env_vars(name_var: &str, email_var: &str) -> Self {
        let name = std::env::var(name_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());
        let email = std::env::var(email_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EMAIL.to_string());
        Self::now(name, email)
    }

    /// The timestamp in the signer's own offset.
    pub fn datetime(&self) -> Result<DateTime<FixedOffset>, TypeError> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60).ok_or_else(|| {
            TypeError::InvalidSignature(format!("offset out of range: {}", self.offset_minutes))
        })?;
        offset
            .timestamp_opt(self.time, 0)
            .single()
            .ok_or_else(|| TypeError::InvalidSignature(format!("timestamp out of range: {}", self.time)))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.time,
            sign,
            abs / 60,
            abs % 60
        )
    }
}
