//! Shared types used across the filing agent.
//!
//! This module defines the newtypes and the report record that flow from the
//! queue through the processor and back into storage.

use crate::error::SupervisaoError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Identifier of a queued report, stable for the record's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    /// Create a new `ReportId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, SupervisaoError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SupervisaoError::Validation(
                "report ID must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the supervisor who owns a report and its portal credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create a new `OwnerId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, SupervisaoError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SupervisaoError::Validation(
                "owner ID must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a queued report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Waiting to be filed into the portal
    Pending,
    /// Filed successfully
    Completed,
    /// Filing failed; see the record's error message
    Failed,
}

impl ReportStatus {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether this status ends a processing attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = SupervisaoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(SupervisaoError::Validation(format!(
                "unknown report status '{other}'"
            ))),
        }
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, SupervisaoError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| SupervisaoError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

/// A supervision report as stored in the queue.
///
/// `fields` keeps the producer's key order; the processor fills the portal
/// form in exactly that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Unique identifier
    pub id: ReportId,
    /// Raw owner identifier as written by the producer (may be blank)
    pub owner_id: String,
    /// Lifecycle state
    pub status: ReportStatus,
    /// Field key to field value, in the producer's order
    pub fields: Map<String, Value>,
    /// Present only when `status` is `failed`
    pub error_message: Option<String>,
    /// When the record was queued
    pub created_at: Timestamp,
    /// When the record left `pending`
    pub processed_at: Option<Timestamp>,
}

impl ReportRecord {
    /// Build a fresh pending record.
    #[must_use]
    pub fn pending(id: ReportId, owner_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            status: ReportStatus::Pending,
            fields,
            error_message: None,
            created_at: Timestamp::now(),
            processed_at: None,
        }
    }

    /// The owner, if the record names a non-blank one.
    #[must_use]
    pub fn owner(&self) -> Option<OwnerId> {
        OwnerId::new(self.owner_id.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_id_rejects_blank() {
        assert!(ReportId::new("").is_err());
        assert!(ReportId::new("   ").is_err());
        assert_eq!(
            ReportId::new("report_123_1700000000").unwrap().as_str(),
            "report_123_1700000000"
        );
    }

    #[test]
    fn test_owner_id_rejects_blank() {
        assert!(OwnerId::new("").is_err());
        assert!(OwnerId::new("\t").is_err());
        assert!(OwnerId::new("U1").is_ok());
    }

    #[test]
    fn test_status_round_trip_through_storage_text() {
        for status in [
            ReportStatus::Pending,
            ReportStatus::Completed,
            ReportStatus::Failed,
        ] {
            let parsed: ReportStatus = status.as_str().parse().expect("parse status");
            assert_eq!(parsed, status);
        }
        assert!("Pending".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ReportStatus::Pending.is_terminal());
        assert!(ReportStatus::Completed.is_terminal());
        assert!(ReportStatus::Failed.is_terminal());
    }

    #[test]
    fn test_record_owner_blank_is_none() {
        let id = ReportId::new("r1").unwrap();
        let record = ReportRecord::pending(id.clone(), "  ", Map::new());
        assert!(record.owner().is_none());

        let record = ReportRecord::pending(id, "U1", Map::new());
        assert_eq!(record.owner().unwrap().as_str(), "U1");
    }

    #[test]
    fn test_record_preserves_field_order() {
        let fields = json!({"b": "2", "a": "1", "c": "3"});
        let Value::Object(map) = fields else {
            panic!("expected object");
        };
        let record = ReportRecord::pending(ReportId::new("r1").unwrap(), "U1", map);
        let keys: Vec<_> = record.fields.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::now();
        let parsed = Timestamp::from_rfc3339(&ts.to_rfc3339()).expect("parse timestamp");
        assert_eq!(ts.as_datetime().timestamp(), parsed.as_datetime().timestamp());
    }
}
