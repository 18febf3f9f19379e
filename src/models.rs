//! Record types written by the store and read back by the aggregator.
//!
//! Every record kind implements [`LogRecord`], which ties the type to its
//! [`RecordKind`] (and therefore to its directory and identifier prefix).
//! Records are immutable once written; nothing in this crate updates or
//! deletes them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{LogError, LogResult};

/// The three kinds of project log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Meeting,
    RequirementChange,
    Milestone,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Meeting,
        RecordKind::RequirementChange,
        RecordKind::Milestone,
    ];

    /// Directory (relative to the store root) holding this kind's files.
    pub fn dir_name(self) -> &'static str {
        match self {
            RecordKind::Meeting => "meetings",
            RecordKind::RequirementChange => "requirements",
            RecordKind::Milestone => "milestones",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            RecordKind::Meeting => "meeting",
            RecordKind::RequirementChange => "requirement",
            RecordKind::Milestone => "milestone",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id_prefix())
    }
}

/// Common behaviour of every persisted record kind.
pub trait LogRecord: Serialize + DeserializeOwned + Clone + Send + 'static {
    const KIND: RecordKind;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn timestamp(&self) -> DateTime<Utc>;

    /// Checks required fields. Called by the store before any I/O.
    fn validate(&self) -> LogResult<()>;
}

/// A logged project meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "date", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub key_discussions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl LogRecord for MeetingRecord {
    const KIND: RecordKind = RecordKind::Meeting;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn validate(&self) -> LogResult<()> {
        if non_blank(&self.participants).is_empty() {
            return Err(LogError::invalid("meeting requires at least one participant"));
        }
        Ok(())
    }
}

/// A change to the project's requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementChangeRecord {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "date", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub impact: Vec<String>,
    #[serde(default = "default_proposer")]
    pub proposed_by: String,
}

fn default_category() -> String {
    "General".to_string()
}

fn default_proposer() -> String {
    "Unknown".to_string()
}

impl LogRecord for RequirementChangeRecord {
    const KIND: RecordKind = RecordKind::RequirementChange;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn validate(&self) -> LogResult<()> {
        if non_blank(&self.changes).is_empty() {
            return Err(LogError::invalid(
                "requirement change requires at least one change",
            ));
        }
        if self.category.trim().is_empty() {
            return Err(LogError::invalid("requirement category must not be empty"));
        }
        Ok(())
    }
}

/// Lifecycle state of a milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MilestoneStatus {
    #[serde(alias = "planned")]
    Planned,
    #[default]
    #[serde(alias = "pending")]
    Pending,
    #[serde(rename = "In Progress", alias = "InProgress", alias = "in_progress")]
    InProgress,
    #[serde(alias = "completed")]
    Completed,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MilestoneStatus::Planned => "Planned",
            MilestoneStatus::Pending => "Pending",
            MilestoneStatus::InProgress => "In Progress",
            MilestoneStatus::Completed => "Completed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for MilestoneStatus {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], " ").as_str() {
            "planned" => Ok(MilestoneStatus::Planned),
            "pending" => Ok(MilestoneStatus::Pending),
            "in progress" | "inprogress" => Ok(MilestoneStatus::InProgress),
            "completed" => Ok(MilestoneStatus::Completed),
            other => Err(LogError::invalid(format!(
                "unknown milestone status '{}': expected Planned, Pending, In Progress or Completed",
                other
            ))),
        }
    }
}

/// A project milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "date", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: MilestoneStatus,
    #[serde(default)]
    pub completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub key_achievements: Vec<String>,
}

impl LogRecord for MilestoneRecord {
    const KIND: RecordKind = RecordKind::Milestone;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn validate(&self) -> LogResult<()> {
        if self.name.trim().is_empty() {
            return Err(LogError::invalid("milestone name must not be empty"));
        }
        Ok(())
    }
}

/// Builds a record from a client-supplied JSON object.
///
/// Clients usually omit `id` and `timestamp`; a missing timestamp (or its
/// `date` alias) is filled with `now`. Shape errors are reported as
/// [`LogError::InvalidArgument`] so they reach the client as validation
/// failures.
pub fn record_from_json<R: LogRecord>(
    mut value: serde_json::Value,
    now: DateTime<Utc>,
) -> LogResult<R> {
    let obj = value.as_object_mut().ok_or_else(|| {
        LogError::invalid(format!("{} payload must be a JSON object", R::KIND))
    })?;

    if !obj.contains_key("timestamp") && !obj.contains_key("date") {
        obj.insert(
            "timestamp".to_string(),
            serde_json::Value::String(now.to_rfc3339()),
        );
    }

    serde_json::from_value(value)
        .map_err(|e| LogError::invalid(format!("invalid {} payload: {}", R::KIND, e)))
}

/// Parses an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]`
/// (space separator also accepted) taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            format!(
                "invalid timestamp '{}': expected RFC 3339 or YYYY-MM-DDTHH:MM:SS",
                raw
            )
        })
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

fn non_blank(items: &[String]) -> Vec<&String> {
    items.iter().filter(|s| !s.trim().is_empty()).collect()
}
