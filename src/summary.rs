//! Windowed project summaries.
//!
//! [`summarize`] reads every record kind over the trailing `window_days`
//! ending at `now` and folds them into a [`ProjectSummary`]: per-kind counts,
//! highlight lists, and the in-window records themselves. It keeps no state
//! between calls, so two calls with the same `now` and `window_days` over an
//! unchanged store return equal summaries.
//!
//! # Highlights
//!
//! | Field | Source |
//! |-------|--------|
//! | `decisions` | meeting `decisions` |
//! | `action_items` | meeting `action_items` |
//! | `rationales` | non-empty requirement-change `rationale` |
//! | `achievements` | `key_achievements` of milestones with status `Completed` |
//!
//! Highlights keep record order (timestamp ascending) and are not
//! de-duplicated.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LogError, LogResult};
use crate::models::{
    LogRecord, MeetingRecord, MilestoneRecord, MilestoneStatus, RequirementChangeRecord,
};
use crate::reader::{read_all, ReadOutcome, ReadWarning};
use crate::store::RecordStore;

/// Fallback name when the store has no readable `project.json`.
pub const UNNAMED_PROJECT: &str = "Unnamed Project";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordCounts {
    pub meetings: usize,
    pub requirement_changes: usize,
    pub milestones: usize,
}

impl RecordCounts {
    pub fn total(&self) -> usize {
        self.meetings + self.requirement_changes + self.milestones
    }
}

/// Aggregated view of the project over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_name: String,
    /// Human-readable window label, e.g. `"Last 30 days"`.
    pub summary_period: String,
    pub window_days: i64,
    pub window: SummaryWindow,
    pub counts: RecordCounts,
    pub decisions: Vec<String>,
    pub action_items: Vec<String>,
    pub rationales: Vec<String>,
    pub achievements: Vec<String>,
    pub meetings: Vec<MeetingRecord>,
    pub requirement_changes: Vec<RequirementChangeRecord>,
    pub milestones: Vec<MilestoneRecord>,
    pub read_warnings: Vec<ReadWarning>,
}

impl ProjectSummary {
    pub fn meeting_count(&self) -> usize {
        self.counts.meetings
    }

    pub fn requirement_count(&self) -> usize {
        self.counts.requirement_changes
    }

    pub fn milestone_count(&self) -> usize {
        self.counts.milestones
    }
}

/// Records of each kind whose content mentions a search term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub term: String,
    pub meetings: Vec<MeetingRecord>,
    pub requirement_changes: Vec<RequirementChangeRecord>,
    pub milestones: Vec<MilestoneRecord>,
}

/// Builds the summary for `[now - window_days, now]`, inclusive at both ends.
///
/// # Errors
///
/// - [`LogError::InvalidArgument`] if `window_days <= 0` (checked before any I/O).
/// - [`LogError::Storage`] if a kind directory exists but cannot be listed.
pub fn summarize(
    store: &RecordStore,
    now: DateTime<Utc>,
    window_days: i64,
) -> LogResult<ProjectSummary> {
    let since = window_start(now, window_days)?;

    let mut read_warnings = Vec::new();
    let meetings = in_window(
        read_all::<MeetingRecord>(store, since)?.collect_sorted(),
        now,
        &mut read_warnings,
    );
    let requirements = in_window(
        read_all::<RequirementChangeRecord>(store, since)?.collect_sorted(),
        now,
        &mut read_warnings,
    );
    let milestones = in_window(
        read_all::<MilestoneRecord>(store, since)?.collect_sorted(),
        now,
        &mut read_warnings,
    );

    let counts = RecordCounts {
        meetings: meetings.len(),
        requirement_changes: requirements.len(),
        milestones: milestones.len(),
    };

    let decisions = meetings
        .iter()
        .flat_map(|m| m.decisions.iter().cloned())
        .collect();
    let action_items = meetings
        .iter()
        .flat_map(|m| m.action_items.iter().cloned())
        .collect();
    let rationales = requirements
        .iter()
        .map(|r| r.rationale.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    let achievements = milestones
        .iter()
        .filter(|m| m.status == MilestoneStatus::Completed)
        .flat_map(|m| m.key_achievements.iter().cloned())
        .collect();

    debug!(
        window_days,
        meetings = counts.meetings,
        requirement_changes = counts.requirement_changes,
        milestones = counts.milestones,
        warnings = read_warnings.len(),
        "summary computed"
    );

    Ok(ProjectSummary {
        project_name: project_name(store),
        summary_period: format!("Last {} days", window_days),
        window_days,
        window: SummaryWindow {
            start: since,
            end: now,
        },
        counts,
        decisions,
        action_items,
        rationales,
        achievements,
        meetings,
        requirement_changes: requirements,
        milestones,
        read_warnings,
    })
}

/// Computes `now - window_days`, rejecting non-positive or absurd windows.
pub fn window_start(now: DateTime<Utc>, window_days: i64) -> LogResult<DateTime<Utc>> {
    if window_days <= 0 {
        return Err(LogError::invalid(format!(
            "window_days must be a positive integer, got {}",
            window_days
        )));
    }
    Duration::try_days(window_days)
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(|| LogError::invalid(format!("window_days {} is out of range", window_days)))
}

/// Drops records stamped after `now` and moves the scan's warnings out.
fn in_window<R: LogRecord>(
    outcome: ReadOutcome<R>,
    now: DateTime<Utc>,
    warnings: &mut Vec<ReadWarning>,
) -> Vec<R> {
    warnings.extend(outcome.warnings);
    outcome
        .records
        .into_iter()
        .filter(|r| r.timestamp() <= now)
        .collect()
}

fn project_name(store: &RecordStore) -> String {
    match store.metadata() {
        Ok(Some(meta)) => meta.project_name,
        Ok(None) => UNNAMED_PROJECT.to_string(),
        Err(e) => {
            warn!(error = %e, "could not read project metadata");
            UNNAMED_PROJECT.to_string()
        }
    }
}

/// Renders the plain-text digest handed to the chat relay as project context.
pub fn render_context(summary: &ProjectSummary) -> String {
    let mut out = format!(
        "Recent Project Context for {} (Last {} days):\n\n",
        summary.project_name, summary.window_days
    );

    out.push_str("Meetings:\n");
    for m in &summary.meetings {
        out.push_str(&format!(
            "- {}: {}\n",
            m.timestamp.format("%Y-%m-%d"),
            m.key_discussions.join(", ")
        ));
    }

    out.push_str("\nRequirement Changes:\n");
    for r in &summary.requirement_changes {
        out.push_str(&format!(
            "- {} [{}]: {}\n",
            r.timestamp.format("%Y-%m-%d"),
            r.category,
            r.changes.join(", ")
        ));
    }

    out.push_str("\nMilestones:\n");
    for m in &summary.milestones {
        out.push_str(&format!("- {}: {}\n", m.name, m.status));
    }

    if !summary.decisions.is_empty() {
        out.push_str("\nRecent Decisions:\n");
        for d in &summary.decisions {
            out.push_str(&format!("- {}\n", d));
        }
    }

    out
}

/// Keeps the in-window records whose JSON form contains `term`
/// (case-insensitive).
pub fn filter_by_term(summary: &ProjectSummary, term: &str) -> LogResult<CategorySummary> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Err(LogError::invalid("category must not be empty"));
    }

    Ok(CategorySummary {
        term: term.trim().to_string(),
        meetings: matching(&summary.meetings, &needle)?,
        requirement_changes: matching(&summary.requirement_changes, &needle)?,
        milestones: matching(&summary.milestones, &needle)?,
    })
}

fn matching<R: LogRecord>(records: &[R], needle: &str) -> LogResult<Vec<R>> {
    let mut out = Vec::new();
    for r in records {
        if serde_json::to_string(r)?.to_lowercase().contains(needle) {
            out.push(r.clone());
        }
    }
    Ok(out)
}
