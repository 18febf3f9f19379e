//! Persist summaries as report snapshots.
//!
//! Each export writes a new `reports/<id>.json` holding the summary and the
//! time it was generated. Reports are never rewritten; exporting the same
//! summary twice produces two files with different identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::error::{LogError, LogResult};
use crate::store::{generate_id, validate_id, write_new_file, RecordStore};
use crate::summary::{summarize, ProjectSummary};

const REPORT_PREFIX: &str = "report";

/// A persisted snapshot of a [`ProjectSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub summary: ProjectSummary,
}

/// Writes `summary` to a new report file and returns the report id.
pub fn export(
    store: &RecordStore,
    summary: &ProjectSummary,
    generated_at: DateTime<Utc>,
) -> LogResult<String> {
    let id = generate_id(REPORT_PREFIX, generated_at);

    let report = ProjectReport {
        id: id.clone(),
        generated_at,
        summary: summary.clone(),
    };
    let json = serde_json::to_vec_pretty(&report)?;

    let dir = store.reports_dir();
    std::fs::create_dir_all(&dir).map_err(|e| LogError::storage(&dir, e))?;
    let path = report_path(store, &id);
    write_new_file(&path, &json)?;

    info!(
        id = %id,
        meetings = summary.counts.meetings,
        requirement_changes = summary.counts.requirement_changes,
        milestones = summary.counts.milestones,
        "report exported to {}",
        path.display()
    );
    Ok(id)
}

/// Summarizes the trailing window at `now` and exports it in one step.
///
/// The report's summary is exactly what [`summarize`] returns for the same
/// `now` and `window_days`.
pub fn export_window(
    store: &RecordStore,
    now: DateTime<Utc>,
    window_days: i64,
) -> LogResult<ProjectReport> {
    let summary = summarize(store, now, window_days)?;
    let id = export(store, &summary, now)?;
    Ok(ProjectReport {
        id,
        generated_at: now,
        summary,
    })
}

pub fn report_path(store: &RecordStore, id: &str) -> PathBuf {
    store.reports_dir().join(format!("{}.json", id))
}

/// Reads a previously exported report.
pub fn load_report(store: &RecordStore, id: &str) -> LogResult<ProjectReport> {
    validate_id(id)?;
    let path = report_path(store, id);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LogError::invalid(format!("report not found: {}", id)));
        }
        Err(e) => return Err(LogError::storage(&path, e)),
    };
    Ok(serde_json::from_slice(&bytes)?)
}
