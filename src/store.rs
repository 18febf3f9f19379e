//! Append-only record store.
//!
//! Each record is one pretty-printed JSON file at
//! `<root>/<kind dir>/<id>.json`. Files are created with create-new
//! semantics, so a write can never clobber an earlier record, and the bytes
//! are fully serialized before the file is opened.
//!
//! # Layout
//!
//! ```text
//! <root>/project.json
//! <root>/meetings/meeting_20260301_093000_0001_1a2b3c4d.json
//! <root>/requirements/requirement_....json
//! <root>/milestones/milestone_....json
//! <root>/reports/report_....json
//! ```
//!
//! # Identifiers
//!
//! Generated identifiers are `<prefix>_<YYYYMMDD_HHMMSS>_<seq>_<rand8>`:
//! a second-resolution timestamp, a process-wide monotonic sequence number
//! and eight hex characters of a v4 UUID. Two writers in the same process
//! never collide; writers in different processes would have to draw the same
//! random suffix in the same second with the same sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{LogError, LogResult};
use crate::models::{LogRecord, RecordKind};

const METADATA_FILE: &str = "project.json";
const REPORTS_DIR: &str = "reports";

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Project-level metadata written once by [`RecordStore::init`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_name: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

/// Handle to an on-disk project log.
///
/// Holds nothing but the root path; every operation goes straight to the
/// filesystem.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.storage.root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    pub fn record_path(&self, kind: RecordKind, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.json", id))
    }

    /// Creates the directory layout and `project.json`.
    ///
    /// Idempotent: existing metadata is returned untouched.
    pub fn init(&self, project_name: &str) -> LogResult<ProjectMetadata> {
        if project_name.trim().is_empty() {
            return Err(LogError::invalid("project name must not be empty"));
        }

        for kind in RecordKind::ALL {
            let dir = self.kind_dir(kind);
            std::fs::create_dir_all(&dir).map_err(|e| LogError::storage(&dir, e))?;
        }
        let reports = self.reports_dir();
        std::fs::create_dir_all(&reports).map_err(|e| LogError::storage(&reports, e))?;

        if let Some(existing) = self.metadata()? {
            debug!(root = %self.root.display(), "project log already initialized");
            return Ok(existing);
        }

        let metadata = ProjectMetadata {
            project_name: project_name.to_string(),
            created_at: Utc::now(),
            status: "Active".to_string(),
        };
        let bytes = serde_json::to_vec_pretty(&metadata)?;
        write_new_file(&self.root.join(METADATA_FILE), &bytes)?;
        info!(root = %self.root.display(), project = project_name, "project log initialized");
        Ok(metadata)
    }

    /// Reads `project.json`, or `None` if the store was never initialized.
    pub fn metadata(&self) -> LogResult<Option<ProjectMetadata>> {
        let path = self.root.join(METADATA_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LogError::storage(&path, e)),
        }
    }

    /// Persists a record and returns its identifier.
    ///
    /// An empty `id` is replaced with a generated one. A caller-supplied id
    /// must be a plain file stem and must not exist yet.
    pub fn write<R: LogRecord>(&self, mut record: R) -> LogResult<String> {
        record.validate()?;

        if record.id().is_empty() {
            record.set_id(generate_id(R::KIND.id_prefix(), Utc::now()));
        } else {
            validate_id(record.id())?;
        }

        let id = record.id().to_string();
        let bytes = serde_json::to_vec_pretty(&record)?;

        let dir = self.kind_dir(R::KIND);
        std::fs::create_dir_all(&dir).map_err(|e| LogError::storage(&dir, e))?;
        write_new_file(&self.record_path(R::KIND, &id), &bytes)?;

        info!(kind = %R::KIND, id = %id, "record written");
        Ok(id)
    }
}

/// Builds a new identifier with the given prefix.
pub(crate) fn generate_id(prefix: &str, now: DateTime<Utc>) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{:04}_{}",
        prefix,
        now.format("%Y%m%d_%H%M%S"),
        seq,
        &suffix[..8]
    )
}

/// Identifiers become file names, so only `[A-Za-z0-9_-]` is allowed.
pub(crate) fn validate_id(id: &str) -> LogResult<()> {
    if id.is_empty() || id.len() > 128 {
        return Err(LogError::invalid("identifier must be 1-128 characters"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LogError::invalid(format!(
            "identifier '{}' may only contain letters, digits, '-' and '_'",
            id
        )));
    }
    Ok(())
}

/// Creates `path` and writes `bytes` to it, refusing to replace an existing
/// file. A failed write removes the partial file.
pub(crate) fn write_new_file(path: &Path, bytes: &[u8]) -> LogResult<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(LogError::invalid(format!(
                "{} already exists",
                path.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string())
            )));
        }
        Err(e) => return Err(LogError::storage(path, e)),
    };

    if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(LogError::storage(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeetingRecord, MilestoneRecord, MilestoneStatus};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn meeting(participants: &[&str]) -> MeetingRecord {
        MeetingRecord {
            id: String::new(),
            timestamp: Utc::now(),
            participants: participants.iter().map(|s| s.to_string()).collect(),
            key_discussions: vec!["Storage layout".into()],
            action_items: vec![],
            decisions: vec!["Use local storage".into()],
            next_steps: vec![],
        }
    }

    #[test]
    fn write_creates_one_file_under_kind_dir() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());

        let id = store.write(meeting(&["Alice", "Bob"])).unwrap();
        assert!(id.starts_with("meeting_"));

        let path = store.record_path(RecordKind::Meeting, &id);
        assert!(path.exists());
        let saved: MeetingRecord =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(saved.id, id);
        assert_eq!(saved.participants, vec!["Alice", "Bob"]);

        let files = std::fs::read_dir(store.kind_dir(RecordKind::Meeting))
            .unwrap()
            .count();
        assert_eq!(files, 1);
    }

    #[test]
    fn generated_ids_are_unique() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());

        let mut ids = HashSet::new();
        for _ in 0..200 {
            let id = store.write(meeting(&["Alice"])).unwrap();
            assert!(ids.insert(id), "duplicate identifier generated");
        }
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn supplied_id_is_kept_and_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());

        let mut first = meeting(&["Alice"]);
        first.id = "kickoff".into();
        assert_eq!(store.write(first).unwrap(), "kickoff");

        let mut second = meeting(&["Mallory"]);
        second.id = "kickoff".into();
        let err = store.write(second).unwrap_err();
        assert!(err.is_client_error());

        let saved: MeetingRecord = serde_json::from_slice(
            &std::fs::read(store.record_path(RecordKind::Meeting, "kickoff")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved.participants, vec!["Alice"]);
    }

    #[test]
    fn path_like_ids_are_rejected_before_io() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());

        let mut m = meeting(&["Alice"]);
        m.id = "../escape".into();
        assert!(matches!(
            store.write(m).unwrap_err(),
            LogError::InvalidArgument(_)
        ));
        assert!(!store.kind_dir(RecordKind::Meeting).exists());
    }

    #[test]
    fn invalid_record_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());

        let ms = MilestoneRecord {
            id: String::new(),
            timestamp: Utc::now(),
            name: "   ".into(),
            description: String::new(),
            status: MilestoneStatus::Planned,
            completion_date: None,
            key_achievements: vec![],
        };
        assert!(store.write(ms).unwrap_err().is_client_error());
        assert!(!store.kind_dir(RecordKind::Milestone).exists());
    }

    #[test]
    fn kinds_do_not_share_directories() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());

        store.write(meeting(&["Alice"])).unwrap();
        let ms_id = store
            .write(MilestoneRecord {
                id: String::new(),
                timestamp: Utc::now(),
                name: "Alpha".into(),
                description: String::new(),
                status: MilestoneStatus::Completed,
                completion_date: None,
                key_achievements: vec!["Design done".into()],
            })
            .unwrap();

        assert!(ms_id.starts_with("milestone_"));
        assert!(store.record_path(RecordKind::Milestone, &ms_id).exists());
        assert!(!store.record_path(RecordKind::Meeting, &ms_id).exists());
    }

    #[test]
    fn init_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path().join("log"));

        assert!(store.metadata().unwrap().is_none());
        let first = store.init("Confidant").unwrap();
        let second = store.init("Renamed").unwrap();
        assert_eq!(first, second);
        assert_eq!(second.project_name, "Confidant");
        assert_eq!(second.status, "Active");

        for kind in RecordKind::ALL {
            assert!(store.kind_dir(kind).is_dir());
        }
        assert!(store.reports_dir().is_dir());
    }

    #[test]
    fn id_format_carries_prefix_and_timestamp() {
        let now = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 3, 1, 9, 30, 0).unwrap();
        let id = generate_id("report", now);
        assert!(id.starts_with("report_20260301_093000_"), "got {}", id);
        assert!(validate_id(&id).is_ok());
    }
}
