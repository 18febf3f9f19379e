//! Windowed, best-effort reads over one record kind.
//!
//! [`read_all`] returns a [`RecordScan`]: a lazy, restartable view of every
//! `*.json` file in the kind's directory. Iterating it yields the records
//! whose timestamp is at or after `since`, plus a [`ReadWarning`] for every
//! file that could not be read or parsed. A bad file never aborts the scan.
//!
//! Directory order is whatever the filesystem reports; callers that need a
//! deterministic order use [`RecordScan::collect_sorted`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{LogError, LogResult};
use crate::models::LogRecord;
use crate::store::RecordStore;

/// A file skipped during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWarning {
    /// Path relative to the store root (e.g. `meetings/meeting_x.json`).
    pub file: String,
    pub reason: String,
}

/// One item of a scan: a record in the window, or a skipped file.
pub type ScanItem<R> = Result<R, ReadWarning>;

/// Lazy scan over one kind's directory.
///
/// Cheap to hold; nothing is read until [`RecordScan::iter`] is called, and
/// every call starts a fresh pass over the directory.
#[derive(Debug, Clone)]
pub struct RecordScan<R> {
    root: PathBuf,
    dir: Option<PathBuf>,
    since: DateTime<Utc>,
    _kind: PhantomData<fn() -> R>,
}

/// Records and warnings drained from a scan, records sorted by
/// `(timestamp, id)` ascending.
#[derive(Debug, Clone)]
pub struct ReadOutcome<R> {
    pub records: Vec<R>,
    pub warnings: Vec<ReadWarning>,
}

/// Opens a scan over all records of kind `R` with `timestamp >= since`.
///
/// A kind directory that does not exist yet is an empty scan. A directory
/// that exists but cannot be listed is a storage error.
pub fn read_all<R: LogRecord>(
    store: &RecordStore,
    since: DateTime<Utc>,
) -> LogResult<RecordScan<R>> {
    let dir = store.kind_dir(R::KIND);
    let dir = match std::fs::read_dir(&dir) {
        Ok(_) => Some(dir),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(LogError::storage(&dir, e)),
    };

    Ok(RecordScan {
        root: store.root().to_path_buf(),
        dir,
        since,
        _kind: PhantomData,
    })
}

impl<R: LogRecord> RecordScan<R> {
    /// Starts a new pass over the directory.
    pub fn iter(&self) -> RecordIter<R> {
        let walker = self.dir.as_ref().map(|dir| {
            WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(false)
                .into_iter()
        });
        RecordIter {
            root: self.root.clone(),
            walker,
            since: self.since,
            _kind: PhantomData,
        }
    }

    /// Drains one pass into sorted records plus warnings.
    ///
    /// Every warning is logged.
    pub fn collect_sorted(&self) -> ReadOutcome<R> {
        let mut records = Vec::new();
        let mut warnings = Vec::new();

        for item in self.iter() {
            match item {
                Ok(record) => records.push(record),
                Err(warning) => {
                    warn!(
                        kind = %R::KIND,
                        file = %warning.file,
                        reason = %warning.reason,
                        "skipping unreadable record"
                    );
                    warnings.push(warning);
                }
            }
        }

        records.sort_by(|a: &R, b: &R| {
            a.timestamp()
                .cmp(&b.timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        warnings.sort_by(|a, b| a.file.cmp(&b.file));

        ReadOutcome { records, warnings }
    }
}

impl<'a, R: LogRecord> IntoIterator for &'a RecordScan<R> {
    type Item = ScanItem<R>;
    type IntoIter = RecordIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator produced by [`RecordScan::iter`].
pub struct RecordIter<R> {
    root: PathBuf,
    walker: Option<walkdir::IntoIter>,
    since: DateTime<Utc>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: LogRecord> Iterator for RecordIter<R> {
    type Item = ScanItem<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let walker = self.walker.as_mut()?;

        loop {
            let entry = match walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let file = e
                        .path()
                        .map(|p| relative(&self.root, p))
                        .unwrap_or_else(|| "<unknown>".to_string());
                    return Some(Err(ReadWarning {
                        file,
                        reason: e.to_string(),
                    }));
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }

            match load_record::<R>(path) {
                Ok(record) if record.timestamp() >= self.since => return Some(Ok(record)),
                Ok(_) => continue,
                Err(reason) => {
                    return Some(Err(ReadWarning {
                        file: relative(&self.root, path),
                        reason,
                    }))
                }
            }
        }
    }
}

fn load_record<R: LogRecord>(path: &Path) -> Result<R, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("read failed: {}", e))?;
    let record: R = serde_json::from_slice(&bytes).map_err(|e| format!("parse failed: {}", e))?;
    if record.id().is_empty() {
        return Err("record has no id".to_string());
    }
    Ok(record)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
