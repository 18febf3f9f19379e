//! Command implementations behind the `plog` binary.
//!
//! Each function loads nothing itself: it receives the parsed [`Config`],
//! calls into the core modules and prints to stdout.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::Config;
use crate::export::{export_window, report_path};
use crate::models::LogRecord;
use crate::store::RecordStore;
use crate::summary::{filter_by_term, render_context, summarize, ProjectSummary};

pub fn run_init(config: &Config, project_name: Option<&str>) -> Result<()> {
    let store = RecordStore::from_config(config);
    let name = project_name.unwrap_or(&config.storage.project_name);
    let metadata = store
        .init(name)
        .with_context(|| format!("Failed to initialize {}", store.root().display()))?;

    println!(
        "Project log '{}' ready at {}",
        metadata.project_name,
        store.root().display()
    );
    Ok(())
}

pub fn run_log<R: LogRecord>(config: &Config, record: R) -> Result<()> {
    let store = RecordStore::from_config(config);
    let id = store.write(record)?;
    println!("Logged {} {}", R::KIND, id);
    Ok(())
}

pub fn run_summary(config: &Config, days: Option<i64>, json: bool) -> Result<()> {
    let store = RecordStore::from_config(config);
    let days = days.unwrap_or(config.summary.default_window_days);
    let summary = summarize(&store, Utc::now(), days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

pub fn run_report(config: &Config, days: Option<i64>) -> Result<()> {
    let store = RecordStore::from_config(config);
    let days = days.unwrap_or(config.summary.default_window_days);
    let report = export_window(&store, Utc::now(), days)?;

    println!("Report {} written", report.id);
    println!("  path: {}", report_path(&store, &report.id).display());
    println!(
        "  meetings: {}  requirement changes: {}  milestones: {}",
        report.summary.counts.meetings,
        report.summary.counts.requirement_changes,
        report.summary.counts.milestones
    );
    Ok(())
}

pub fn run_context(config: &Config, category: Option<&str>) -> Result<()> {
    let store = RecordStore::from_config(config);
    let summary = summarize(&store, Utc::now(), config.summary.default_window_days)?;

    match category {
        Some(term) => {
            let filtered = filter_by_term(&summary, term)?;
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        None => println!("{}", render_context(&summary)),
    }
    Ok(())
}

fn print_summary(summary: &ProjectSummary) {
    println!("{} ({})", summary.project_name, summary.summary_period);
    println!(
        "  window: {} .. {}",
        summary.window.start.format("%Y-%m-%d %H:%M"),
        summary.window.end.format("%Y-%m-%d %H:%M")
    );
    println!(
        "  meetings: {}  requirement changes: {}  milestones: {}",
        summary.counts.meetings, summary.counts.requirement_changes, summary.counts.milestones
    );

    print_list("Decisions", &summary.decisions);
    print_list("Action items", &summary.action_items);
    print_list("Rationales", &summary.rationales);
    print_list("Achievements", &summary.achievements);

    if !summary.read_warnings.is_empty() {
        println!();
        println!("Skipped files:");
        for w in &summary.read_warnings {
            println!("  {}: {}", w.file, w.reason);
        }
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeetingRecord, RecordKind};
    use tempfile::TempDir;

    #[test]
    fn commands_run_against_minimal_config() {
        let tmp = TempDir::new().unwrap();
        let cfg = Config::minimal(tmp.path().join("logs"));

        run_init(&cfg, Some("Confidant")).unwrap();
        run_log(
            &cfg,
            MeetingRecord {
                id: String::new(),
                timestamp: Utc::now(),
                participants: vec!["Alice".into()],
                key_discussions: vec![],
                action_items: vec![],
                decisions: vec![],
                next_steps: vec![],
            },
        )
        .unwrap();
        run_summary(&cfg, Some(7), false).unwrap();
        run_report(&cfg, None).unwrap();
        run_context(&cfg, Some("alice")).unwrap();

        let store = RecordStore::from_config(&cfg);
        let meetings = std::fs::read_dir(store.kind_dir(RecordKind::Meeting)).unwrap();
        assert_eq!(meetings.count(), 1);
        assert_eq!(std::fs::read_dir(store.reports_dir()).unwrap().count(), 1);

        assert!(run_summary(&cfg, Some(-3), false).is_err());
        assert!(run_context(&cfg, Some("  ")).is_err());
    }
}
