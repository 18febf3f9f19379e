//! # Project Log CLI (`plog`)
//!
//! Logs meetings, requirement changes and milestones, prints summaries,
//! exports reports and starts the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! plog --config ./config/plog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `plog init` | Create the directory layout and `project.json` |
//! | `plog meeting` | Log a meeting |
//! | `plog requirement` | Log a requirement change |
//! | `plog milestone` | Log a milestone |
//! | `plog summary` | Print the summary of the trailing window |
//! | `plog report` | Export the summary to `reports/` |
//! | `plog context` | Print the chat context, or records matching a term |
//! | `plog serve` | Start the HTTP server and chat page |

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use project_log::commands;
use project_log::config;
use project_log::logging::init_tracing;
use project_log::models::{
    parse_timestamp, MeetingRecord, MilestoneRecord, MilestoneStatus, RequirementChangeRecord,
};
use project_log::server;

/// Project Log CLI: a local log of meetings, requirement changes and
/// milestones with windowed summaries.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/plog.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "plog",
    about = "Project Log: record meetings, requirement changes and milestones, then summarize them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/plog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the directory layout and project metadata.
    ///
    /// Idempotent: an existing `project.json` is left untouched. Without a
    /// config file the log is created under `./project_logs`.
    Init {
        /// Project name; defaults to `[storage].project_name`.
        #[arg(long)]
        name: Option<String>,
    },

    /// Log a meeting.
    Meeting {
        /// Participant (repeatable, at least one).
        #[arg(long = "participant", required = true)]
        participants: Vec<String>,
        #[arg(long = "discussion")]
        discussions: Vec<String>,
        #[arg(long = "action-item")]
        action_items: Vec<String>,
        #[arg(long = "decision")]
        decisions: Vec<String>,
        #[arg(long = "next-step")]
        next_steps: Vec<String>,
        /// Meeting time (RFC 3339, or naive ISO taken as UTC); defaults to now.
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
    },

    /// Log a requirement change.
    Requirement {
        /// Change entry (repeatable, at least one).
        #[arg(long = "change", required = true)]
        changes: Vec<String>,
        #[arg(long, default_value = "General")]
        category: String,
        #[arg(long, default_value = "")]
        rationale: String,
        #[arg(long = "impact")]
        impact: Vec<String>,
        #[arg(long, default_value = "Unknown")]
        proposed_by: String,
        /// Change time (RFC 3339, or naive ISO taken as UTC); defaults to now.
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
    },

    /// Log a milestone.
    Milestone {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Planned, Pending, "In Progress" or Completed.
        #[arg(long, default_value = "Pending")]
        status: MilestoneStatus,
        /// Completion date (YYYY-MM-DD).
        #[arg(long)]
        completion_date: Option<NaiveDate>,
        #[arg(long = "achievement")]
        achievements: Vec<String>,
        /// Milestone time (RFC 3339, or naive ISO taken as UTC); defaults to now.
        #[arg(long, value_parser = parse_timestamp)]
        at: Option<DateTime<Utc>>,
    },

    /// Print the summary of the trailing window.
    Summary {
        /// Window length in days; defaults to `[summary].default_window_days`.
        #[arg(long)]
        days: Option<i64>,
        /// Print the full summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export the summary of the trailing window to a new report file.
    Report {
        #[arg(long)]
        days: Option<i64>,
    },

    /// Print the chat context, or the records mentioning a term.
    Context {
        #[arg(long)]
        category: Option<String>,
    },

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the API and the chat page.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    // `init` works before any config exists; everything else needs one.
    let cfg = match &cli.command {
        Commands::Init { .. } if !cli.config.exists() => {
            warn!(
                config = %cli.config.display(),
                root = config::DEFAULT_STORAGE_ROOT,
                "config file not found, initializing with defaults"
            );
            config::Config::minimal(config::DEFAULT_STORAGE_ROOT)
        }
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Init { name } => {
            commands::run_init(&cfg, name.as_deref())?;
        }
        Commands::Meeting {
            participants,
            discussions,
            action_items,
            decisions,
            next_steps,
            at,
        } => {
            commands::run_log(
                &cfg,
                MeetingRecord {
                    id: String::new(),
                    timestamp: at.unwrap_or_else(Utc::now),
                    participants,
                    key_discussions: discussions,
                    action_items,
                    decisions,
                    next_steps,
                },
            )?;
        }
        Commands::Requirement {
            changes,
            category,
            rationale,
            impact,
            proposed_by,
            at,
        } => {
            commands::run_log(
                &cfg,
                RequirementChangeRecord {
                    id: String::new(),
                    timestamp: at.unwrap_or_else(Utc::now),
                    category,
                    changes,
                    rationale,
                    impact,
                    proposed_by,
                },
            )?;
        }
        Commands::Milestone {
            name,
            description,
            status,
            completion_date,
            achievements,
            at,
        } => {
            commands::run_log(
                &cfg,
                MilestoneRecord {
                    id: String::new(),
                    timestamp: at.unwrap_or_else(Utc::now),
                    name,
                    description,
                    status,
                    completion_date,
                    key_achievements: achievements,
                },
            )?;
        }
        Commands::Summary { days, json } => {
            commands::run_summary(&cfg, days, json)?;
        }
        Commands::Report { days } => {
            commands::run_report(&cfg, days)?;
        }
        Commands::Context { category } => {
            commands::run_context(&cfg, category.as_deref())?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
