//! # Project Log
//!
//! A local project-management log: meetings, requirement changes and
//! milestones are written as individual JSON files, then read back over a
//! trailing time window to build summaries and exportable reports. A small
//! HTTP API and a chat page sit on top, the latter relaying questions to an
//! external completion service with the recent project context attached.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌────────────┐   ┌──────────┐
//! │  Record  │──▶│ Log Reader  │──▶│ Aggregator │──▶│ Exporter │
//! │  Store   │   │ (windowed)  │   │ (summary)  │   │ (report) │
//! └────▲─────┘   └─────────────┘   └─────┬──────┘   └──────────┘
//!      │                                 │
//!      │         ┌──────────┐      ┌─────▼──────┐
//!      └─────────│ CLI/HTTP │◀────▶│ Chat relay │
//!                └──────────┘      └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! plog init
//! plog meeting --participant Alice --participant Bob --decision "Use local storage"
//! plog summary --days 30
//! plog report --days 7
//! plog serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Record types |
//! | [`store`] | Append-only record persistence |
//! | [`reader`] | Windowed, best-effort reads |
//! | [`summary`] | Project summaries and chat context |
//! | [`export`] | Report snapshots |
//! | [`chat`] | Completion provider relay |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |

pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod reader;
pub mod server;
pub mod store;
pub mod summary;
