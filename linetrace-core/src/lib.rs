//! # linetrace-core
//!
//! Core library for linetrace - a tracker for how much AI-written code
//! survives in a codebase.
//!
//! This library provides:
//! - Line-level diff extraction between before/after snapshots
//! - LCS-based adoption metrics per session, file, project or globally
//! - Database storage layer with SQLite
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows in two phases:
//! - **Record:** an agent stages a file's content before editing it, then
//!   reports the content after; the added/modified lines are stored.
//! - **Measure:** on demand, stored lines are matched against the files as
//!   they are now to see how many survived.
//!
//! ## Example
//!
//! ```rust,no_run
//! use linetrace_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use analytics::MetricsContext;
pub use config::Config;
pub use db::{Database, DiffLineFilter, DiffStore, SummaryFilter};
pub use error::{Error, Result};
pub use export::ExportFormat;
pub use files::{FileReader, LocalFiles};
pub use ingest::Recorder;
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod files;
pub mod ingest;
pub mod logging;
pub mod retention;
pub mod types;
