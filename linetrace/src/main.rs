//! linetrace - track how much AI-proposed code survives in your files
//!
//! Agents call `record-before` and `record-after` around each edit; the
//! query commands then report how many of the proposed lines are still
//! present in the files today.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/linetrace/data.db (~/.local/share/linetrace/data.db)
//! - Config: $XDG_CONFIG_HOME/linetrace/config.toml (~/.config/linetrace/config.toml)
//! - Logs: $XDG_STATE_HOME/linetrace/linetrace.log (~/.local/state/linetrace/linetrace.log)

mod report;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use linetrace_core::db::resolve_path;
use linetrace_core::{
    export, retention, Config, Database, ExportFormat, LocalFiles, MetricsContext, MetricsReport,
    Recorder, Scope, SummaryFilter, TimeWindow,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "linetrace")]
#[command(about = "Track how much AI-proposed code survives in your files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stage a file's content before an AI edit
    RecordBefore {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// Path of the file being edited
        #[arg(long)]
        file: PathBuf,

        /// Read the content from this file instead of stdin
        #[arg(long)]
        content_file: Option<PathBuf>,
    },

    /// Record a file's content after an AI edit and store the diff
    RecordAfter {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// Path of the edited file
        #[arg(long)]
        file: PathBuf,

        /// Free-form session context (agent name, prompt, ...)
        #[arg(long)]
        info: Option<String>,

        /// Read the content from this file instead of stdin
        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Adoption metrics for one session
    Session {
        id: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Adoption metrics for one file across all sessions
    File {
        path: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Adoption metrics for every file under a directory
    Project {
        root: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Adoption metrics across everything recorded
    Global {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List recorded sessions, most recently active first
    Sessions {
        #[command(flatten)]
        window: WindowArgs,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compare adoption metrics of two or more sessions side by side
    Compare {
        #[arg(required = true, num_args = 2..)]
        sessions: Vec<String>,

        #[command(flatten)]
        window: WindowArgs,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete every recorded edit of the given sessions
    Delete {
        #[arg(required = true)]
        sessions: Vec<String>,
    },

    /// Delete recorded edits older than the retention period
    Cleanup {
        /// Retention in days (default: from config)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(ClapArgs)]
struct OutputArgs {
    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Also write the report to this file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Export format: json (default) or csv
    #[arg(long, default_value = "json")]
    export_format: String,

    /// Show the individual diff lines (text format only)
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    window: WindowArgs,
}

#[derive(ClapArgs)]
struct WindowArgs {
    /// Only count edits recorded at or after this time (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_since)]
    since: Option<DateTime<Utc>>,

    /// Only count edits recorded at or before this time (RFC 3339 or YYYY-MM-DD, whole day)
    #[arg(long, value_parser = parse_until)]
    until: Option<DateTime<Utc>>,
}

impl WindowArgs {
    fn window(&self) -> TimeWindow {
        TimeWindow::new(self.since, self.until)
    }
}

fn parse_since(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_time(value, NaiveTime::from_hms_opt(0, 0, 0))
}

fn parse_until(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_time(value, NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999))
}

/// RFC 3339 timestamps are taken as given; bare dates get `time_of_day` in UTC.
fn parse_time(
    value: &str,
    time_of_day: Option<NaiveTime>,
) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("expected RFC 3339 or YYYY-MM-DD, got '{}'", value))?;
    let time_of_day = time_of_day.ok_or_else(|| "invalid time of day".to_string())?;
    Ok(Utc.from_utc_datetime(&date.and_time(time_of_day)))
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        linetrace_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = config.resolved_database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match args.command {
        Command::RecordBefore {
            session,
            file,
            content_file,
        } => cmd_record_before(&db, &session, &file, content_file.as_deref()),
        Command::RecordAfter {
            session,
            file,
            info,
            content_file,
            format,
        } => cmd_record_after(
            &db,
            &session,
            &file,
            info.as_deref(),
            content_file.as_deref(),
            &format,
        ),
        Command::Session { id, output } => cmd_metrics(db, &config, Scope::Session(id), &output),
        Command::File { path, output } => {
            cmd_metrics(db, &config, Scope::File(file_key(&path)), &output)
        }
        Command::Project { root, output } => {
            cmd_metrics(db, &config, Scope::Project(resolve_path(&root)), &output)
        }
        Command::Global { output } => cmd_metrics(db, &config, Scope::Global, &output),
        Command::Sessions { window, format } => cmd_sessions(&db, &window, &format),
        Command::Compare {
            sessions,
            window,
            format,
        } => cmd_compare(db, &config, &sessions, &window, &format),
        Command::Delete { sessions } => cmd_delete(&db, &sessions),
        Command::Cleanup { days } => cmd_cleanup(&db, days.unwrap_or(config.storage.retention_days)),
    }
}

/// Files are stored under their resolved absolute path so that every
/// scope (and the later file read) agrees on one key.
fn file_key(path: &Path) -> String {
    resolve_path(path).display().to_string()
}

fn read_content(content_file: Option<&Path>) -> Result<String> {
    match content_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read content from stdin")?;
            Ok(content)
        }
    }
}

fn cmd_record_before(
    db: &Database,
    session: &str,
    file: &Path,
    content_file: Option<&Path>,
) -> Result<()> {
    let content = read_content(content_file)?;
    let file_path = file_key(file);

    Recorder::new(db)
        .record_before(session, &file_path, &content)
        .context("failed to record before-edit snapshot")?;

    println!("Recorded before-edit snapshot for {}", file_path);
    Ok(())
}

fn cmd_record_after(
    db: &Database,
    session: &str,
    file: &Path,
    info: Option<&str>,
    content_file: Option<&Path>,
    format: &str,
) -> Result<()> {
    let content = read_content(content_file)?;
    let file_path = file_key(file);

    let outcome = Recorder::new(db)
        .record_after(session, &file_path, &content, info)
        .context("failed to record after-edit snapshot")?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!(
            "Recorded {} added, {} modified ({} diff lines, {} lines after edit)",
            outcome.add_lines_count,
            outcome.modify_lines_count,
            outcome.total_diff_lines,
            outcome.total_lines_after
        );
    }
    Ok(())
}

fn cmd_metrics(db: Database, config: &Config, scope: Scope, output: &OutputArgs) -> Result<()> {
    tracing::debug!(scope = %scope, "Running metrics query");
    let ctx = MetricsContext::from_config(Arc::new(db), Arc::new(LocalFiles), &config.metrics);

    let report = ctx
        .compute_within(&scope, &output.window.window())
        .with_context(|| format!("failed to compute metrics for {}", scope))?;

    if let Some(ref path) = output.export {
        let export_format: ExportFormat = output.export_format.parse()?;
        export::export(&report, path, export_format)
            .with_context(|| format!("failed to export report to {}", path.display()))?;
        eprintln!("Exported {} report to {}", export_format.as_str(), path.display());
    }

    print_report(&report, &output.format, output.verbose)
}

fn print_report(report: &MetricsReport, format: &str, verbose: bool) -> Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report::render_text(report, verbose));
    }
    Ok(())
}

fn cmd_sessions(db: &Database, window: &WindowArgs, format: &str) -> Result<()> {
    let sessions = db
        .list_sessions(&SummaryFilter::default().within(window.window()))
        .context("failed to list sessions")?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else {
        print!("{}", report::render_sessions(&sessions));
    }
    Ok(())
}

fn cmd_compare(
    db: Database,
    config: &Config,
    sessions: &[String],
    window: &WindowArgs,
    format: &str,
) -> Result<()> {
    let ctx = MetricsContext::from_config(Arc::new(db), Arc::new(LocalFiles), &config.metrics);
    let window = window.window();

    let reports = sessions
        .iter()
        .map(|id| {
            ctx.compute_within(&Scope::Session(id.clone()), &window)
                .with_context(|| format!("failed to compute metrics for session {}", id))
        })
        .collect::<Result<Vec<_>>>()?;

    if format == "json" {
        let rows: Vec<serde_json::Value> = sessions
            .iter()
            .zip(&reports)
            .map(|(id, report)| serde_json::json!({ "session_id": id, "metrics": report.metrics }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", report::render_comparison(sessions, &reports));
    }
    Ok(())
}

fn cmd_delete(db: &Database, sessions: &[String]) -> Result<()> {
    let deleted = db
        .delete_sessions(sessions)
        .context("failed to delete sessions")?;
    println!("Deleted {} session record(s)", deleted);
    Ok(())
}

fn cmd_cleanup(db: &Database, days: u32) -> Result<()> {
    let deleted = retention::cleanup(db, days, Utc::now()).context("cleanup failed")?;
    println!(
        "Deleted {} session record(s) older than {} day(s)",
        deleted, days
    );

    let (pending, summaries, diff_lines) = db.get_total_counts()?;
    println!(
        "Remaining: {} session record(s), {} diff line(s), {} pending snapshot(s)",
        summaries, diff_lines, pending
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_dates_cover_the_whole_day() {
        let since = parse_since("2024-03-01").unwrap();
        let until = parse_until("2024-03-01").unwrap();
        assert_eq!(since.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(until.format("%H:%M:%S%.6f").to_string(), "23:59:59.999999");
    }

    #[test]
    fn test_rfc3339_is_normalised_to_utc() {
        let ts = parse_since("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert!(parse_until("last tuesday").is_err());
    }
}
