//! Ingestion of before/after edit snapshots
//!
//! An agent reports each edit in two steps. The before-snapshot is staged
//! in `pending_edits`; when the after-snapshot arrives the pair is diffed,
//! the results are stored and the staging row is dropped.
//!
//! ## Architecture
//!
//! ```text
//! record_before ──► pending_edits
//!                        │
//! record_after ──────────┴──► extract(before, after)
//!                                   │
//!                                   ├──► session_summaries (upsert)
//!                                   └──► diff_lines
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use linetrace_core::ingest::Recorder;
//! use linetrace_core::Database;
//!
//! let db = Database::open_in_memory()?;
//! db.migrate()?;
//!
//! let recorder = Recorder::new(&db);
//! recorder.record_before("s1", "/repo/main.rs", "a\nb\nc")?;
//! let outcome = recorder.record_after("s1", "/repo/main.rs", "a\nx\nc", None)?;
//! assert_eq!(outcome.modify_lines_count, 1);
//! # Ok::<(), linetrace_core::Error>(())
//! ```

pub mod diff;

pub use diff::{extract, split_lines, summarize};

use crate::db::{Database, DiffStore};
use crate::error::{Error, Result};
use crate::types::{RecordOutcome, SessionSummary};
use chrono::Utc;

/// Records edits into the database.
pub struct Recorder<'a> {
    db: &'a Database,
}

impl<'a> Recorder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Stage the content of `file_path` as it was before an edit.
    ///
    /// A second call for the same (session, file) replaces the staged
    /// snapshot.
    pub fn record_before(&self, session_id: &str, file_path: &str, code_before: &str) -> Result<()> {
        validate_ids(session_id, file_path)?;
        if code_before.is_empty() {
            return Err(Error::InvalidInput("code_before must not be empty".to_string()));
        }

        self.db.save_before_edit(session_id, file_path, code_before)?;
        tracing::info!(session_id, file_path, "Recorded before-edit snapshot");
        Ok(())
    }

    /// Diff `code_after` against the staged snapshot and store the result.
    ///
    /// Fails with [`Error::BeforeEditNotFound`] when nothing was staged.
    pub fn record_after(
        &self,
        session_id: &str,
        file_path: &str,
        code_after: &str,
        session_info: Option<&str>,
    ) -> Result<RecordOutcome> {
        validate_ids(session_id, file_path)?;
        if code_after.is_empty() {
            return Err(Error::InvalidInput("code_after must not be empty".to_string()));
        }

        let code_before = self
            .db
            .get_before_edit(session_id, file_path)?
            .ok_or_else(|| Error::BeforeEditNotFound {
                session_id: session_id.to_string(),
                file_path: file_path.to_string(),
            })?;

        let lines = extract(&code_before, code_after);
        let (add_lines_count, modify_lines_count) = summarize(&lines);
        let total_lines_after = code_after.split('\n').count();

        self.db.upsert_session_summary(&SessionSummary {
            session_id: session_id.to_string(),
            file_path: file_path.to_string(),
            add_lines_count,
            modify_lines_count,
            total_lines_after,
            session_info: session_info.map(str::to_string),
            created_at: Utc::now(),
        })?;

        if let Err(e) = self.db.save_diff_lines(session_id, file_path, &lines) {
            // The summary is already stored; keep it and report the loss.
            tracing::warn!(session_id, file_path, error = %e, "Failed to save diff lines");
        }

        self.db.delete_before_edit(session_id, file_path)?;

        tracing::info!(
            session_id,
            file_path,
            add = add_lines_count,
            modify = modify_lines_count,
            total_diff = lines.len(),
            "Recorded after-edit snapshot"
        );

        Ok(RecordOutcome {
            add_lines_count,
            modify_lines_count,
            total_diff_lines: lines.len(),
            total_lines_after,
        })
    }
}

fn validate_ids(session_id: &str, file_path: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(Error::InvalidInput("session_id must not be empty".to_string()));
    }
    if file_path.trim().is_empty() {
        return Err(Error::InvalidInput("file_path must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DiffLineFilter, SummaryFilter};
    use crate::types::DiffType;

    fn create_test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_record_round_trip() {
        let db = create_test_db();
        let recorder = Recorder::new(&db);

        recorder.record_before("s1", "/r/a.rs", "a\nb").unwrap();
        let outcome = recorder
            .record_after("s1", "/r/a.rs", "a\nb\nc\nd", Some("agent"))
            .unwrap();

        assert_eq!(
            outcome,
            RecordOutcome {
                add_lines_count: 2,
                modify_lines_count: 0,
                total_diff_lines: 2,
                total_lines_after: 4,
            }
        );

        let lines = db.get_diff_lines(&DiffLineFilter::session("s1")).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].diff_type, DiffType::Add);
        assert_eq!(lines[0].line_content, "c");
        assert_eq!(lines[0].line_number, 3);

        let summaries = db.get_session_summaries(&SummaryFilter::session("s1")).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_info.as_deref(), Some("agent"));

        // Staging row consumed
        assert_eq!(db.get_before_edit("s1", "/r/a.rs").unwrap(), None);
    }

    #[test]
    fn test_after_without_before() {
        let db = create_test_db();
        let err = Recorder::new(&db)
            .record_after("s1", "/r/a.rs", "x", None)
            .unwrap_err();
        assert!(matches!(err, Error::BeforeEditNotFound { .. }));
    }

    #[test]
    fn test_second_after_needs_new_before() {
        let db = create_test_db();
        let recorder = Recorder::new(&db);

        recorder.record_before("s1", "/r/a.rs", "a").unwrap();
        recorder.record_after("s1", "/r/a.rs", "a\nb", None).unwrap();
        assert!(recorder.record_after("s1", "/r/a.rs", "a\nb\nc", None).is_err());
    }

    #[test]
    fn test_repeat_edits_accumulate() {
        let db = create_test_db();
        let recorder = Recorder::new(&db);

        recorder.record_before("s1", "/r/a.rs", "a").unwrap();
        recorder.record_after("s1", "/r/a.rs", "a\nb", None).unwrap();
        recorder.record_before("s1", "/r/a.rs", "a\nb").unwrap();
        recorder.record_after("s1", "/r/a.rs", "a\nB", None).unwrap();

        let summaries = db.get_session_summaries(&SummaryFilter::session("s1")).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].add_lines_count, 1);
        assert_eq!(summaries[0].modify_lines_count, 1);
        assert_eq!(summaries[0].total_lines_after, 2);

        let lines = db.get_diff_lines(&DiffLineFilter::file("/r/a.rs")).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_unchanged_edit_stores_summary_only() {
        let db = create_test_db();
        let recorder = Recorder::new(&db);

        recorder.record_before("s1", "/r/a.rs", "same\n").unwrap();
        let outcome = recorder.record_after("s1", "/r/a.rs", "same\n", None).unwrap();

        assert_eq!(outcome.total_diff_lines, 0);
        // Trailing newline yields an empty final segment
        assert_eq!(outcome.total_lines_after, 2);
        assert_eq!(db.get_session_summaries(&SummaryFilter::session("s1")).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_invalid_input() {
        let db = create_test_db();
        let recorder = Recorder::new(&db);

        for result in [
            recorder.record_before("", "/r/a.rs", "x"),
            recorder.record_before("  ", "/r/a.rs", "x"),
            recorder.record_before("s1", " ", "x"),
            recorder.record_before("s1", "/r/a.rs", ""),
        ] {
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }

        recorder.record_before("s1", "/r/a.rs", "x").unwrap();
        let err = recorder.record_after("s1", "/r/a.rs", "", None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        // Rejected call leaves the staged snapshot in place
        assert!(db.get_before_edit("s1", "/r/a.rs").unwrap().is_some());
    }
}
