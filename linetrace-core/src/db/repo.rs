//! Database repository layer
//!
//! Provides query and insert operations for pending edits, session
//! summaries and diff lines.

use super::store::{is_under, DiffLineFilter, DiffStore, SummaryFilter};
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    // A panic while holding the lock leaves SQLite itself consistent, so a
    // poisoned mutex is still usable.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Pending edit operations
    // ============================================

    /// Stage the before-snapshot of an edit, replacing any earlier one
    /// for the same (session, file).
    pub fn save_before_edit(&self, session_id: &str, file_path: &str, code_before: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO pending_edits (session_id, file_path, code_before, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id, file_path) DO UPDATE SET
                code_before = excluded.code_before,
                created_at = excluded.created_at
            "#,
            params![session_id, file_path, code_before, format_timestamp(Utc::now())],
        )?;
        tracing::debug!(session_id, file_path, "Saved before-edit snapshot");
        Ok(())
    }

    /// Fetch a staged before-snapshot
    pub fn get_before_edit(&self, session_id: &str, file_path: &str) -> Result<Option<String>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT code_before FROM pending_edits WHERE session_id = ?1 AND file_path = ?2",
            params![session_id, file_path],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    /// Drop a staged before-snapshot. Returns whether a row existed.
    pub fn delete_before_edit(&self, session_id: &str, file_path: &str) -> Result<bool> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM pending_edits WHERE session_id = ?1 AND file_path = ?2",
            params![session_id, file_path],
        )?;
        Ok(deleted > 0)
    }

    // ============================================
    // Session summary operations
    // ============================================

    /// Insert or update the summary for a (session, file).
    ///
    /// Repeat edits of the same file in the same session accumulate their
    /// add/modify counts; `total_lines_after` reflects the latest edit.
    pub fn upsert_session_summary(&self, summary: &SessionSummary) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO session_summaries (session_id, file_path, add_lines_count, modify_lines_count,
                                           total_lines_after, session_info, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(session_id, file_path) DO UPDATE SET
                add_lines_count = session_summaries.add_lines_count + excluded.add_lines_count,
                modify_lines_count = session_summaries.modify_lines_count + excluded.modify_lines_count,
                total_lines_after = excluded.total_lines_after,
                session_info = COALESCE(excluded.session_info, session_summaries.session_info)
            "#,
            params![
                summary.session_id,
                summary.file_path,
                summary.add_lines_count as i64,
                summary.modify_lines_count as i64,
                summary.total_lines_after as i64,
                summary.session_info,
                format_timestamp(summary.created_at),
            ],
        )?;
        Ok(())
    }

    /// Query session summaries, newest first
    pub fn get_session_summaries(&self, filter: &SummaryFilter) -> Result<Vec<SessionSummary>> {
        let conn = self.lock();

        let mut sql = String::from(
            "SELECT session_id, file_path, add_lines_count, modify_lines_count, \
             total_lines_after, session_info, created_at FROM session_summaries WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(session_id) = &filter.session_id {
            sql.push_str(" AND session_id = ?");
            params.push(Box::new(session_id.clone()));
        }

        if let Some(file_path) = &filter.file_path {
            sql.push_str(" AND file_path = ?");
            params.push(Box::new(file_path.clone()));
        }

        if let Some(since) = &filter.window.since {
            sql.push_str(" AND created_at >= ?");
            params.push(Box::new(format_timestamp(*since)));
        }

        if let Some(until) = &filter.window.until {
            sql.push_str(" AND created_at <= ?");
            params.push(Box::new(format_timestamp(*until)));
        }

        sql.push_str(" ORDER BY created_at DESC, session_id ASC, file_path ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let summaries = stmt
            .query_map(params_refs.as_slice(), Self::row_to_summary)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Path containment has no reliable SQL form (symlinks, `..`), so the
        // project prefix is applied here.
        Ok(match &filter.project_prefix {
            Some(root) => summaries
                .into_iter()
                .filter(|s| is_under(Path::new(&s.file_path), root))
                .collect(),
            None => summaries,
        })
    }

    fn row_to_summary(row: &Row) -> rusqlite::Result<SessionSummary> {
        let created_at_str: String = row.get("created_at")?;
        Ok(SessionSummary {
            session_id: row.get("session_id")?,
            file_path: row.get("file_path")?,
            add_lines_count: row.get::<_, i64>("add_lines_count")?.max(0) as usize,
            modify_lines_count: row.get::<_, i64>("modify_lines_count")?.max(0) as usize,
            total_lines_after: row.get::<_, i64>("total_lines_after")?.max(0) as usize,
            session_info: row.get("session_info")?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    /// Distinct sessions among the summaries matching `filter`, most
    /// recently active first.
    pub fn list_sessions(&self, filter: &SummaryFilter) -> Result<Vec<SessionListing>> {
        let summaries = self.get_session_summaries(filter)?;

        let mut sessions: Vec<SessionListing> = Vec::new();
        // Summaries arrive newest first, so the first hit per session is its latest.
        for summary in summaries {
            match sessions
                .iter_mut()
                .find(|s| s.session_id == summary.session_id)
            {
                Some(listing) => {
                    listing.file_count += 1;
                    listing.add_lines_count += summary.add_lines_count;
                    listing.modify_lines_count += summary.modify_lines_count;
                    listing.first_seen = listing.first_seen.min(summary.created_at);
                    if listing.session_info.is_none() {
                        listing.session_info = summary.session_info;
                    }
                }
                None => sessions.push(SessionListing {
                    session_id: summary.session_id,
                    session_info: summary.session_info,
                    file_count: 1,
                    add_lines_count: summary.add_lines_count,
                    modify_lines_count: summary.modify_lines_count,
                    first_seen: summary.created_at,
                    last_seen: summary.created_at,
                }),
            }
        }

        Ok(sessions)
    }

    /// Delete the given sessions and their diff lines. Returns summaries deleted.
    pub fn delete_sessions(&self, session_ids: &[String]) -> Result<usize> {
        if session_ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for session_id in session_ids {
            tx.execute("DELETE FROM diff_lines WHERE session_id = ?1", [session_id])?;
            deleted += tx.execute(
                "DELETE FROM session_summaries WHERE session_id = ?1",
                [session_id],
            )?;
        }
        tx.commit()?;

        tracing::info!(deleted, "Deleted session records");
        Ok(deleted)
    }

    /// Delete summaries (and their diff lines) created before `cutoff`.
    pub fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = format_timestamp(cutoff);

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            DELETE FROM diff_lines
            WHERE EXISTS (
                SELECT 1 FROM session_summaries s
                WHERE s.session_id = diff_lines.session_id
                  AND s.file_path = diff_lines.file_path
                  AND s.created_at < ?1
            )
            "#,
            [&cutoff],
        )?;
        let deleted = tx.execute(
            "DELETE FROM session_summaries WHERE created_at < ?1",
            [&cutoff],
        )?;
        tx.commit()?;

        tracing::info!(deleted, cutoff = %cutoff, "Deleted expired session records");
        Ok(deleted)
    }

    // ============================================
    // Diff line operations
    // ============================================

    /// Insert diff lines for one edit in a transaction
    pub fn insert_diff_lines(
        &self,
        session_id: &str,
        file_path: &str,
        lines: &[ProposedLine],
    ) -> Result<usize> {
        if lines.is_empty() {
            return Ok(0);
        }

        let created_at = format_timestamp(Utc::now());
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO diff_lines (session_id, file_path, diff_type, line_content, line_number, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for line in lines {
                stmt.execute(params![
                    session_id,
                    file_path,
                    line.diff_type.as_str(),
                    line.line_content,
                    line.line_number as i64,
                    created_at,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(session_id, file_path, count = lines.len(), "Saved diff lines");
        Ok(lines.len())
    }

    /// Query diff lines ordered by line number
    pub fn get_diff_lines(&self, filter: &DiffLineFilter) -> Result<Vec<DiffLine>> {
        let conn = self.lock();

        let mut sql = String::from(
            "SELECT id, session_id, file_path, diff_type, line_content, line_number, created_at \
             FROM diff_lines WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];

        if let Some(session_id) = &filter.session_id {
            sql.push_str(" AND session_id = ?");
            params.push(Box::new(session_id.clone()));
        }

        if let Some(file_path) = &filter.file_path {
            sql.push_str(" AND file_path = ?");
            params.push(Box::new(file_path.clone()));
        }

        sql.push_str(" ORDER BY line_number ASC, id ASC");

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let lines = stmt
            .query_map(params_refs.as_slice(), Self::row_to_diff_line)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(lines)
    }

    fn row_to_diff_line(row: &Row) -> rusqlite::Result<DiffLine> {
        let diff_type_str: String = row.get("diff_type")?;
        let created_at_str: String = row.get("created_at")?;
        Ok(DiffLine {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            file_path: row.get("file_path")?,
            // The CHECK constraint limits the column to known values
            diff_type: diff_type_str.parse().unwrap_or(DiffType::Add),
            line_content: row.get("line_content")?,
            line_number: row.get::<_, i64>("line_number")?.max(0) as usize,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    /// Count rows per table: (pending edits, summaries, diff lines)
    pub fn get_total_counts(&self) -> Result<(i64, i64, i64)> {
        let conn = self.lock();
        let counts = conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM pending_edits),
                (SELECT COUNT(*) FROM session_summaries),
                (SELECT COUNT(*) FROM diff_lines)
            "#,
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        Ok(counts)
    }
}

impl DiffStore for Database {
    fn list_session_summaries(&self, filter: &SummaryFilter) -> Result<Vec<SessionSummary>> {
        self.get_session_summaries(filter)
    }

    fn list_diff_lines(&self, filter: &DiffLineFilter) -> Result<Vec<DiffLine>> {
        self.get_diff_lines(filter)
    }

    fn save_diff_lines(
        &self,
        session_id: &str,
        file_path: &str,
        lines: &[ProposedLine],
    ) -> Result<usize> {
        self.insert_diff_lines(session_id, file_path, lines)
    }
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            tracing::warn!(value = s, error = %e, "Unparseable stored timestamp");
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}
