//! Read/write contract the metrics engine needs from storage.
//!
//! [`Database`](super::Database) is the SQLite implementation; tests swap in
//! in-memory fakes.

use crate::error::Result;
use crate::types::{DiffLine, ProposedLine, SessionSummary, TimeWindow};
use std::path::{Path, PathBuf};

/// Filter for [`DiffStore::list_session_summaries`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SummaryFilter {
    pub session_id: Option<String>,
    pub file_path: Option<String>,
    /// Keep only summaries whose file lies under this (resolved) directory
    pub project_prefix: Option<PathBuf>,
    /// Keep only summaries created inside this window
    pub window: TimeWindow,
}

impl SummaryFilter {
    pub fn session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    pub fn file(file_path: &str) -> Self {
        Self {
            file_path: Some(file_path.to_string()),
            ..Default::default()
        }
    }

    pub fn project(root: PathBuf) -> Self {
        Self {
            project_prefix: Some(root),
            ..Default::default()
        }
    }

    pub fn within(self, window: TimeWindow) -> Self {
        Self { window, ..self }
    }

    /// Whether `summary` passes the filter.
    ///
    /// Stores that cannot express every criterion in their query language
    /// call this on the rows they fetched.
    pub fn matches(&self, summary: &SessionSummary) -> bool {
        if let Some(ref id) = self.session_id {
            if &summary.session_id != id {
                return false;
            }
        }
        if let Some(ref path) = self.file_path {
            if &summary.file_path != path {
                return false;
            }
        }
        if let Some(ref root) = self.project_prefix {
            if !is_under(Path::new(&summary.file_path), root) {
                return false;
            }
        }
        self.window.contains(summary.created_at)
    }
}

/// Filter for [`DiffStore::list_diff_lines`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct DiffLineFilter {
    pub session_id: Option<String>,
    pub file_path: Option<String>,
}

impl DiffLineFilter {
    pub fn session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            file_path: None,
        }
    }

    pub fn file(file_path: &str) -> Self {
        Self {
            session_id: None,
            file_path: Some(file_path.to_string()),
        }
    }
}

/// Storage operations used by the metrics engine.
pub trait DiffStore: Send + Sync {
    /// Session summaries matching `filter`, newest first.
    fn list_session_summaries(&self, filter: &SummaryFilter) -> Result<Vec<SessionSummary>>;

    /// Diff lines matching `filter`, ordered by `line_number` ascending.
    fn list_diff_lines(&self, filter: &DiffLineFilter) -> Result<Vec<DiffLine>>;

    /// Persist extractor output for one recorded edit.
    fn save_diff_lines(
        &self,
        session_id: &str,
        file_path: &str,
        lines: &[ProposedLine],
    ) -> Result<usize>;
}

/// Canonical form of `path`.
///
/// When `path` does not exist, the deepest existing ancestor is
/// canonicalized and the missing components are re-appended. Relative paths
/// are taken against the current directory first, so the result does not
/// depend on which of their components exist.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }

    let absolute = match std::env::current_dir() {
        Ok(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    };

    let mut missing = Vec::new();
    let mut current = absolute.as_path();
    while let (Some(parent), Some(name)) = (current.parent(), current.file_name()) {
        missing.push(name.to_os_string());
        if let Ok(base) = std::fs::canonicalize(parent) {
            return missing.iter().rev().fold(base, |acc, name| acc.join(name));
        }
        current = parent;
    }

    absolute
}

/// Path containment on whole components, after resolving both sides.
///
/// `/repo-old/a.rs` is not under `/repo`.
pub fn is_under(path: &Path, root: &Path) -> bool {
    resolve_path(path).starts_with(resolve_path(root))
}
