//! Core domain types for linetrace
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One AI agent conversation; it may edit many files |
//! | **Edit** | A before/after snapshot pair for one file within a session |
//! | **Diff line** | A line the AI added or changed, as it reads after the edit |
//! | **Scope** | Aggregation granularity: session, file, project, or global |
//! | **Adopted line** | A diff line that still appears, in order, in the file today |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================
// Diff lines
// ============================================

/// Kind of change a diff line records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    /// Line inserted where nothing stood before
    Add,
    /// Line that replaced existing content
    Modify,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Add => "add",
            DiffType::Modify => "modify",
        }
    }
}

impl std::str::FromStr for DiffType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(DiffType::Add),
            "modify" => Ok(DiffType::Modify),
            _ => Err(format!("unknown diff type: {}", s)),
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A line emitted by the extractor, before session and file are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedLine {
    pub diff_type: DiffType,
    /// Line text with leading/trailing whitespace removed
    pub line_content: String,
    /// 1-based position in the post-edit text
    pub line_number: usize,
}

impl ProposedLine {
    pub fn new(diff_type: DiffType, line_content: impl Into<String>, line_number: usize) -> Self {
        Self {
            diff_type,
            line_content: line_content.into(),
            line_number,
        }
    }
}

/// A stored diff line belonging to one recorded edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffLine {
    /// Row id (0 before insertion)
    pub id: i64,
    pub session_id: String,
    pub file_path: String,
    pub diff_type: DiffType,
    pub line_content: String,
    pub line_number: usize,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Session summaries
// ============================================

/// Per-(session, file) roll-up written when an edit is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub file_path: String,
    pub add_lines_count: usize,
    pub modify_lines_count: usize,
    /// Line count of the post-edit snapshot
    pub total_lines_after: usize,
    /// Free-form caller-supplied context (agent name, prompt, ...)
    pub session_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One recorded session, rolled up across the files it touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionListing {
    pub session_id: String,
    /// Most recent non-empty `session_info` of the session's summaries
    pub session_info: Option<String>,
    pub file_count: usize,
    pub add_lines_count: usize,
    pub modify_lines_count: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

// ============================================
// Metrics
// ============================================

/// Aggregated adoption figures for one scope.
///
/// Rates are percentages rounded to two decimals. `generation_rate` is not
/// capped: a file that shrank since the edits can exceed 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub ai_total_lines: usize,
    pub adopted_lines: usize,
    pub adoption_rate: f64,
    pub generation_rate: f64,
    pub file_count: usize,
    pub session_count: usize,
}

/// What a metrics query aggregates over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Session(String),
    File(String),
    Project(PathBuf),
    Global,
}

impl Scope {
    /// Short scope name, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Session(_) => "session",
            Scope::File(_) => "file",
            Scope::Project(_) => "project",
            Scope::Global => "global",
        }
    }

    /// Key under which results for this scope are cached.
    pub fn cache_key(&self) -> String {
        match self {
            Scope::Session(id) => format!("session_metrics:{}", id),
            Scope::File(path) => format!("file_metrics:{}", path),
            Scope::Project(root) => format!("project_metrics:{}", root.display()),
            Scope::Global => "global_metrics".to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Session(id) => write!(f, "session {}", id),
            Scope::File(path) => write!(f, "file {}", path),
            Scope::Project(root) => write!(f, "project {}", root.display()),
            Scope::Global => f.write_str("global"),
        }
    }
}

/// Inclusive bounds on when an edit was recorded. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        Self { since, until }
    }

    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| ts >= since) && self.until.map_or(true, |until| ts <= until)
    }

    /// `key` narrowed to this window; unbounded windows leave it unchanged.
    pub fn qualify(&self, key: String) -> String {
        if self.is_unbounded() {
            return key;
        }
        let bound = |ts: Option<DateTime<Utc>>| ts.map(|t| t.to_rfc3339()).unwrap_or_default();
        format!("{}@{}..{}", key, bound(self.since), bound(self.until))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |ts: Option<DateTime<Utc>>| {
            ts.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "*".to_string())
        };
        write!(f, "{} .. {}", bound(self.since), bound(self.until))
    }
}

/// Metrics plus the records they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "TimeWindow::is_unbounded")]
    pub window: TimeWindow,
    pub metrics: Metrics,
    pub summaries: Vec<SessionSummary>,
    pub diff_lines: Vec<DiffLine>,
}

impl MetricsReport {
    /// A report with all counters at zero, for scopes with no recorded edits.
    pub fn empty(scope: Scope) -> Self {
        Self {
            scope,
            window: TimeWindow::default(),
            metrics: Metrics::default(),
            summaries: Vec::new(),
            diff_lines: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

/// Result of recording the after-snapshot of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub add_lines_count: usize,
    pub modify_lines_count: usize,
    pub total_diff_lines: usize,
    pub total_lines_after: usize,
}
