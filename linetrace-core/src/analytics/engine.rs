//! Metrics aggregation across sessions, files, projects and the whole store
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      MetricsContext                          │
//! │                                                              │
//! │   compute(scope)                                             │
//! │     │                                                        │
//! │     ├─► ResultCache ── hit ──► MetricsReport                 │
//! │     │                                                        │
//! │     └─► miss:                                                │
//! │          DiffStore.list_session_summaries(filter)            │
//! │          DiffStore.list_diff_lines(filter)  (grouped by file)│
//! │          FileReader.read_lines(file)        (per group)      │
//! │          LcsMatcher.lcs_length(ai, current) (per group)      │
//! │          ── sum ──► Metrics                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scope-level rates are always ratios of the summed counters, never means
//! of per-file rates. A file that cannot be read counts as zero current
//! lines, which shrinks the denominator and pushes `generation_rate` up for
//! scopes containing it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linetrace_core::analytics::MetricsContext;
//! use linetrace_core::files::LocalFiles;
//! use linetrace_core::{Config, Database};
//!
//! let config = Config::load()?;
//! let db = Arc::new(Database::open(&config.resolved_database_path())?);
//! db.migrate()?;
//!
//! let ctx = MetricsContext::from_config(db, Arc::new(LocalFiles), &config.metrics);
//! let report = ctx.by_session("session-1")?;
//! println!("adoption: {:.2}%", report.metrics.adoption_rate);
//! # Ok::<(), linetrace_core::Error>(())
//! ```

use super::adoption::{adoption_rate, generation_rate, DynamicLcs, LcsMatcher};
use super::cache::ResultCache;
use crate::config::MetricsConfig;
use crate::db::{resolve_path, DiffLineFilter, DiffStore, SummaryFilter};
use crate::error::{Error, Result};
use crate::files::FileReader;
use crate::types::{DiffLine, Metrics, MetricsReport, Scope, SessionSummary, TimeWindow};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Owns the collaborators and the cache used to answer metrics queries.
///
/// Safe to share across threads; the cache is the only mutable state.
pub struct MetricsContext {
    store: Arc<dyn DiffStore>,
    files: Arc<dyn FileReader>,
    matcher: Box<dyn LcsMatcher>,
    cache: ResultCache<MetricsReport>,
}

impl MetricsContext {
    /// Create a context with the default LCS matcher.
    pub fn new(
        store: Arc<dyn DiffStore>,
        files: Arc<dyn FileReader>,
        cache: ResultCache<MetricsReport>,
    ) -> Self {
        Self::with_matcher(store, files, Box::new(DynamicLcs), cache)
    }

    /// Create a context with a custom LCS implementation.
    pub fn with_matcher(
        store: Arc<dyn DiffStore>,
        files: Arc<dyn FileReader>,
        matcher: Box<dyn LcsMatcher>,
        cache: ResultCache<MetricsReport>,
    ) -> Self {
        Self {
            store,
            files,
            matcher,
            cache,
        }
    }

    /// Create a context whose cache follows the `[metrics]` config section.
    pub fn from_config(
        store: Arc<dyn DiffStore>,
        files: Arc<dyn FileReader>,
        config: &MetricsConfig,
    ) -> Self {
        let cache = ResultCache::with_capacity(
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_capacity,
        );
        Self::new(store, files, cache)
    }

    pub fn by_session(&self, session_id: &str) -> Result<MetricsReport> {
        self.compute(&Scope::Session(session_id.to_string()))
    }

    pub fn by_file(&self, file_path: &str) -> Result<MetricsReport> {
        self.compute(&Scope::File(file_path.to_string()))
    }

    /// Metrics for every recorded file under `root`.
    ///
    /// The root is resolved first, so `./repo` and its absolute form share
    /// a cache entry.
    pub fn by_project(&self, root: &Path) -> Result<MetricsReport> {
        self.compute(&Scope::Project(resolve_path(root)))
    }

    pub fn global(&self) -> Result<MetricsReport> {
        self.compute(&Scope::Global)
    }

    /// Metrics for `scope`, served from the cache when fresh.
    ///
    /// A scope with no recorded edits yields a zeroed report. A failing
    /// store yields [`Error::Storage`] and nothing is cached.
    pub fn compute(&self, scope: &Scope) -> Result<MetricsReport> {
        self.compute_within(scope, &TimeWindow::default())
    }

    /// Metrics for `scope` counting only edits recorded inside `window`.
    pub fn compute_within(&self, scope: &Scope, window: &TimeWindow) -> Result<MetricsReport> {
        let key = window.qualify(scope.cache_key());
        self.cache
            .get_or_try_insert_with(&key, || self.compute_uncached(scope, window))
    }

    /// Drop the cached result for `scope`. Windowed results for the scope
    /// are left to expire.
    pub fn invalidate(&self, scope: &Scope) {
        self.cache.delete(&scope.cache_key());
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &ResultCache<MetricsReport> {
        &self.cache
    }

    fn compute_uncached(&self, scope: &Scope, window: &TimeWindow) -> Result<MetricsReport> {
        let start = Instant::now();

        let summaries = self
            .store
            .list_session_summaries(&summary_filter(scope).within(*window))
            .map_err(|e| storage_error(scope, e))?;

        if summaries.is_empty() {
            tracing::debug!(scope = %scope, "No recorded edits for scope");
            return Ok(MetricsReport {
                window: *window,
                ..MetricsReport::empty(scope.clone())
            });
        }

        let mut diff_lines = self.fetch_diff_lines(scope, &summaries)?;
        if !window.is_unbounded() {
            // Diff lines follow the edits whose summaries fell inside the window
            let recorded: HashSet<(&str, &str)> = summaries
                .iter()
                .map(|s| (s.session_id.as_str(), s.file_path.as_str()))
                .collect();
            diff_lines.retain(|l| recorded.contains(&(l.session_id.as_str(), l.file_path.as_str())));
        }
        let metrics = self.aggregate(&summaries, &diff_lines);

        tracing::info!(
            scope = %scope,
            ai_total_lines = metrics.ai_total_lines,
            adopted_lines = metrics.adopted_lines,
            file_count = metrics.file_count,
            session_count = metrics.session_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Computed metrics"
        );

        Ok(MetricsReport {
            scope: scope.clone(),
            window: *window,
            metrics,
            summaries,
            diff_lines,
        })
    }

    fn fetch_diff_lines(&self, scope: &Scope, summaries: &[SessionSummary]) -> Result<Vec<DiffLine>> {
        match scope {
            Scope::Session(id) => self
                .store
                .list_diff_lines(&DiffLineFilter::session(id))
                .map_err(|e| storage_error(scope, e)),
            Scope::File(path) => self
                .store
                .list_diff_lines(&DiffLineFilter::file(path))
                .map_err(|e| storage_error(scope, e)),
            // The diff-line contract has no prefix filter; fetch per matched file.
            Scope::Project(_) | Scope::Global => {
                let files: BTreeSet<&str> = summaries.iter().map(|s| s.file_path.as_str()).collect();
                let mut lines = Vec::new();
                for file in files {
                    let batch = self
                        .store
                        .list_diff_lines(&DiffLineFilter::file(file))
                        .map_err(|e| storage_error(scope, e))?;
                    lines.extend(batch);
                }
                Ok(lines)
            }
        }
    }

    fn aggregate(&self, summaries: &[SessionSummary], diff_lines: &[DiffLine]) -> Metrics {
        let mut by_file: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for line in diff_lines {
            by_file
                .entry(line.file_path.as_str())
                .or_default()
                .push(line.line_content.clone());
        }

        let mut adopted_lines = 0;
        let mut current_total = 0;
        for (file, ai_lines) in &by_file {
            let current = self.files.read_lines(Path::new(file));
            let adopted = self.matcher.lcs_length(ai_lines, &current);
            tracing::debug!(
                file,
                ai_lines = ai_lines.len(),
                current_lines = current.len(),
                adopted,
                "File adoption"
            );
            adopted_lines += adopted;
            current_total += current.len();
        }

        let ai_total_lines = diff_lines.len();
        let sessions: HashSet<&str> = summaries.iter().map(|s| s.session_id.as_str()).collect();

        Metrics {
            ai_total_lines,
            adopted_lines,
            adoption_rate: adoption_rate(ai_total_lines, adopted_lines),
            generation_rate: generation_rate(ai_total_lines, current_total),
            file_count: by_file.len(),
            session_count: sessions.len(),
        }
    }
}

fn summary_filter(scope: &Scope) -> SummaryFilter {
    match scope {
        Scope::Session(id) => SummaryFilter::session(id),
        Scope::File(path) => SummaryFilter::file(path),
        Scope::Project(root) => SummaryFilter::project(root.clone()),
        Scope::Global => SummaryFilter::default(),
    }
}

fn storage_error(scope: &Scope, err: Error) -> Error {
    tracing::error!(scope = %scope, error = %err, "Storage query failed");
    Error::Storage {
        scope: scope.to_string(),
        message: err.to_string(),
    }
}
