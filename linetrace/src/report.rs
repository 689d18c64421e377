//! Plain-text rendering of metrics reports.

use linetrace_core::{MetricsReport, Scope, SessionListing};
use std::fmt::Write as _;

/// Session ids longer than this are shortened in tables.
const MAX_ID_WIDTH: usize = 30;

/// Render `report` for the terminal. `verbose` adds the diff lines.
pub fn render_text(report: &MetricsReport, verbose: bool) -> String {
    let mut out = String::new();
    let m = &report.metrics;

    let _ = writeln!(out, "Metrics for {}", report.scope);
    if !report.window.is_unbounded() {
        let _ = writeln!(out, "  Window:              {}", report.window);
    }

    if report.is_empty() {
        let _ = writeln!(out, "  No recorded edits.");
        return out;
    }

    if let Scope::Session(_) = report.scope {
        // Summaries arrive newest first
        let info = report.summaries.iter().find_map(|s| s.session_info.as_deref());
        if let Some(info) = info {
            let _ = writeln!(out, "  Agent info:          {}", info);
        }
        if let Some(latest) = report.summaries.first() {
            let _ = writeln!(
                out,
                "  Operation time:      {}",
                latest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }

    let _ = writeln!(out, "  AI generated lines:  {}", m.ai_total_lines);
    let _ = writeln!(out, "  Adopted lines:       {}", m.adopted_lines);
    let _ = writeln!(out, "  Adoption rate:       {:.2}%", m.adoption_rate);
    let _ = writeln!(out, "  Generation rate:     {:.2}%", m.generation_rate);
    let _ = writeln!(out, "  Files:               {}", m.file_count);
    let _ = writeln!(out, "  Sessions:            {}", m.session_count);

    if verbose && !report.diff_lines.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Diff lines:");
        for line in &report.diff_lines {
            let _ = writeln!(
                out,
                "    [{:<6}] {}:{}  {}",
                line.diff_type, line.file_path, line.line_number, line.line_content
            );
        }
    }

    out
}

/// One row per recorded session.
pub fn render_sessions(sessions: &[SessionListing]) -> String {
    let mut out = String::new();

    if sessions.is_empty() {
        let _ = writeln!(out, "No recorded sessions.");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<32} {:>5} {:>6} {:>6}  {:<20} {}",
        "SESSION", "FILES", "ADDED", "MODIF", "LAST SEEN", "INFO"
    );
    for s in sessions {
        let _ = writeln!(
            out,
            "{:<32} {:>5} {:>6} {:>6}  {:<20} {}",
            short_id(&s.session_id),
            s.file_count,
            s.add_lines_count,
            s.modify_lines_count,
            s.last_seen.format("%Y-%m-%d %H:%M:%S"),
            s.session_info.as_deref().unwrap_or("-")
        );
    }
    let _ = writeln!(out, "\n{} session(s)", sessions.len());
    out
}

/// Side-by-side metrics, one row per session, in the order given.
pub fn render_comparison(session_ids: &[String], reports: &[MetricsReport]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Session comparison");
    if let Some(window) = reports.first().map(|r| r.window) {
        if !window.is_unbounded() {
            let _ = writeln!(out, "  Window: {}", window);
        }
    }
    let _ = writeln!(
        out,
        "{:<32} {:>8} {:>8} {:>10} {:>10}",
        "SESSION", "AI LINES", "ADOPTED", "ADOPTION", "GENERATION"
    );
    for (id, report) in session_ids.iter().zip(reports) {
        let m = &report.metrics;
        let _ = writeln!(
            out,
            "{:<32} {:>8} {:>8} {:>9.2}% {:>9.2}%",
            short_id(id),
            m.ai_total_lines,
            m.adopted_lines,
            m.adoption_rate,
            m.generation_rate
        );
    }
    out
}

fn short_id(id: &str) -> String {
    if id.chars().count() > MAX_ID_WIDTH {
        let head: String = id.chars().take(MAX_ID_WIDTH).collect();
        format!("{}...", head)
    } else {
        id.to_string()
    }
}
