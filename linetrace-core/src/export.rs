//! Writing metrics reports to JSON or CSV files.

use crate::error::{Error, Result};
use crate::types::MetricsReport;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Output format for [`export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(Error::InvalidInput(format!("unknown export format: {}", other))),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    export_time: String,
    data: &'a MetricsReport,
}

/// Write `report` to `path` in the given format, creating parent directories.
pub fn export(report: &MetricsReport, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Json => to_json(report, path),
        ExportFormat::Csv => to_csv(report, path),
    }
}

/// Pretty-printed `{ "export_time": ..., "data": report }`.
pub fn to_json(report: &MetricsReport, path: &Path) -> Result<()> {
    let envelope = Envelope {
        export_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        data: report,
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    write_file(path, &json)?;
    tracing::info!(path = %path.display(), "Exported report as JSON");
    Ok(())
}

/// Metric table followed by the diff-line details, if any.
pub fn to_csv(report: &MetricsReport, path: &Path) -> Result<()> {
    write_file(path, &render_csv(report))?;
    tracing::info!(path = %path.display(), "Exported report as CSV");
    Ok(())
}

fn render_csv(report: &MetricsReport) -> String {
    let m = &report.metrics;
    let mut rows: Vec<Vec<String>> = vec![
        vec!["Metric Name".into(), "Value".into()],
        vec!["AI Generated Lines".into(), m.ai_total_lines.to_string()],
        vec!["Adopted Lines".into(), m.adopted_lines.to_string()],
        vec!["Code Adoption Rate (%)".into(), format!("{:.2}", m.adoption_rate)],
        vec!["Code Generation Rate (%)".into(), format!("{:.2}", m.generation_rate)],
        vec!["Files Involved".into(), m.file_count.to_string()],
        vec!["Sessions".into(), m.session_count.to_string()],
    ];

    if !report.diff_lines.is_empty() {
        rows.push(Vec::new());
        rows.push(vec!["Diff Lines Details".into()]);
        rows.push(vec!["Diff Type".into(), "Line Number".into(), "Code Content".into()]);
        for line in &report.diff_lines {
            rows.push(vec![
                line.diff_type.to_string(),
                line.line_number.to_string(),
                line.line_content.clone(),
            ]);
        }
    }

    let mut out = String::new();
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| quote(f)).collect();
        let _ = writeln!(out, "{}", fields.join(","));
    }
    out
}

/// RFC 4180 field quoting.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    Ok(())
}
