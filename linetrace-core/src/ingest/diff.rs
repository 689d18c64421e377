//! Line-level diff extraction
//!
//! Aligns the before and after snapshots of a file and reports the lines
//! that were added or rewritten, numbered by their position in the after
//! snapshot.
//!
//! The alignment is a Myers diff with replace detection, so the edit script
//! is a sequence of equal / delete / insert / replace runs:
//!
//! | Run | Emitted | After-counter |
//! |-----|---------|---------------|
//! | equal | nothing | `+= len` |
//! | delete | nothing | unchanged |
//! | insert | `Add` per non-blank line | `+= len` |
//! | replace | `Modify` per non-blank line | `+= len` |
//!
//! ## Example
//!
//! ```rust
//! use linetrace_core::ingest::extract;
//! use linetrace_core::{DiffType, ProposedLine};
//!
//! let lines = extract("a\nb\nc", "a\nx\nc");
//! assert_eq!(lines, vec![ProposedLine::new(DiffType::Modify, "x", 2)]);
//! ```

use crate::types::{DiffType, ProposedLine};
use similar::{capture_diff_slices, Algorithm, DiffTag};

/// Split text into lines on `'\n'`.
///
/// No line-ending normalisation is done, so a CRLF file keeps its `'\r'`
/// on each line (trimming removes it later). Empty text has no lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').collect()
}

/// Extract added and modified lines between two snapshots.
///
/// Deterministic: identical inputs always yield identical output, in
/// ascending `line_number` order. Blank lines are never emitted.
pub fn extract(before: &str, after: &str) -> Vec<ProposedLine> {
    let before_lines = split_lines(before);
    let after_lines = split_lines(after);

    let ops = capture_diff_slices(Algorithm::Myers, &before_lines, &after_lines);

    let mut out = Vec::new();
    let mut after_pos = 0usize;

    for op in &ops {
        let (tag, _old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => after_pos += new_range.len(),
            DiffTag::Delete => {}
            DiffTag::Insert | DiffTag::Replace => {
                let diff_type = if tag == DiffTag::Insert {
                    DiffType::Add
                } else {
                    DiffType::Modify
                };
                for (offset, line) in after_lines[new_range.clone()].iter().enumerate() {
                    let content = line.trim();
                    if !content.is_empty() {
                        out.push(ProposedLine::new(
                            diff_type,
                            content,
                            after_pos + offset + 1,
                        ));
                    }
                }
                after_pos += new_range.len();
            }
        }
    }

    let (added, modified) = summarize(&out);
    tracing::debug!(
        total = out.len(),
        added,
        modified,
        "Extracted diff lines"
    );

    out
}

/// Count `(add, modify)` lines.
pub fn summarize(lines: &[ProposedLine]) -> (usize, usize) {
    lines.iter().fold((0, 0), |(add, modify), line| match line.diff_type {
        DiffType::Add => (add + 1, modify),
        DiffType::Modify => (add, modify + 1),
    })
}
