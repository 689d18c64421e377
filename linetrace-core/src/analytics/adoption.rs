//! Line survival via longest common subsequence.
//!
//! An AI-proposed line counts as adopted when it still appears in the
//! current file in the same relative order as the other proposed lines.
//! Lines are compared after trimming edge whitespace; blank lines are
//! ignored on both sides.
//!
//! ## Example
//!
//! ```rust
//! use linetrace_core::analytics::{adoption_rate, DynamicLcs, LcsMatcher};
//!
//! let ai = vec!["foo".to_string(), "bar".to_string()];
//! let current = vec!["foo".to_string(), "baz".to_string(), "bar".to_string()];
//!
//! let adopted = DynamicLcs.lcs_length(&ai, &current);
//! assert_eq!(adopted, 2);
//! assert_eq!(adoption_rate(ai.len(), adopted), 100.0);
//! ```

/// Computes how many AI-proposed lines survive in the current content.
///
/// Implementations must return the length of the longest order-preserving
/// common subsequence of the non-blank, edge-trimmed lines of both inputs.
pub trait LcsMatcher: Send + Sync {
    fn lcs_length(&self, ai_lines: &[String], current_lines: &[String]) -> usize;
}

/// Classic O(m·n) dynamic-programming LCS.
///
/// Keeps only two rows of the table, so memory is O(n) in the current
/// file's length while the result equals `dp[m][n]` of the full table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicLcs;

impl LcsMatcher for DynamicLcs {
    fn lcs_length(&self, ai_lines: &[String], current_lines: &[String]) -> usize {
        let ai = significant_lines(ai_lines);
        let current = significant_lines(current_lines);

        if ai.is_empty() || current.is_empty() {
            return 0;
        }

        let n = current.len();
        let mut prev = vec![0usize; n + 1];
        let mut row = vec![0usize; n + 1];

        for a in &ai {
            for j in 1..=n {
                row[j] = if *a == current[j - 1] {
                    prev[j - 1] + 1
                } else {
                    prev[j].max(row[j - 1])
                };
            }
            std::mem::swap(&mut prev, &mut row);
        }

        let length = prev[n];
        tracing::debug!(
            ai_lines = ai.len(),
            current_lines = n,
            lcs = length,
            "LCS calculation"
        );
        length
    }
}

fn significant_lines(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Share of AI-proposed lines still present, as a percentage.
///
/// `0.0` when nothing was proposed.
pub fn adoption_rate(ai_total_lines: usize, adopted_lines: usize) -> f64 {
    if ai_total_lines == 0 {
        return 0.0;
    }
    round2(adopted_lines as f64 / ai_total_lines as f64 * 100.0)
}

/// AI-proposed lines relative to the current size of the files, as a percentage.
///
/// `0.0` when the files are empty or missing. Not capped at 100.
pub fn generation_rate(ai_total_lines: usize, file_total_lines: usize) -> f64 {
    if file_total_lines == 0 {
        return 0.0;
    }
    round2(ai_total_lines as f64 / file_total_lines as f64 * 100.0)
}
