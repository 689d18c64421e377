//! Age-based removal of recorded edits.

use crate::db::Database;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};

/// Delete session summaries (and their diff lines) older than
/// `retention_days` as of `now`. Returns the number of summaries removed.
///
/// Staged before-snapshots are left alone.
pub fn cleanup(db: &Database, retention_days: u32, now: DateTime<Utc>) -> Result<usize> {
    if retention_days == 0 {
        return Err(Error::InvalidInput(
            "retention_days must be at least 1".to_string(),
        ));
    }

    let cutoff = now - Duration::days(i64::from(retention_days));
    tracing::info!(retention_days, cutoff = %cutoff, "Running retention cleanup");
    db.delete_sessions_before(cutoff)
}
