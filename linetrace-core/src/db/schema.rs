//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- Before-snapshots waiting for their after-snapshot.
    -- At most one pending edit per (session, file).
    CREATE TABLE IF NOT EXISTS pending_edits (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id       TEXT NOT NULL,
        file_path        TEXT NOT NULL,
        code_before      TEXT NOT NULL,
        created_at       DATETIME NOT NULL,

        UNIQUE(session_id, file_path)
    );

    CREATE TABLE IF NOT EXISTS session_summaries (
        session_id         TEXT NOT NULL,
        file_path          TEXT NOT NULL,
        add_lines_count    INTEGER NOT NULL DEFAULT 0,
        modify_lines_count INTEGER NOT NULL DEFAULT 0,
        total_lines_after  INTEGER NOT NULL,
        session_info       TEXT,
        created_at         DATETIME NOT NULL,

        PRIMARY KEY (session_id, file_path)
    );

    CREATE INDEX IF NOT EXISTS idx_summaries_session ON session_summaries(session_id);
    CREATE INDEX IF NOT EXISTS idx_summaries_file ON session_summaries(file_path);
    CREATE INDEX IF NOT EXISTS idx_summaries_created ON session_summaries(created_at);

    CREATE TABLE IF NOT EXISTS diff_lines (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id       TEXT NOT NULL,
        file_path        TEXT NOT NULL,
        diff_type        TEXT NOT NULL CHECK (diff_type IN ('add', 'modify')),
        line_content     TEXT NOT NULL,
        line_number      INTEGER NOT NULL,
        created_at       DATETIME NOT NULL,

        FOREIGN KEY (session_id, file_path)
            REFERENCES session_summaries(session_id, file_path)
            ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_diff_lines_session_file ON diff_lines(session_id, file_path);
    CREATE INDEX IF NOT EXISTS idx_diff_lines_file ON diff_lines(file_path);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["pending_edits", "session_summaries", "diff_lines"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_diff_lines_reference_summaries() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        let fk_tables: Vec<String> = conn
            .prepare("PRAGMA foreign_key_list(diff_lines)")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(2))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(fk_tables.iter().any(|t| t == "session_summaries"));
    }

    #[test]
    fn test_diff_type_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO diff_lines (session_id, file_path, diff_type, line_content, line_number, created_at)
             VALUES ('s', 'f', 'delete', 'x', 1, '2025-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
