use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

// Working memory for cross-message correlation, not an audit log. Rows
// are swept once the retention window passes.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS correlations (
    id INTEGER PRIMARY KEY,
    sender TEXT NOT NULL,
    body TEXT NOT NULL,
    received_at TEXT NOT NULL,
    amount REAL,
    direction TEXT,
    ending_hint TEXT,
    transaction_id TEXT,
    account_id TEXT,
    import_key TEXT,
    is_primary INTEGER NOT NULL DEFAULT 0,
    correlated_with INTEGER,
    fee_applied INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (correlated_with) REFERENCES correlations(id)
);

CREATE INDEX IF NOT EXISTS idx_correlations_match
    ON correlations(sender, is_primary, fee_applied, received_at);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"correlations".to_string()));
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }
}
