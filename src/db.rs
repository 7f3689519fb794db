use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Latest schema version understood by this build
pub const SCHEMA_VERSION: i64 = 2;

/// Open (or create) a database file and bring its schema up to date
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
    }

    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    setup_database(&conn)?;

    info!(path = %path.display(), "database opened");
    Ok(conn)
}

/// In-memory database with the full schema (tests, scratch sessions)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Apply every pending schema step in order. Each step commits on its own,
/// so an interrupted upgrade resumes from the last finished version.
pub fn setup_database(conn: &Connection) -> Result<()> {
    // Snapshots rely on ON DELETE CASCADE
    conn.pragma_update(None, "foreign_keys", "ON")?;

    let version = schema_version(conn)?;

    if version < 1 {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS balance_sheet_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT '',
                item_type TEXT NOT NULL CHECK (item_type IN ('asset', 'liability'))
            );

            CREATE TABLE IF NOT EXISTS balance_sheet_values (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL
                    REFERENCES balance_sheet_items(id) ON DELETE CASCADE,
                value REAL NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS budget_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT '',
                item_type TEXT NOT NULL CHECK (item_type IN ('income', 'expense')),
                due_date TEXT
            );

            CREATE TABLE IF NOT EXISTS budget_values (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL
                    REFERENCES budget_items(id) ON DELETE CASCADE,
                value REAL NOT NULL,
                timestamp TEXT NOT NULL
            );

            -- Flat tables kept alongside the item + snapshot model
            CREATE TABLE IF NOT EXISTS assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS liabilities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_bs_values_item
                ON balance_sheet_values(item_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_budget_values_item
                ON budget_values(item_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_bs_items_type
                ON balance_sheet_items(item_type);
            CREATE INDEX IF NOT EXISTS idx_budget_items_type
                ON budget_items(item_type);

            PRAGMA user_version = 1;",
        )
        .context("Failed to apply schema v1")?;
        tx.commit()?;
        debug!("schema migrated to v1");
    }

    if version < 2 {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "ALTER TABLE assets ADD COLUMN migrated INTEGER NOT NULL DEFAULT 0;
             ALTER TABLE liabilities ADD COLUMN migrated INTEGER NOT NULL DEFAULT 0;
             PRAGMA user_version = 2;",
        )
        .context("Failed to apply schema v2")?;
        tx.commit()?;
        debug!("schema migrated to v2");
    }

    if version < SCHEMA_VERSION {
        info!(from = version, to = SCHEMA_VERSION, "schema upgraded");
    }

    Ok(())
}

// ============================================================================
// Column codecs
// ============================================================================

/// Fixed-width UTC RFC 3339 with nanoseconds, so TEXT ordering matches time
/// ordering at full precision and `substr(timestamp, 1, 10)` is the UTC day.
pub fn to_db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_db_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn to_db_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_db_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
