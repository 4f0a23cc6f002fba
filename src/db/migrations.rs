//! Forex cache schema migrations
//!
//! The cache holds nothing that cannot be refetched, so the migration policy
//! is drop-and-recreate: any schema version mismatch discards both tables and
//! starts over.

use crate::error::Result;
use rusqlite::Connection;

/// Bump on any schema change; the previous cache is discarded.
pub const SCHEMA_VERSION: i32 = 1;

/// Bring the database up to the compiled schema version.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version == SCHEMA_VERSION {
        return Ok(());
    }

    if version != 0 {
        tracing::info!(
            "Schema version {} -> {}, recreating cache tables",
            version,
            SCHEMA_VERSION
        );
        conn.execute_batch("DROP TABLE IF EXISTS rate; DROP TABLE IF EXISTS currency;")?;
    }

    conn.execute_batch(CREATE_CURRENCY_TABLE)?;
    conn.execute_batch(CREATE_RATE_TABLE)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

const CREATE_CURRENCY_TABLE: &str = r#"
CREATE TABLE currency (
    id INTEGER PRIMARY KEY,
    currency_code TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    symbol TEXT NOT NULL,
    country_code TEXT NOT NULL,
    country_name TEXT NOT NULL,
    country_flag_url TEXT NOT NULL
);
"#;

const CREATE_RATE_TABLE: &str = r#"
CREATE TABLE rate (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_code TEXT NOT NULL,
    to_code TEXT NOT NULL,
    date INTEGER NOT NULL,
    value REAL NOT NULL,
    FOREIGN KEY (from_code) REFERENCES currency (currency_code),
    FOREIGN KEY (to_code) REFERENCES currency (currency_code),
    UNIQUE (date, from_code, to_code) ON CONFLICT REPLACE
);
"#;
