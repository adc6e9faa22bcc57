use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::util::{ensure_directory, now_utc_string};

use super::DB_SCHEMA_VERSION;

/// Tables reported by `status`, in dependency order.
pub const STORE_TABLES: [&str; 5] = ["patents", "texttypes", "patentdata", "fulltexts", "citations"];

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens (or creates) the store at `db_path` with its schema in place.
pub fn initialize_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    // concurrent ingest processes serialize on the write lock
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    Ok(())
}

/// Safe to run against an existing store.
pub fn ensure_schema(connection: &Connection) -> Result<()> {
    // foreign key enforcement is per-connection state
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to set foreign_keys=ON")?;

    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS patents (
              PNum INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS texttypes (
              Id INTEGER PRIMARY KEY,
              Name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS patentdata (
              PNum INTEGER PRIMARY KEY,
              FieldType TEXT,
              ApplicationNumber INTEGER,
              SeriesCode TEXT,
              ApplicationDate INTEGER,
              Title TEXT,
              FOREIGN KEY(PNum) REFERENCES patents(PNum)
            );

            CREATE TABLE IF NOT EXISTS fulltexts (
              Id INTEGER PRIMARY KEY,
              PNum INTEGER NOT NULL,
              TextTypeId INTEGER NOT NULL,
              Text TEXT NOT NULL,
              FOREIGN KEY(PNum) REFERENCES patents(PNum),
              FOREIGN KEY(TextTypeId) REFERENCES texttypes(Id)
            );

            CREATE TABLE IF NOT EXISTS citations (
              CitingPNum INTEGER NOT NULL,
              CitedPNum INTEGER NOT NULL,
              PRIMARY KEY (CitingPNum, CitedPNum),
              FOREIGN KEY(CitingPNum) REFERENCES patents(PNum),
              FOREIGN KEY(CitedPNum) REFERENCES patents(PNum)
            );

            INSERT OR IGNORE INTO texttypes(Name) VALUES
              ('ABSTRACT'), ('BRIEF SUMMARY'), ('DESCRIPTION'), ('CLAIMS');

            CREATE INDEX IF NOT EXISTS idx_fulltexts_pnum_type ON fulltexts(PNum, TextTypeId);
            CREATE INDEX IF NOT EXISTS idx_citations_cited ON citations(CitedPNum);
            ",
        )
        .context("failed to initialize store schema")?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub fn count_rows(connection: &Connection, table: &str) -> Result<i64> {
    let count = connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .with_context(|| format!("failed to count rows in {table}"))?;
    Ok(count)
}
