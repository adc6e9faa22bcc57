use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::{STORE_TABLES, count_rows};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = &args.db_path;
    info!(db_path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let schema_version = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .unwrap_or_default();
    let updated_at = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_updated_at'",
            [],
            |row| row.get::<_, String>(0),
        )
        .unwrap_or_default();
    info!(
        schema_version = %schema_version,
        updated_at = %updated_at,
        "loaded store metadata"
    );

    for table in STORE_TABLES {
        match count_rows(&connection, table) {
            Ok(rows) => info!(table, rows, "table status"),
            Err(err) => warn!(table, error = %err, "table unavailable"),
        }
    }

    Ok(())
}
