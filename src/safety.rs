//! Guards against recreating the wrong file.
//!
//! `--recreate` drops every table, so the target must be a skrillex database
//! (or nothing at all) and must not be the file being imported.

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Tables whose presence marks a file as a skrillex database.
const MARKER_TABLES: [&str; 3] = ["songs", "normalized", "song_votes"];

pub fn validate_recreate_path(db: &Path, import_source: Option<&Path>) -> Result<()> {
    if let Some(source) = import_source {
        if db == source {
            bail!(
                "Safety check failed: database '{}' cannot be the same as import source '{}'",
                db.display(),
                source.display()
            );
        }
    }

    if !db.exists() {
        return Ok(());
    }

    let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to inspect '{}'", db.display()))?;
    let not_sqlite = || format!("Safety check failed: '{}' is not a SQLite database", db.display());
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
        .with_context(not_sqlite)?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .with_context(not_sqlite)?;

    // An empty SQLite file has nothing to lose.
    if tables.is_empty() {
        return Ok(());
    }
    if let Some(missing) = MARKER_TABLES.iter().find(|t| !tables.iter().any(|name| name == *t)) {
        bail!(
            "Safety check failed: '{}' does not look like a skrillex database (no '{}' table)",
            db.display(),
            missing
        );
    }
    Ok(())
}
