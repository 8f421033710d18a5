//! SQLite schema and bootstrap.

use crate::error::{Error, Result};
use crate::options::Options;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

pub const SCHEMA_VERSION: i32 = 1;

const DROP_TABLES: &str = "
    DROP TABLE IF EXISTS play_history;
    DROP TABLE IF EXISTS song_votes;
    DROP TABLE IF EXISTS artist_votes;
    DROP TABLE IF EXISTS genre_votes;
    DROP TABLE IF EXISTS unplayable;
    DROP TABLE IF EXISTS sessions;
    DROP TABLE IF EXISTS user_activity;
    DROP TABLE IF EXISTS normalized;
    DROP TABLE IF EXISTS songs;
    DROP TABLE IF EXISTS artists;
    DROP TABLE IF EXISTS genres;
";

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS artists (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS genres (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS songs (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        artist_id INTEGER NOT NULL DEFAULT 0,
        genre_id  INTEGER NOT NULL DEFAULT 0,
        name      TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist_id);
    CREATE INDEX IF NOT EXISTS idx_songs_genre ON songs(genre_id);

    CREATE TABLE IF NOT EXISTS normalized (
        key       TEXT PRIMARY KEY NOT NULL,
        song_id   INTEGER NOT NULL DEFAULT 0,
        artist_id INTEGER NOT NULL DEFAULT 0,
        genre_id  INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        created INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_activity (
        user_id     TEXT PRIMARY KEY NOT NULL,
        last_active INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS song_votes (
        entity_id  INTEGER NOT NULL,
        session_id INTEGER NOT NULL,
        user_id    TEXT NOT NULL,
        vote       INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (entity_id, session_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS artist_votes (
        entity_id  INTEGER NOT NULL,
        session_id INTEGER NOT NULL,
        user_id    TEXT NOT NULL,
        vote       INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (entity_id, session_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS genre_votes (
        entity_id  INTEGER NOT NULL,
        session_id INTEGER NOT NULL,
        user_id    TEXT NOT NULL,
        vote       INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (entity_id, session_id, user_id)
    );

    CREATE TABLE IF NOT EXISTS play_history (
        song_id    INTEGER NOT NULL,
        session_id INTEGER NOT NULL,
        timestamp  INTEGER NOT NULL,
        PRIMARY KEY (song_id, session_id)
    );
    CREATE INDEX IF NOT EXISTS idx_play_history_session ON play_history(session_id, timestamp);

    CREATE TABLE IF NOT EXISTS unplayable (
        song_id INTEGER PRIMARY KEY NOT NULL
    );
";

/// Open (or create) the database and make sure every table exists.
pub fn bootstrap(path: &Path, options: &Options) -> Result<Connection> {
    let conn = if options.memory_only {
        debug!("Opening in-memory database");
        Connection::open_in_memory()?
    } else {
        if !path.exists() && !options.create_if_missing {
            return Err(Error::invalid("Database does not exist."));
        }
        info!(path = %path.display(), "Opening database");
        Connection::open(path)?
    };

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;",
    )?;
    if options.enable_caching {
        conn.execute_batch("PRAGMA cache_size = -64000;")?;
    }

    if options.recreate {
        info!("Recreating database, dropping all tables");
        conn.execute_batch(DROP_TABLES)?;
    }

    conn.execute_batch(CREATE_TABLES)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_in_memory_creates_tables() {
        let conn = bootstrap(Path::new(""), &Options::in_memory()).unwrap();
        assert_eq!(table_count(&conn), 11);
    }

    #[test]
    fn test_missing_file_without_create() {
        let tmp = TempDir::new().unwrap();
        let err = bootstrap(&tmp.path().join("missing.db"), &Options::default()).unwrap_err();
        assert!(err.is_error());
        assert_eq!(err.message(), "Database does not exist.");
    }

    #[test]
    fn test_recreate_drops_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("skrillex.db");
        let options = Options {
            create_if_missing: true,
            ..Options::default()
        };

        let conn = bootstrap(&path, &options).unwrap();
        conn.execute("INSERT INTO artists (name) VALUES ('a0')", []).unwrap();
        drop(conn);

        let conn = bootstrap(&path, &options).unwrap();
        let kept: i64 = conn.query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0)).unwrap();
        assert_eq!(kept, 1);
        drop(conn);

        let conn = bootstrap(&path, &Options::test_options()).unwrap();
        let kept: i64 = conn.query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0)).unwrap();
        assert_eq!(kept, 0);
    }
}
