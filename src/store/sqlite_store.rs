//! SQLite-backed store.
//!
//! Entities, sessions, votes, activity, play history, the normalized index
//! and the unplayable set are tables. The queue and buffer are process state.
//!
//! Lock order is state -> queue -> buffer. Every method takes them in that
//! order, and a method that only needs the later ones skips the earlier ones.

use super::pipeline::{PlayBuffer, PlayQueue};
use super::schema;
use super::Store;
use crate::error::{Error, Result};
use crate::models::{Artist, Countable, Entity, EntityKind, Genre, Song};
use crate::options::{Options, ReadOptions, SortType, WriteOptions};
use crate::result_set::ResultSet;
use crate::time;
use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

struct StoreState {
    conn: Connection,
    session_id: i64,
}

pub struct SqliteStore {
    state: Mutex<StoreState>,
    queue: Mutex<PlayQueue>,
    buffer: Mutex<PlayBuffer>,
}

// ============================================================================
// Aggregate Queries
// ============================================================================

/// One entity with its tally for a single session.
struct AggregateRow {
    id: u64,
    name: String,
    stats: Countable,
    last_played: u64,
    artist_id: u64,
    genre_id: u64,
}

impl AggregateRow {
    fn into_artist(self) -> Artist {
        Artist {
            id: self.id,
            name: self.name,
            stats: self.stats,
            last_played: self.last_played,
        }
    }

    fn into_genre(self) -> Genre {
        Genre {
            id: self.id,
            name: self.name,
            stats: self.stats,
            last_played: self.last_played,
        }
    }

    /// Bare song; nested artist/genre carry only their ids.
    fn into_song(self) -> Song {
        let mut song = Song {
            id: self.id,
            name: self.name,
            stats: self.stats,
            last_played: self.last_played,
            ..Song::default()
        };
        song.artist.id = self.artist_id;
        song.genre.id = self.genre_id;
        song
    }
}

/// Tally of every entity of `kind` (or one, with `?3`) for session `?1`,
/// counting only voters active at or after `?2` (0 disables the filter).
fn aggregate_sql(kind: EntityKind, single: bool, sort: SortType) -> String {
    let last_played = match kind {
        EntityKind::Song => {
            "SELECT MAX(p.timestamp) FROM play_history p
             WHERE p.song_id = e.id AND p.session_id = ?1"
        }
        EntityKind::Artist => {
            "SELECT MAX(p.timestamp) FROM play_history p JOIN songs s ON s.id = p.song_id
             WHERE s.artist_id = e.id AND p.session_id = ?1"
        }
        EntityKind::Genre => {
            "SELECT MAX(p.timestamp) FROM play_history p JOIN songs s ON s.id = p.song_id
             WHERE s.genre_id = e.id AND p.session_id = ?1"
        }
    };
    let links = match kind {
        EntityKind::Song => "e.artist_id, e.genre_id",
        EntityKind::Artist | EntityKind::Genre => "0, 0",
    };
    let filter = if single { "WHERE e.id = ?3" } else { "" };
    let order = match sort {
        SortType::None => "ORDER BY e.id ASC",
        SortType::Counts => "ORDER BY vote_count DESC, e.id ASC",
        SortType::Votes => "ORDER BY vote_total DESC, e.id ASC",
    };

    format!(
        "SELECT e.id, e.name,
                COUNT(v.user_id) AS vote_count,
                COALESCE(SUM(v.vote), 0) AS vote_total,
                COALESCE(({last_played}), 0),
                {links}
         FROM {table} e
         LEFT JOIN {votes} v
           ON v.entity_id = e.id
          AND v.session_id = ?1
          AND (?2 = 0 OR v.user_id IN (SELECT user_id FROM user_activity WHERE last_active >= ?2))
         {filter}
         GROUP BY e.id
         {order}",
        table = kind.table(),
        votes = kind.votes_table(),
    )
}

fn read_aggregate(row: &rusqlite::Row<'_>) -> rusqlite::Result<AggregateRow> {
    Ok(AggregateRow {
        id: row.get::<_, i64>(0)? as u64,
        name: row.get(1)?,
        stats: Countable {
            count: row.get::<_, i64>(2)? as u64,
            votes: row.get(3)?,
        },
        last_played: row.get::<_, i64>(4)? as u64,
        artist_id: row.get::<_, i64>(5)? as u64,
        genre_id: row.get::<_, i64>(6)? as u64,
    })
}

fn query_aggregates(
    conn: &Connection,
    kind: EntityKind,
    session: i64,
    cutoff: u64,
    sort: SortType,
) -> Result<Vec<AggregateRow>> {
    let mut stmt = conn.prepare_cached(&aggregate_sql(kind, false, sort))?;
    let rows = stmt
        .query_map(params![session, cutoff as i64], read_aggregate)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn query_aggregate(
    conn: &Connection,
    kind: EntityKind,
    id: u64,
    session: i64,
    cutoff: u64,
) -> Result<AggregateRow> {
    let mut stmt = conn.prepare_cached(&aggregate_sql(kind, true, SortType::None))?;
    stmt.query_row(params![session, cutoff as i64, id as i64], read_aggregate)
        .optional()?
        .ok_or_else(|| Error::not_found(format!("{} {} does not exist", kind, id)))
}

fn lookup_map<T>(
    conn: &Connection,
    kind: EntityKind,
    session: i64,
    cutoff: u64,
    convert: fn(AggregateRow) -> T,
) -> Result<FxHashMap<u64, T>> {
    Ok(query_aggregates(conn, kind, session, cutoff, SortType::None)?
        .into_iter()
        .map(|row| (row.id, convert(row)))
        .collect())
}

/// Swap the id-only nested copies for full ones from the same read.
fn attach(mut song: Song, artists: &FxHashMap<u64, Artist>, genres: &FxHashMap<u64, Genre>) -> Song {
    if let Some(artist) = artists.get(&song.artist.id) {
        song.artist = artist.clone();
    }
    if let Some(genre) = genres.get(&song.genre.id) {
        song.genre = genre.clone();
    }
    song
}

fn load_songs(conn: &Connection, session: i64, cutoff: u64, sort: SortType) -> Result<Vec<Song>> {
    let artists = lookup_map(conn, EntityKind::Artist, session, cutoff, AggregateRow::into_artist)?;
    let genres = lookup_map(conn, EntityKind::Genre, session, cutoff, AggregateRow::into_genre)?;
    Ok(query_aggregates(conn, EntityKind::Song, session, cutoff, sort)?
        .into_iter()
        .map(|row| attach(row.into_song(), &artists, &genres))
        .collect())
}

fn load_song(conn: &Connection, id: u64, session: i64, cutoff: u64) -> Result<Song> {
    let mut song = query_aggregate(conn, EntityKind::Song, id, session, cutoff)?.into_song();
    if song.artist.id != 0 {
        song.artist = query_aggregate(conn, EntityKind::Artist, song.artist.id, session, cutoff)?.into_artist();
    }
    if song.genre.id != 0 {
        song.genre = query_aggregate(conn, EntityKind::Genre, song.genre.id, session, cutoff)?.into_genre();
    }
    Ok(song)
}

// ============================================================================
// Sessions & Lookups
// ============================================================================

fn insert_session(conn: &Connection) -> Result<i64> {
    conn.execute("INSERT INTO sessions (created) VALUES (?1)", params![time::timestamp() as i64])?;
    Ok(conn.last_insert_rowid())
}

fn session_exists(conn: &Connection, session: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM sessions WHERE id = ?1", params![session], |_| Ok(()))
        .optional()?
        .is_some())
}

fn resolve_read_session(conn: &Connection, current: i64, requested: i64) -> Result<i64> {
    match requested {
        0 => Ok(current),
        -1 => Err(Error::not_implemented(
            "reading every session except the current one is not supported",
        )),
        id if id < 0 => Err(Error::invalid(format!("invalid session id {}", id))),
        id if session_exists(conn, id)? => Ok(id),
        id => Err(Error::not_found(format!("session {} does not exist", id))),
    }
}

fn resolve_write_session(conn: &Connection, current: i64, requested: i64) -> Result<i64> {
    if requested < 0 {
        return Err(Error::invalid(format!("cannot write to session {}", requested)));
    }
    resolve_read_session(conn, current, requested)
}

fn entity_exists(conn: &Connection, kind: EntityKind, id: u64) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", kind.table());
    Ok(conn
        .prepare_cached(&sql)?
        .query_row(params![id as i64], |_| Ok(()))
        .optional()?
        .is_some())
}

fn is_unplayable(conn: &Connection, song_id: u64) -> Result<bool> {
    Ok(conn
        .prepare_cached("SELECT 1 FROM unplayable WHERE song_id = ?1")?
        .query_row(params![song_id as i64], |_| Ok(()))
        .optional()?
        .is_some())
}

fn upsert_activity(conn: &Connection, user_id: &str, timestamp: u64) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO user_activity (user_id, last_active) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET last_active = excluded.last_active",
    )?
    .execute(params![user_id, timestamp as i64])?;
    Ok(())
}

fn check_user(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(Error::invalid("user id must not be empty"));
    }
    Ok(())
}

/// Current snapshot of a song that may be queued.
fn playable_song(conn: &Connection, session: i64, song_id: u64) -> Result<Song> {
    if song_id == 0 {
        return Err(Error::invalid("cannot queue an unsaved song"));
    }
    if is_unplayable(conn, song_id)? {
        warn!(song_id, "Rejected unplayable song");
        return Err(Error::not_found(format!("song {} is unplayable", song_id)));
    }
    load_song(conn, song_id, session, 0)
}

// ============================================================================
// SqliteStore
// ============================================================================

impl SqliteStore {
    /// Bootstrap the database and pick the session for this handle.
    ///
    /// `options.session_id == 0` starts a new session; a positive id restores
    /// an existing one.
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        let conn = schema::bootstrap(path.as_ref(), options)?;

        let session_id = match options.session_id {
            0 => insert_session(&conn)?,
            id if id > 0 => {
                if !session_exists(&conn, id)? {
                    return Err(Error::not_found(format!("session {} does not exist", id)));
                }
                id
            }
            id => return Err(Error::invalid(format!("invalid session id {}", id))),
        };
        info!(session_id, "Store ready");

        Ok(Self {
            state: Mutex::new(StoreState { conn, session_id }),
            queue: Mutex::new(PlayQueue::default()),
            buffer: Mutex::new(PlayBuffer::default()),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open("", &Options::in_memory())
    }

    /// Close the connection, surfacing any error from SQLite.
    pub fn close(self) -> Result<()> {
        let state = self.state.into_inner()?;
        state.conn.close().map_err(|(_, e)| Error::from(e))?;
        info!("Store closed");
        Ok(())
    }

    fn add_named<E: Entity>(&self, entity: &mut E) -> Result<()> {
        let state = self.state.lock()?;
        let sql = format!("INSERT INTO {} (name) VALUES (?1)", E::KIND.table());
        state.conn.prepare_cached(&sql)?.execute(params![entity.name()])?;

        entity.set_id(state.conn.last_insert_rowid() as u64);
        entity.reset_aggregates();
        debug!(kind = E::KIND.label(), id = entity.id(), name = entity.name(), "Added entity");
        Ok(())
    }

    fn vote<E: Entity>(&self, user_id: &str, entity: &mut E, amount: i64, options: &WriteOptions) -> Result<()> {
        if entity.id() == 0 {
            return Err(Error::invalid(format!("cannot vote on an unsaved {}", E::KIND)));
        }
        check_user(user_id)?;

        let mut state = self.state.lock()?;
        let current = state.session_id;
        let tx = state.conn.transaction()?;

        let session = resolve_write_session(&tx, current, options.session_id)?;
        if !entity_exists(&tx, E::KIND, entity.id())? {
            return Err(Error::not_found(format!("{} {} does not exist", E::KIND, entity.id())));
        }

        upsert_activity(&tx, user_id, time::timestamp())?;
        let sql = format!(
            "INSERT INTO {} (entity_id, session_id, user_id, vote) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(entity_id, session_id, user_id) DO UPDATE SET vote = excluded.vote",
            E::KIND.votes_table()
        );
        tx.prepare_cached(&sql)?
            .execute(params![entity.id() as i64, session, user_id, amount])?;

        let row = query_aggregate(&tx, E::KIND, entity.id(), session, 0)?;
        tx.commit()?;

        entity.set_stats(row.stats);
        Ok(())
    }

    fn read_entities<T>(
        &self,
        kind: EntityKind,
        options: &ReadOptions,
        convert: fn(AggregateRow) -> T,
    ) -> Result<Vec<T>> {
        let state = self.state.lock()?;
        let session = resolve_read_session(&state.conn, state.session_id, options.session_id)?;
        let cutoff = options.activity_cutoff(time::now_millis());

        let mut rows: Vec<T> = query_aggregates(&state.conn, kind, session, cutoff, options.sort)?
            .into_iter()
            .map(convert)
            .collect();
        if options.result_limit > 0 {
            rows.truncate(options.result_limit);
        }
        Ok(rows)
    }
}

impl Store for SqliteStore {
    fn get_songs(&self, set: &mut ResultSet<Song>, options: &ReadOptions) -> Result<()> {
        let state = self.state.lock()?;
        let session = resolve_read_session(&state.conn, state.session_id, options.session_id)?;
        let cutoff = options.activity_cutoff(time::now_millis());

        let mut songs = load_songs(&state.conn, session, cutoff, options.sort)?;
        if options.filter_buffered {
            let buffer = self.buffer.lock()?;
            songs.retain(|s| !buffer.contains(s.id));
        }
        if options.result_limit > 0 {
            songs.truncate(options.result_limit);
        }

        set.replace(songs);
        Ok(())
    }

    fn get_artists(&self, set: &mut ResultSet<Artist>, options: &ReadOptions) -> Result<()> {
        set.replace(self.read_entities(EntityKind::Artist, options, AggregateRow::into_artist)?);
        Ok(())
    }

    fn get_genres(&self, set: &mut ResultSet<Genre>, options: &ReadOptions) -> Result<()> {
        set.replace(self.read_entities(EntityKind::Genre, options, AggregateRow::into_genre)?);
        Ok(())
    }

    fn get_play_history(&self, set: &mut ResultSet<Song>, options: &ReadOptions) -> Result<()> {
        let state = self.state.lock()?;
        let session = resolve_read_session(&state.conn, state.session_id, options.session_id)?;
        let cutoff = options.activity_cutoff(time::now_millis());

        let ids = state
            .conn
            .prepare_cached("SELECT song_id FROM play_history WHERE session_id = ?1 ORDER BY timestamp DESC")?
            .query_map(params![session], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let limit = if options.result_limit > 0 { options.result_limit } else { ids.len() };
        let songs = ids
            .into_iter()
            .take(limit)
            .map(|id| load_song(&state.conn, id as u64, session, cutoff))
            .collect::<Result<Vec<_>>>()?;

        set.replace(songs);
        Ok(())
    }

    fn add_song(&self, song: &mut Song) -> Result<()> {
        let state = self.state.lock()?;
        for (kind, id) in [
            (EntityKind::Artist, song.artist.id),
            (EntityKind::Genre, song.genre.id),
        ] {
            if id != 0 && !entity_exists(&state.conn, kind, id)? {
                return Err(Error::not_found(format!("{} {} does not exist", kind, id)));
            }
        }

        state
            .conn
            .prepare_cached("INSERT INTO songs (name, artist_id, genre_id) VALUES (?1, ?2, ?3)")?
            .execute(params![song.name, song.artist.id as i64, song.genre.id as i64])?;

        song.id = state.conn.last_insert_rowid() as u64;
        song.reset_aggregates();
        debug!(id = song.id, name = %song.name, artist_id = song.artist.id, genre_id = song.genre.id, "Added song");
        Ok(())
    }

    fn add_artist(&self, artist: &mut Artist) -> Result<()> {
        self.add_named(artist)
    }

    fn add_genre(&self, genre: &mut Genre) -> Result<()> {
        self.add_named(genre)
    }

    fn vote_song(&self, user_id: &str, song: &mut Song, amount: i64, options: &WriteOptions) -> Result<()> {
        self.vote(user_id, song, amount, options)
    }

    fn vote_artist(&self, user_id: &str, artist: &mut Artist, amount: i64, options: &WriteOptions) -> Result<()> {
        self.vote(user_id, artist, amount, options)
    }

    fn vote_genre(&self, user_id: &str, genre: &mut Genre, amount: i64, options: &WriteOptions) -> Result<()> {
        self.vote(user_id, genre, amount, options)
    }

    fn set_activity(&self, user_id: &str, timestamp: u64) -> Result<()> {
        check_user(user_id)?;
        let state = self.state.lock()?;
        upsert_activity(&state.conn, user_id, timestamp)
    }

    fn get_queue(&self, set: &mut ResultSet<Song>) -> Result<()> {
        set.replace(self.queue.lock()?.snapshot());
        Ok(())
    }

    fn queue_song(&self, song_id: u64) -> Result<()> {
        let state = self.state.lock()?;
        let song = playable_song(&state.conn, state.session_id, song_id)?;

        let mut queue = self.queue.lock()?;
        queue.push(song);
        debug!(song_id, queue_len = queue.len(), "Queued song");
        Ok(())
    }

    fn set_queue(&self, song_ids: &[u64]) -> Result<()> {
        let state = self.state.lock()?;
        let songs = song_ids
            .iter()
            .map(|&id| playable_song(&state.conn, state.session_id, id))
            .collect::<Result<Vec<_>>>()?;

        self.queue.lock()?.replace(songs);
        debug!(queue_len = song_ids.len(), "Replaced queue");
        Ok(())
    }

    fn clear_queue(&self) -> Result<()> {
        self.queue.lock()?.clear();
        Ok(())
    }

    fn mark_unplayable(&self, song_id: u64) -> Result<()> {
        if song_id == 0 {
            return Err(Error::invalid("cannot mark an unsaved song unplayable"));
        }
        let state = self.state.lock()?;
        state
            .conn
            .execute("INSERT OR IGNORE INTO unplayable (song_id) VALUES (?1)", params![song_id as i64])?;
        Ok(())
    }

    fn get_buffer(&self, set: &mut ResultSet<Song>) -> Result<()> {
        set.replace(self.buffer.lock()?.snapshot());
        Ok(())
    }

    fn buffer_next(&self) -> Result<Song> {
        let mut queue = self.queue.lock()?;
        let song = queue.pop().ok_or_else(|| Error::invalid("Queue empty"))?;

        let mut buffer = self.buffer.lock()?;
        buffer.push(song.clone());
        debug!(song_id = song.id, buffer_len = buffer.len(), "Buffered song");
        Ok(song)
    }

    fn song_finished(&self) -> Result<Song> {
        let state = self.state.lock()?;
        let mut buffer = self.buffer.lock()?;
        let song_id = buffer
            .front()
            .map(|s| s.id)
            .ok_or_else(|| Error::invalid("Buffer empty"))?;

        // History first: a failed write leaves the buffer untouched.
        let timestamp = time::timestamp();
        state
            .conn
            .prepare_cached(
                "INSERT INTO play_history (song_id, session_id, timestamp) VALUES (?1, ?2, ?3)
                 ON CONFLICT(song_id, session_id) DO UPDATE SET timestamp = excluded.timestamp",
            )?
            .execute(params![song_id as i64, state.session_id, timestamp as i64])?;

        let mut song = buffer.pop().ok_or_else(|| Error::invalid("Buffer empty"))?;
        song.last_played = timestamp;
        debug!(song_id, timestamp, "Song finished");
        Ok(song)
    }

    fn insert_normalized(&self, key: &str, song_id: u64, artist_id: u64, genre_id: u64) -> Result<()> {
        if key.is_empty() {
            return Err(Error::invalid("normalized key must not be empty"));
        }

        let mut state = self.state.lock()?;
        let tx = state.conn.transaction()?;

        // Zero components never erase a stored link.
        tx.prepare_cached(
            "INSERT INTO normalized (key, song_id, artist_id, genre_id) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                song_id   = CASE WHEN excluded.song_id   != 0 THEN excluded.song_id   ELSE normalized.song_id   END,
                artist_id = CASE WHEN excluded.artist_id != 0 THEN excluded.artist_id ELSE normalized.artist_id END,
                genre_id  = CASE WHEN excluded.genre_id  != 0 THEN excluded.genre_id  ELSE normalized.genre_id  END",
        )?
        .execute(params![key, song_id as i64, artist_id as i64, genre_id as i64])?;

        // The linked song picks up whatever artist/genre it is still missing.
        tx.prepare_cached(
            "UPDATE songs SET
                artist_id = CASE WHEN songs.artist_id = 0 THEN n.artist_id ELSE songs.artist_id END,
                genre_id  = CASE WHEN songs.genre_id  = 0 THEN n.genre_id  ELSE songs.genre_id  END
             FROM (SELECT song_id, artist_id, genre_id FROM normalized WHERE key = ?1) AS n
             WHERE songs.id = n.song_id AND n.song_id != 0",
        )?
        .execute(params![key])?;

        tx.commit()?;
        debug!(key, song_id, artist_id, genre_id, "Linked normalized key");
        Ok(())
    }

    fn get_normalized(&self, song: &mut Song, key: &str) -> Result<()> {
        let state = self.state.lock()?;
        let session = state.session_id;

        let (song_id, artist_id, genre_id) = state
            .conn
            .prepare_cached("SELECT song_id, artist_id, genre_id FROM normalized WHERE key = ?1")?
            .query_row(params![key], |row| {
                Ok((
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                    row.get::<_, i64>(2)? as u64,
                ))
            })
            .optional()?
            .ok_or_else(|| Error::not_found(format!("no mapping for '{}'", key)))?;

        if song_id != 0 {
            let row = query_aggregate(&state.conn, EntityKind::Song, song_id, session, 0)?;
            song.id = row.id;
            song.name = row.name;
            song.stats = row.stats;
            song.last_played = row.last_played;
        }
        if artist_id != 0 {
            song.artist = query_aggregate(&state.conn, EntityKind::Artist, artist_id, session, 0)?.into_artist();
        }
        if genre_id != 0 {
            song.genre = query_aggregate(&state.conn, EntityKind::Genre, genre_id, session, 0)?.into_genre();
        }
        Ok(())
    }

    fn create_session(&self) -> Result<i64> {
        let mut state = self.state.lock()?;
        let session_id = insert_session(&state.conn)?;
        info!(previous = state.session_id, session_id, "Created session");
        state.session_id = session_id;
        Ok(session_id)
    }

    fn get_session(&self) -> Result<i64> {
        Ok(self.state.lock()?.session_id)
    }

    fn get_session_count(&self) -> Result<i64> {
        let state = self.state.lock()?;
        Ok(state.conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    fn get_session_user_count(&self, options: &ReadOptions) -> Result<u64> {
        let state = self.state.lock()?;
        let session = resolve_read_session(&state.conn, state.session_id, options.session_id)?;
        let cutoff = options.activity_cutoff(time::now_millis());

        let count: i64 = state.conn.query_row(
            "SELECT COUNT(DISTINCT user_id) FROM (
                SELECT user_id FROM song_votes WHERE session_id = ?1
                UNION ALL SELECT user_id FROM artist_votes WHERE session_id = ?1
                UNION ALL SELECT user_id FROM genre_votes WHERE session_id = ?1
             )
             WHERE ?2 = 0 OR user_id IN (SELECT user_id FROM user_activity WHERE last_active >= ?2)",
            params![session, cutoff as i64],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
