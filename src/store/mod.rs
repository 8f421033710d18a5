//! The store engine.
//!
//! [`Store`] is the contract consulted by both the facade and the mapper.
//! [`SqliteStore`] is the one backend; `Options::memory_only` covers the
//! in-memory use case with the same code.

mod pipeline;
mod schema;
mod sqlite_store;

pub use pipeline::{PlayBuffer, PlayQueue};
pub use sqlite_store::SqliteStore;

use crate::error::Result;
use crate::models::{Artist, Genre, Song};
use crate::options::{ReadOptions, WriteOptions};
use crate::result_set::ResultSet;

/// Session-scoped storage of entities, votes, play history and the
/// normalized index.
///
/// Every method is synchronous and runs under the store's lock discipline.
/// Session id 0 always resolves to the session that is current at call time,
/// and any operation handed an unpersisted entity (id 0) fails.
pub trait Store: Send + Sync {
    fn get_songs(&self, set: &mut ResultSet<Song>, options: &ReadOptions) -> Result<()>;
    fn get_artists(&self, set: &mut ResultSet<Artist>, options: &ReadOptions) -> Result<()>;
    fn get_genres(&self, set: &mut ResultSet<Genre>, options: &ReadOptions) -> Result<()>;

    /// Songs finished in the resolved session, most recent first.
    fn get_play_history(&self, set: &mut ResultSet<Song>, options: &ReadOptions) -> Result<()>;

    /// Assigns the next id for the kind and zeroes the aggregates.
    fn add_song(&self, song: &mut Song) -> Result<()>;
    fn add_artist(&self, artist: &mut Artist) -> Result<()>;
    fn add_genre(&self, genre: &mut Genre) -> Result<()>;

    /// Replaces the user's vote for the entity in the resolved session and
    /// writes the new aggregate back into `song`.
    fn vote_song(&self, user_id: &str, song: &mut Song, amount: i64, options: &WriteOptions) -> Result<()>;
    fn vote_artist(&self, user_id: &str, artist: &mut Artist, amount: i64, options: &WriteOptions) -> Result<()>;
    fn vote_genre(&self, user_id: &str, genre: &mut Genre, amount: i64, options: &WriteOptions) -> Result<()>;

    fn set_activity(&self, user_id: &str, timestamp: u64) -> Result<()>;

    fn get_queue(&self, set: &mut ResultSet<Song>) -> Result<()>;
    fn queue_song(&self, song_id: u64) -> Result<()>;
    /// All-or-nothing replacement of the queue.
    fn set_queue(&self, song_ids: &[u64]) -> Result<()>;
    fn clear_queue(&self) -> Result<()>;
    fn mark_unplayable(&self, song_id: u64) -> Result<()>;

    fn get_buffer(&self, set: &mut ResultSet<Song>) -> Result<()>;
    /// Moves the queue head to the buffer tail.
    fn buffer_next(&self) -> Result<Song>;
    /// Pops the buffer head and records the play.
    fn song_finished(&self) -> Result<Song>;

    fn insert_normalized(&self, key: &str, song_id: u64, artist_id: u64, genre_id: u64) -> Result<()>;
    /// Fills the non-zero components of the stored link into `song`.
    fn get_normalized(&self, song: &mut Song, key: &str) -> Result<()>;

    fn create_session(&self) -> Result<i64>;
    fn get_session(&self) -> Result<i64>;
    fn get_session_count(&self) -> Result<i64>;
    fn get_session_user_count(&self, options: &ReadOptions) -> Result<u64>;
}
