//! The database handle.

use crate::error::Result;
use crate::mapper::Mapper;
use crate::models::{Artist, Genre, Song};
use crate::options::{Options, ReadOptions, WriteOptions};
use crate::result_set::ResultSet;
use crate::store::{SqliteStore, Store};
use std::path::Path;

/// An open skrillex database.
///
/// `close` consumes the handle, and a [`Mapper`] borrows it, so a closed
/// database can never be reached again.
pub struct Db {
    store: SqliteStore,
}

impl Db {
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self> {
        Ok(Self {
            store: SqliteStore::open(path, options)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open("", &Options::in_memory())
    }

    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Session this handle writes to by default.
    pub fn session_id(&self) -> Result<i64> {
        self.store.get_session()
    }

    pub fn mapper(&self) -> Mapper<'_> {
        Mapper::new(&self.store)
    }

    pub(crate) fn store(&self) -> &dyn Store {
        &self.store
    }

    pub fn get_songs(&self, set: &mut ResultSet<Song>, options: &ReadOptions) -> Result<()> {
        self.store.get_songs(set, options)
    }

    pub fn get_artists(&self, set: &mut ResultSet<Artist>, options: &ReadOptions) -> Result<()> {
        self.store.get_artists(set, options)
    }

    pub fn get_genres(&self, set: &mut ResultSet<Genre>, options: &ReadOptions) -> Result<()> {
        self.store.get_genres(set, options)
    }

    pub fn get_play_history(&self, set: &mut ResultSet<Song>, options: &ReadOptions) -> Result<()> {
        self.store.get_play_history(set, options)
    }

    pub fn add_song(&self, song: &mut Song) -> Result<()> {
        self.store.add_song(song)
    }

    pub fn add_artist(&self, artist: &mut Artist) -> Result<()> {
        self.store.add_artist(artist)
    }

    pub fn add_genre(&self, genre: &mut Genre) -> Result<()> {
        self.store.add_genre(genre)
    }

    pub fn vote_song(&self, user_id: &str, song: &mut Song, amount: i64, options: &WriteOptions) -> Result<()> {
        self.store.vote_song(user_id, song, amount, options)
    }

    pub fn vote_artist(&self, user_id: &str, artist: &mut Artist, amount: i64, options: &WriteOptions) -> Result<()> {
        self.store.vote_artist(user_id, artist, amount, options)
    }

    pub fn vote_genre(&self, user_id: &str, genre: &mut Genre, amount: i64, options: &WriteOptions) -> Result<()> {
        self.store.vote_genre(user_id, genre, amount, options)
    }

    pub fn set_activity(&self, user_id: &str, timestamp: u64) -> Result<()> {
        self.store.set_activity(user_id, timestamp)
    }

    pub fn get_queue(&self, set: &mut ResultSet<Song>) -> Result<()> {
        self.store.get_queue(set)
    }

    pub fn queue_song(&self, song_id: u64) -> Result<()> {
        self.store.queue_song(song_id)
    }

    pub fn set_queue(&self, song_ids: &[u64]) -> Result<()> {
        self.store.set_queue(song_ids)
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.store.clear_queue()
    }

    pub fn mark_unplayable(&self, song_id: u64) -> Result<()> {
        self.store.mark_unplayable(song_id)
    }

    pub fn get_buffer(&self, set: &mut ResultSet<Song>) -> Result<()> {
        self.store.get_buffer(set)
    }

    pub fn buffer_next(&self) -> Result<Song> {
        self.store.buffer_next()
    }

    pub fn song_finished(&self) -> Result<Song> {
        self.store.song_finished()
    }

    pub fn get_session_count(&self) -> Result<i64> {
        self.store.get_session_count()
    }

    pub fn get_session_user_count(&self, options: &ReadOptions) -> Result<u64> {
        self.store.get_session_user_count(options)
    }
}
