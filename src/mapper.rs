//! Free-text to entity resolution.
//!
//! Every resolved field is memoized in the store's normalized index, so the
//! same text (up to normalization) maps to the same entity forever after. A
//! song's genre can be linked on a later call; its artist cannot.

use crate::error::{Error, Result};
use crate::models::{Artist, Genre, Song};
use crate::normalize::{combine, normalize, FieldKind};
use crate::store::Store;
use std::sync::Mutex;
use tracing::debug;

pub struct Mapper<'a> {
    store: &'a dyn Store,
    lock: Mutex<()>,
}

impl<'a> Mapper<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Resolve a `(song, artist, genre)` triple, creating whatever is missing.
    ///
    /// Empty fields are skipped, except that an artist and genre without a
    /// song is rejected. Not transactional: entities created before a failing
    /// step stay persisted, and retrying is safe.
    pub fn map(&self, song: &str, artist: &str, genre: &str) -> Result<Song> {
        let (song, artist, genre) = (song.trim(), artist.trim(), genre.trim());
        if song.is_empty() && !artist.is_empty() && !genre.is_empty() {
            return Err(Error::invalid("Invalid operation: Can not map <artist, genre>"));
        }

        let _guard = self.lock.lock()?;
        let mut result = Song::default();

        if !genre.is_empty() {
            let key = normalize(FieldKind::Genre, genre);
            if self.resolve(&mut result, &key)? {
                result.genre = Genre::named(genre);
                self.store.add_genre(&mut result.genre)?;
                self.store.insert_normalized(&key, 0, 0, result.genre.id)?;
                debug!(genre, id = result.genre.id, "Mapped new genre");
            }
        }

        if !artist.is_empty() {
            let key = normalize(FieldKind::Artist, artist);
            if self.resolve(&mut result, &key)? {
                result.artist = Artist::named(artist);
                self.store.add_artist(&mut result.artist)?;
                self.store.insert_normalized(&key, 0, result.artist.id, 0)?;
                debug!(artist, id = result.artist.id, "Mapped new artist");
            }
        }

        if !song.is_empty() {
            let key = combine(song, artist);
            if self.resolve(&mut result, &key)? {
                result.name = song.to_string();
                self.store.add_song(&mut result)?;
                self.store
                    .insert_normalized(&key, result.id, result.artist.id, result.genre.id)?;
                debug!(song, id = result.id, "Mapped new song");
            } else if !genre.is_empty() {
                // Look at the stored link alone; `result` already carries the
                // genre resolved above.
                let mut stored = Song::default();
                self.store.get_normalized(&mut stored, &key)?;
                if stored.genre.id == 0 {
                    self.store
                        .insert_normalized(&key, result.id, result.artist.id, result.genre.id)?;
                    debug!(song, genre_id = result.genre.id, "Linked genre to existing song");
                }
            }
        }

        Ok(result)
    }

    /// Find the song previously mapped from `(song, artist)`.
    pub fn lookup(&self, song: &str, artist: &str) -> Result<Song> {
        let (song, artist) = (song.trim(), artist.trim());
        if song.is_empty() {
            return Err(Error::invalid("Must specify song name when performing lookup"));
        }

        let mut result = Song::default();
        self.store.get_normalized(&mut result, &combine(song, artist))?;
        Ok(result)
    }

    pub fn lookup_artist(&self, artist: &str) -> Result<Artist> {
        let key = Self::single_key(FieldKind::Artist, artist)?;
        let mut result = Song::default();
        self.store.get_normalized(&mut result, &key)?;
        if result.artist.id == 0 {
            return Err(Error::not_found(format!("no artist mapped for '{}'", artist.trim())));
        }
        Ok(result.artist)
    }

    pub fn lookup_genre(&self, genre: &str) -> Result<Genre> {
        let key = Self::single_key(FieldKind::Genre, genre)?;
        let mut result = Song::default();
        self.store.get_normalized(&mut result, &key)?;
        if result.genre.id == 0 {
            return Err(Error::not_found(format!("no genre mapped for '{}'", genre.trim())));
        }
        Ok(result.genre)
    }

    fn single_key(kind: FieldKind, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::invalid("Must specify a name when performing lookup"));
        }
        Ok(normalize(kind, text))
    }

    /// Fill `result` from the index. `Ok(true)` means the key is unmapped.
    fn resolve(&self, result: &mut Song, key: &str) -> Result<bool> {
        match self.store.get_normalized(result, key) {
            Ok(()) => Ok(false),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReadOptions;
    use crate::result_set::ResultSet;
    use crate::store::SqliteStore;
    use rayon::prelude::*;

    fn artist_count(store: &SqliteStore) -> usize {
        let mut set = ResultSet::new();
        store.get_artists(&mut set, &ReadOptions::default()).unwrap();
        set.len()
    }

    fn genre_count(store: &SqliteStore) -> usize {
        let mut set = ResultSet::new();
        store.get_genres(&mut set, &ReadOptions::default()).unwrap();
        set.len()
    }

    fn song_count(store: &SqliteStore) -> usize {
        let mut set = ResultSet::new();
        store.get_songs(&mut set, &ReadOptions::default()).unwrap();
        set.len()
    }

    #[test]
    fn test_map_walkthrough() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        let song = mapper.map("", "", "  Genre").unwrap();
        assert_eq!(song.genre.id, 1);
        assert_eq!(song.genre.name, "Genre");

        let song = mapper.map("", "", " Genre").unwrap();
        assert_eq!(song.genre.id, 1);
        assert_eq!(genre_count(&store), 1);

        let song = mapper.map("", "   Kanye", "").unwrap();
        assert_eq!(song.artist.id, 1);
        assert_eq!(song.artist.name, "Kanye");
        mapper.map("", "   Kanye", "").unwrap();
        assert_eq!(artist_count(&store), 1);

        assert!(mapper.map("", " Kanye", "Genre  ").unwrap_err().is_error());

        // Artist and song only; genre not linked yet.
        let song = mapper.map("Gay Fish", "Kanye", "").unwrap();
        assert_eq!((song.id, song.artist.id, song.genre.id), (1, 1, 0));
        assert_eq!(song.name, "Gay Fish");

        // Link the genre.
        let song = mapper.map("Gay Fish", "Kanye", "Genre").unwrap();
        assert_eq!((song.id, song.artist.id, song.genre.id), (1, 1, 1));

        // Now the genre comes along implicitly.
        let song = mapper.map("Gay Fish", "Kanye", "").unwrap();
        assert_eq!((song.id, song.artist.id, song.genre.id), (1, 1, 1));

        // A dirty entry reaps the full benefit.
        let song = mapper.map("Kanye - Gay Fish", "", "").unwrap();
        assert_eq!((song.id, song.artist.id, song.genre.id), (1, 1, 1));
        assert_eq!(song.name, "Gay Fish");

        let song = mapper.lookup("Kanye - Gay Fish", "").unwrap();
        assert_eq!((song.id, song.artist.id, song.genre.id), (1, 1, 1));
        assert_eq!(song.name, "Gay Fish");

        let artist = mapper.lookup_artist("Kanye").unwrap();
        assert_eq!(artist.id, 1);
        assert_eq!(artist.name, "Kanye");

        assert!(mapper.lookup("", "Kanye").unwrap_err().is_error());
        assert!(mapper.lookup("Romeo", "Taylor Fish").unwrap_err().is_not_found());

        assert_eq!(song_count(&store), 1);
    }

    #[test]
    fn test_map_is_idempotent_under_normalization() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        let first = mapper.map("Runaway", "Kanye West", "Hip-Hop").unwrap();
        let second = mapper.map("  RUNAWAY!", "kanye   west", "hip hop").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.artist.id, second.artist.id);
        assert_eq!(first.genre.id, second.genre.id);
        // Canonical names stay as first seen.
        assert_eq!(second.artist.name, "Kanye West");

        assert_eq!((song_count(&store), artist_count(&store), genre_count(&store)), (1, 1, 1));
    }

    #[test]
    fn test_genre_link_is_write_once() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        let song = mapper.map("Stronger", "Kanye", "Rap").unwrap();
        let rap = song.genre.id;
        let again = mapper.map("Stronger", "Kanye", "Pop").unwrap();
        assert_eq!(again.id, song.id);

        let looked = mapper.lookup("Stronger", "Kanye").unwrap();
        assert_eq!(looked.genre.id, rap);
        assert_eq!(genre_count(&store), 2);
    }

    #[test]
    fn test_deferred_genre_shows_in_listings() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        mapper.map("Gay Fish", "Kanye", "").unwrap();
        mapper.map("Gay Fish", "Kanye", "Rap").unwrap();

        let mut set = ResultSet::new();
        store.get_songs(&mut set, &ReadOptions::default()).unwrap();
        assert_eq!(set[0].genre.name, "Rap");
        assert_eq!(set[0].artist.name, "Kanye");
    }

    #[test]
    fn test_same_name_different_fields() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        let as_artist = mapper.map("", "Rock", "").unwrap();
        let as_genre = mapper.map("", "", "Rock").unwrap();
        assert_eq!(as_artist.artist.id, 1);
        assert_eq!(as_genre.genre.id, 1);
        assert_eq!(mapper.lookup_genre("rock").unwrap().name, "Rock");
        assert_eq!(mapper.lookup_artist("ROCK").unwrap().name, "Rock");
    }

    #[test]
    fn test_lookup_single_fields() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        assert!(mapper.lookup_artist("  ").unwrap_err().is_error());
        assert!(mapper.lookup_genre("").unwrap_err().is_error());
        assert!(mapper.lookup_artist("Nobody").unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_triple_is_noop() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        let song = mapper.map("", "  ", "").unwrap();
        assert_eq!(song.id, 0);
        assert_eq!((song_count(&store), artist_count(&store), genre_count(&store)), (0, 0, 0));
    }

    #[test]
    fn test_concurrent_maps_do_not_duplicate() {
        let store = SqliteStore::in_memory().unwrap();
        let mapper = Mapper::new(&store);

        let ids: Vec<u64> = (0..16)
            .into_par_iter()
            .map(|_| mapper.map("Power", "Kanye", "Rap").unwrap().id)
            .collect();
        assert!(ids.iter().all(|&id| id == ids[0]));
        assert_eq!((song_count(&store), artist_count(&store), genre_count(&store)), (1, 1, 1));
    }
}
