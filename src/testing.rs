//! Deterministic fixtures for tests and benchmarks.

use crate::db::Db;
use crate::error::{Error, Result};
use crate::models::{Artist, Genre, Song};
use crate::options::{ReadOptions, SortType, WriteOptions};
use crate::result_set::ResultSet;
use crate::store::Store;

#[derive(Debug, Clone, Default)]
pub struct PopulatorData {
    pub songs: Vec<Song>,
    pub artists: Vec<Artist>,
    pub genres: Vec<Genre>,
}

/// Entities `g{i}`, `a{i}` and `s{i}` with the ids a fresh database assigns.
///
/// Song `i` belongs to artist `i % num_artists` and genre `i % num_genres`; a
/// kind with no entries leaves the songs unlinked to it.
pub fn populator_data(num_songs: usize, num_artists: usize, num_genres: usize) -> PopulatorData {
    let genres: Vec<Genre> = (0..num_genres)
        .map(|i| Genre {
            id: i as u64 + 1,
            ..Genre::named(format!("g{}", i))
        })
        .collect();
    let artists: Vec<Artist> = (0..num_artists)
        .map(|i| Artist {
            id: i as u64 + 1,
            ..Artist::named(format!("a{}", i))
        })
        .collect();
    let songs = (0..num_songs)
        .map(|i| Song {
            id: i as u64 + 1,
            artist: artists.get(i % num_artists.max(1)).cloned().unwrap_or_default(),
            genre: genres.get(i % num_genres.max(1)).cloned().unwrap_or_default(),
            ..Song::named(format!("s{}", i))
        })
        .collect();

    PopulatorData { songs, artists, genres }
}

/// Insert the populator entities without any votes.
pub fn populate_empty(db: &Db, num_songs: usize, num_artists: usize, num_genres: usize) -> Result<()> {
    let mut data = populator_data(num_songs, num_artists, num_genres);
    for genre in &mut data.genres {
        db.add_genre(genre)?;
    }
    for artist in &mut data.artists {
        db.add_artist(artist)?;
    }
    for song in &mut data.songs {
        db.add_song(song)?;
    }
    Ok(())
}

/// Insert the populator entities and vote across `num_sessions` sessions.
///
/// In session `i` the `j`-th entity of each kind (insertion order) gets
/// `2i + j + 2` voters and a vote total of `2i + n - j`, so counts increase
/// while votes decrease along insertion order. The last session stays current.
pub fn populate_full(
    db: &Db,
    num_songs: usize,
    num_artists: usize,
    num_genres: usize,
    num_sessions: usize,
) -> Result<()> {
    let store = db.store();
    if store.get_session_count()? > 1 {
        return Err(Error::invalid("Cannot populate a non-empty database."));
    }
    populate_empty(db, num_songs, num_artists, num_genres)?;

    let options = ReadOptions {
        sort: SortType::None,
        inactivity_threshold: 0,
        filter_buffered: false,
        ..ReadOptions::default()
    };
    let mut songs = ResultSet::new();
    let mut artists = ResultSet::new();
    let mut genres = ResultSet::new();
    db.get_songs(&mut songs, &options)?;
    db.get_artists(&mut artists, &options)?;
    db.get_genres(&mut genres, &options)?;
    if songs.len() != num_songs {
        return Err(Error::invalid("Invalid number of songs"));
    }

    let write = WriteOptions::default();
    for i in 0..num_sessions {
        for (j, song) in songs.iter().enumerate() {
            let mut t = song.clone();
            for user in voters(i, j) {
                db.vote_song(&user, &mut t, 0, &write)?;
            }
            db.vote_song("user", &mut t, vote_total(i, songs.len(), j), &write)?;
        }
        for (j, artist) in artists.iter().enumerate() {
            let mut t = artist.clone();
            for user in voters(i, j) {
                db.vote_artist(&user, &mut t, 0, &write)?;
            }
            db.vote_artist("user", &mut t, vote_total(i, artists.len(), j), &write)?;
        }
        for (j, genre) in genres.iter().enumerate() {
            let mut t = genre.clone();
            for user in voters(i, j) {
                db.vote_genre(&user, &mut t, 0, &write)?;
            }
            db.vote_genre("user", &mut t, vote_total(i, genres.len(), j), &write)?;
        }

        if i + 1 != num_sessions {
            store.create_session()?;
        }
    }
    Ok(())
}

fn voters(session: usize, index: usize) -> impl Iterator<Item = String> {
    (0..2 * session + index + 1).map(|k| format!("u{}", k))
}

fn vote_total(session: usize, len: usize, index: usize) -> i64 {
    (2 * session + len) as i64 - index as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Countable;

    #[test]
    fn test_populator_data_links() {
        let data = populator_data(5, 2, 3);
        assert_eq!(data.songs[4].name, "s4");
        assert_eq!(data.songs[4].artist.name, "a0");
        assert_eq!(data.songs[4].genre.name, "g1");
        assert_eq!(data.genres[2].id, 3);
    }

    #[test]
    fn test_populate_empty_assigns_expected_ids() {
        let db = Db::in_memory().unwrap();
        populate_empty(&db, 6, 3, 2).unwrap();

        let expected = populator_data(6, 3, 2);
        let mut songs = ResultSet::new();
        db.get_songs(
            &mut songs,
            &ReadOptions {
                sort: SortType::None,
                ..ReadOptions::default()
            },
        )
        .unwrap();
        for (got, want) in songs.iter().zip(&expected.songs) {
            assert_eq!(got.id, want.id);
            assert_eq!(got.artist.id, want.artist.id);
            assert_eq!(got.genre.id, want.genre.id);
        }
    }

    #[test]
    fn test_populate_full_shapes_each_session() {
        let db = Db::in_memory().unwrap();
        populate_full(&db, 4, 2, 2, 3).unwrap();
        assert_eq!(db.get_session_count().unwrap(), 3);

        for session in 1..=3i64 {
            let i = (session - 1) as u64;
            let mut songs = ResultSet::new();
            db.get_songs(
                &mut songs,
                &ReadOptions {
                    sort: SortType::None,
                    ..ReadOptions::session(session)
                },
            )
            .unwrap();
            for (j, song) in songs.iter().enumerate() {
                let j = j as u64;
                assert_eq!(
                    song.stats,
                    Countable {
                        count: 2 * i + j + 2,
                        votes: (2 * i + 4 - j) as i64,
                    }
                );
            }
        }

        let mut artists = ResultSet::new();
        db.get_artists(&mut artists, &ReadOptions::default()).unwrap();
        assert_eq!(artists.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_populate_full_rejects_used_database() {
        let db = Db::in_memory().unwrap();
        db.store().create_session().unwrap();
        assert!(populate_full(&db, 1, 1, 1, 1).unwrap_err().is_error());
    }
}
