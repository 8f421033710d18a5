//! Queue and buffer of the play pipeline.
//!
//! Songs move queue -> buffer -> finished. Entries are snapshots taken at
//! enqueue time. When both are locked, the queue is locked first.

use crate::models::Song;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Songs about to play, FIFO.
#[derive(Debug, Default)]
pub struct PlayQueue {
    songs: VecDeque<Song>,
}

impl PlayQueue {
    pub fn push(&mut self, song: Song) {
        self.songs.push_back(song);
    }

    pub fn pop(&mut self) -> Option<Song> {
        self.songs.pop_front()
    }

    pub fn replace(&mut self, songs: Vec<Song>) {
        self.songs = songs.into();
    }

    pub fn clear(&mut self) {
        self.songs.clear();
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Song> {
        self.songs.iter().cloned().collect()
    }
}

/// Songs staged or playing.
///
/// Buffered ids are tracked with multiplicity so a song buffered twice stays
/// filtered until both entries finish.
#[derive(Debug, Default)]
pub struct PlayBuffer {
    songs: VecDeque<Song>,
    ids: FxHashMap<u64, usize>,
}

impl PlayBuffer {
    pub fn push(&mut self, song: Song) {
        *self.ids.entry(song.id).or_insert(0) += 1;
        self.songs.push_back(song);
    }

    pub fn front(&self) -> Option<&Song> {
        self.songs.front()
    }

    pub fn pop(&mut self) -> Option<Song> {
        let song = self.songs.pop_front()?;
        if let Some(n) = self.ids.get_mut(&song.id) {
            *n -= 1;
            if *n == 0 {
                self.ids.remove(&song.id);
            }
        }
        Some(song)
    }

    pub fn contains(&self, song_id: u64) -> bool {
        self.ids.contains_key(&song_id)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Song> {
        self.songs.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: u64) -> Song {
        let mut s = Song::named(format!("s{}", id));
        s.id = id;
        s
    }

    #[test]
    fn test_queue_fifo() {
        let mut q = PlayQueue::default();
        q.push(song(1));
        q.push(song(2));
        assert_eq!(q.pop().map(|s| s.id), Some(1));
        assert_eq!(q.pop().map(|s| s.id), Some(2));
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_buffer_ids_have_multiplicity() {
        let mut b = PlayBuffer::default();
        b.push(song(4));
        b.push(song(4));
        assert!(b.contains(4));

        b.pop();
        assert!(b.contains(4));
        b.pop();
        assert!(!b.contains(4));
        assert!(b.is_empty());
    }

    #[test]
    fn test_snapshots_are_copies() {
        let mut q = PlayQueue::default();
        q.push(song(1));
        let mut snap = q.snapshot();
        snap[0].name = "changed".to_string();
        assert_eq!(q.snapshot()[0].name, "s1");
    }
}
