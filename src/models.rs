//! Core data models for the voting store.
//!
//! Entities are passive records. A `Song` embeds copies of its `Artist` and
//! `Genre`; updating the canonical artist does not touch songs that were
//! already read.

use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================================================
// Entity Kinds
// ============================================================================

/// Which table family an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Song,
    Artist,
    Genre,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Song => "song",
            EntityKind::Artist => "artist",
            EntityKind::Genre => "genre",
        }
    }

    pub(crate) fn table(self) -> &'static str {
        match self {
            EntityKind::Song => "songs",
            EntityKind::Artist => "artists",
            EntityKind::Genre => "genres",
        }
    }

    pub(crate) fn votes_table(self) -> &'static str {
        match self {
            EntityKind::Song => "song_votes",
            EntityKind::Artist => "artist_votes",
            EntityKind::Genre => "genre_votes",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Countable
// ============================================================================

/// Per-session tally for one entity.
///
/// `count` is the number of distinct users with an activity record (votes of
/// amount zero included); `votes` is the sum of their latest vote amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Countable {
    pub count: u64,
    pub votes: i64,
}

/// Shared shape of `Song`, `Artist` and `Genre`.
pub trait Entity: Clone + fmt::Debug + Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn name(&self) -> &str;
    fn stats(&self) -> Countable;
    fn set_stats(&mut self, stats: Countable);
    fn last_played(&self) -> u64;
    fn set_last_played(&mut self, timestamp: u64);

    /// Back to the freshly-created state: zero tally, never played.
    fn reset_aggregates(&mut self) {
        self.set_stats(Countable::default());
        self.set_last_played(0);
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct Artist {
    /// 0 until persisted.
    pub id: u64,
    pub name: String,
    #[serde(flatten)]
    pub stats: Countable,
    /// Epoch millis, 0 = never.
    pub last_played: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
    #[serde(flatten)]
    pub stats: Countable,
    pub last_played: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Song {
    pub id: u64,
    pub name: String,
    pub artist: Artist,
    pub genre: Genre,
    #[serde(flatten)]
    pub stats: Countable,
    pub last_played: u64,
}

impl Artist {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Genre {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Song {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr, $label:literal) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> u64 {
                self.id
            }
            fn set_id(&mut self, id: u64) {
                self.id = id;
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn stats(&self) -> Countable {
                self.stats
            }
            fn set_stats(&mut self, stats: Countable) {
                self.stats = stats;
            }
            fn last_played(&self) -> u64 {
                self.last_played
            }
            fn set_last_played(&mut self, timestamp: u64) {
                self.last_played = timestamp;
            }
        }

        // Identity is the id alone; names are irrelevant once assigned.
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!($label, "{{id={}, name={}, count={}, votes={}}}"),
                    self.id, self.name, self.stats.count, self.stats.votes
                )
            }
        }
    };
}

impl_entity!(Artist, EntityKind::Artist, "Artist");
impl_entity!(Genre, EntityKind::Genre, "Genre");
impl_entity!(Song, EntityKind::Song, "Song");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id() {
        let mut a = Artist::named("Kanye");
        let mut b = Artist::named("Taylor");
        a.id = 3;
        b.id = 3;
        assert_eq!(a, b);

        b.id = 4;
        assert_ne!(a, b);
    }

    #[test]
    fn test_song_equality_ignores_nested_copies() {
        let mut a = Song::named("Gay Fish");
        a.id = 1;
        a.genre.id = 2;
        let mut b = a.clone();
        b.genre.id = 0;
        assert_eq!(a, b);
    }

    #[test]
    fn test_display() {
        let mut g = Genre::named("Rock");
        g.id = 7;
        g.stats = Countable { count: 2, votes: -1 };
        assert_eq!(g.to_string(), "Genre{id=7, name=Rock, count=2, votes=-1}");
    }

    #[test]
    fn test_reset_aggregates() {
        let mut s = Song::named("x");
        s.stats = Countable { count: 5, votes: 9 };
        s.last_played = 123;
        s.reset_aggregates();
        assert_eq!(s.stats, Countable::default());
        assert_eq!(s.last_played, 0);
    }

    #[test]
    fn test_serialize_flattens_stats() {
        let mut a = Artist::named("a0");
        a.id = 1;
        a.stats.count = 4;
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["count"], 4);
        assert_eq!(json["votes"], 0);
        assert_eq!(json["name"], "a0");
    }
}
