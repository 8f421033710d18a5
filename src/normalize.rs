//! Normalization of free-text fields into lookup keys.
//!
//! Keys are memoized in the store's normalized index, so any change here
//! invalidates every key already persisted. Run the tests after changes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Everything that is not an ASCII letter or digit.
pub static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// Which field a piece of text came from.
///
/// Artist and genre keys are tagged so an artist called "rock" and a genre
/// called "rock" never share a key. Song keys are untagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    None,
    Song,
    Artist,
    Genre,
}

impl FieldKind {
    pub fn tag(self) -> &'static str {
        match self {
            FieldKind::Genre => "G",
            FieldKind::Artist => "A",
            FieldKind::Song | FieldKind::None => "",
        }
    }
}

/// Strip non-alphanumerics, lower-case, then prefix the field tag.
pub fn normalize(kind: FieldKind, text: &str) -> String {
    let stripped = NON_ALPHANUMERIC.replace_all(text, "");
    let mut key = String::with_capacity(stripped.len() + 1);
    key.push_str(kind.tag());
    key.push_str(&stripped.to_ascii_lowercase());
    key
}

/// Composite song key: untagged artist followed by the song.
///
/// The order is fixed. Since neither half carries a tag, a dirty entry that
/// crams "Artist - Song" into the song field lands on the same key.
pub fn combine(song: &str, artist: &str) -> String {
    normalize(FieldKind::None, artist) + &normalize(FieldKind::Song, song)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags() {
        assert_eq!(normalize(FieldKind::Genre, "SuPer-cOol    g3nre"), "Gsupercoolg3nre");
        assert_eq!(normalize(FieldKind::Artist, "SuPer-cOol    arteest3"), "Asupercoolarteest3");
        assert_eq!(normalize(FieldKind::None, "SuPer-cOol    s0ng"), "supercools0ng");
        assert_eq!(normalize(FieldKind::Song, "SuPer-cOol    s0ng"), "supercools0ng");
    }

    #[test]
    fn test_combine_artist_then_song() {
        assert_eq!(combine("gayFISH", "K4yne"), "k4ynegayfish");
        assert_ne!(combine("gayFISH", "K4yne"), combine("K4yne", "gayFISH"));
    }

    #[test]
    fn test_combine_matches_dirty_single_field() {
        assert_eq!(combine("Gay Fish", "Kanye"), combine("Kanye - Gay Fish", ""));
    }

    #[test]
    fn test_cross_field_keys_differ() {
        assert_ne!(normalize(FieldKind::Artist, "rock"), normalize(FieldKind::Genre, "rock"));
        assert_ne!(normalize(FieldKind::Artist, "rock"), normalize(FieldKind::Song, "rock"));
    }

    #[test]
    fn test_non_ascii_is_stripped() {
        assert_eq!(normalize(FieldKind::Artist, "Björk"), "Abjrk");
        assert_eq!(normalize(FieldKind::None, "  !!  "), "");
    }

    #[test]
    fn test_deterministic() {
        let first = combine("Runaway", "Kanye West");
        for _ in 0..3 {
            assert_eq!(combine("Runaway", "Kanye West"), first);
        }
    }
}
