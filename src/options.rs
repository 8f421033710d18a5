//! Options customizing how a database is opened, read and written.

/// Options used when opening a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Create the underlying database if missing.
    pub create_if_missing: bool,

    /// Drop every table of an existing database and start fresh.
    pub recreate: bool,

    /// Hint only: enables a larger page cache. Never changes results.
    pub enable_caching: bool,

    /// Keep everything in memory; the path is ignored.
    pub memory_only: bool,

    /// Session to use for the lifetime of the handle.
    ///
    /// 0 creates a new session, a positive id restores an existing one.
    pub session_id: i64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            recreate: false,
            enable_caching: true,
            memory_only: false,
            session_id: 0,
        }
    }
}

impl Options {
    pub fn in_memory() -> Self {
        Self {
            memory_only: true,
            ..Self::default()
        }
    }

    /// Fresh on-disk database every time.
    pub fn test_options() -> Self {
        Self {
            create_if_missing: true,
            recreate: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortType {
    /// Insertion order.
    None,
    /// Descending count, ties by ascending id.
    #[default]
    Counts,
    /// Descending votes, ties by ascending id.
    Votes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// 0 is the current session; -1 ("every session but the current one") is
    /// not supported.
    pub session_id: i64,

    /// Maximum number of results after sorting, 0 for no limit.
    pub result_limit: usize,

    pub sort: SortType,

    /// Seconds a user may be inactive before their votes stop counting.
    /// 0 never expires anyone.
    pub inactivity_threshold: u64,

    /// Leave out songs currently in the buffer (song listings only).
    pub filter_buffered: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            session_id: 0,
            result_limit: 0,
            sort: SortType::Counts,
            inactivity_threshold: 300,
            filter_buffered: true,
        }
    }
}

impl ReadOptions {
    pub fn session(session_id: i64) -> Self {
        Self {
            session_id,
            ..Self::default()
        }
    }

    /// Millisecond cutoff for voter activity, 0 when the filter is off.
    pub(crate) fn activity_cutoff(&self, now_millis: u64) -> u64 {
        if self.inactivity_threshold == 0 {
            return 0;
        }
        now_millis
            .saturating_sub(self.inactivity_threshold.saturating_mul(1000))
            .max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// 0 is the current session.
    pub session_id: i64,
}

impl WriteOptions {
    pub fn session(session_id: i64) -> Self {
        Self { session_id }
    }
}
