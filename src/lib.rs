//! skrillex - embeddable music-voting datastore.
//!
//! Songs, artists and genres collect votes inside sessions, flow through a
//! queue and buffer into play history, and are resolved from free text by the
//! [`Mapper`].

pub mod db;
pub mod error;
pub mod mapper;
pub mod models;
pub mod normalize;
pub mod options;
pub mod progress;
pub mod result_set;
pub mod safety;
pub mod store;
pub mod testing;
pub mod time;

pub use db::Db;
pub use error::{Code, Error, Result};
pub use mapper::Mapper;
pub use models::{Artist, Countable, Entity, EntityKind, Genre, Song};
pub use options::{Options, ReadOptions, SortType, WriteOptions};
pub use result_set::ResultSet;
pub use store::{SqliteStore, Store};
