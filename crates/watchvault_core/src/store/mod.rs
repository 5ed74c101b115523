//! Persistent store adapters.
//!
//! # Responsibility
//! - Define the key-value contract the item repository persists through.
//! - Provide a durable SQLite adapter and a volatile in-memory adapter.
//!
//! # Invariants
//! - `set` replaces the whole value for a key; there are no partial writes.
//! - `get` on a never-written key returns `Ok(None)`, not an error.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

/// Fixed key under which the watchlist collection is stored.
pub const STORAGE_KEY: &str = "watchVault";

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a store adapter.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Adapter refused or could not complete the operation.
    Unavailable(String),
    /// A snapshot write already failed; carries the original message.
    WriteFailed(String),
    /// The background snapshot writer has shut down.
    WriterStopped,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::WriteFailed(message) => write!(f, "snapshot write failed: {message}"),
            Self::WriterStopped => write!(f, "snapshot writer is no longer running"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key-value blob store used for durable collection snapshots.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}
