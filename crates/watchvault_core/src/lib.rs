//! Core domain logic for WatchVault.
//! This crate is the single source of truth for watchlist invariants.

pub mod codec;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use codec::{decode_collection, encode_collection, CodecError};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::item::{
    normalize_title, Category, Item, ItemDraft, ItemEdit, ItemId, ItemValidationError,
    WatchStatus, RATING_MAX, RATING_MIN,
};
pub use repo::item_repo::{
    ChangeEvent, ChangeKind, ItemRepository, PersistenceStatus, RepoError, RepoResult,
    RepositoryOptions, StorageFailure, SubscriptionId, VaultRepository,
};
pub use repo::writer::WriteMode;
pub use service::watchlist_service::{
    CategoryCounts, StatusCounts, WatchlistFilter, WatchlistService,
};
pub use store::{KeyValueStore, MemoryKvStore, SqliteKvStore, StoreError, StoreResult, STORAGE_KEY};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
