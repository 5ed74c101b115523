//! Repository layer for the watchlist collection.
//!
//! # Responsibility
//! - Define the item read/write contract used by services and the FFI.
//! - Serialize snapshot writes to the persistent store adapter.
//!
//! # Invariants
//! - Write paths validate items before mutating the collection.
//! - Repository APIs return semantic errors (`NotFound`, `Duplicate`) in
//!   addition to storage errors.

pub mod item_repo;
pub mod writer;
