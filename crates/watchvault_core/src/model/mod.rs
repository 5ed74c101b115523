//! Domain model for watchlist entries.
//!
//! # Responsibility
//! - Define canonical data structures used by the repository and services.
//!
//! # Invariants
//! - Every entry is identified by a stable `ItemId`.
//! - Deletion is a hard removal; there are no tombstones.

pub mod item;
