//! Use-case services over the item repository.
//!
//! # Responsibility
//! - Provide list/home-screen projections and edit flows for UI callers.
//! - Keep the FFI layer decoupled from repository details.

pub mod watchlist_service;
