//! Flutter-facing bindings for WatchVault.
//! Dart talks to the core only through the functions in [`api`].

pub mod api;
