//! Local snapshot cache with staleness-driven refresh.
//!
//! This module provides the `SnapshotStore`, which keeps the current network
//! snapshot and the previous one as JSON files in the data directory. A
//! snapshot is considered stale after 60 seconds by default.
//!
//! Refreshing backs up the current file, fetches a new document through an
//! `Upstream`, writes it atomically, diffs the client lists against the
//! backup and broadcasts `NetworkEvent`s for newly connected clients.
//! Concurrent refreshes collapse into a single in-flight fetch.

pub mod error;
pub mod store;

pub use error::CacheError;
pub use store::{SnapshotStore, DEFAULT_STALE_AFTER_SECS};
