//! Core library for vatcache.
//!
//! Keeps a local copy of the VATSIM network data feed fresh, diffs each new
//! snapshot against the previous one to announce newly connected clients,
//! and answers queries over the cached snapshot.
//!
//! - [`api`]: upstream mirror discovery and download
//! - [`cache`]: the on-disk snapshot store and its refresh protocol
//! - [`diff`]: structural JSON comparison
//! - [`events`]: new-connection events
//! - [`queries`]: counts, airport lookups and role filters

pub mod api;
pub mod cache;
pub mod config;
pub mod diff;
pub mod events;
pub mod models;
pub mod queries;
pub mod utils;

pub use api::{ApiError, Upstream, VatsimClient};
pub use cache::{CacheError, SnapshotStore};
pub use config::Config;
pub use diff::{compare, Classification, DiffNode};
pub use events::NetworkEvent;
pub use models::{Controller, Pilot, Snapshot};
pub use queries::{ClientFilter, DataHandler};
