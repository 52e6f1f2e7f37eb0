//! Upstream client module for the VATSIM network data feed.
//!
//! This module provides the `VatsimClient` for discovering data mirrors and
//! downloading the network snapshot, and the `Upstream` trait the snapshot
//! cache fetches through.

pub mod client;
pub mod error;

pub use client::{Upstream, VatsimClient, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STATUS_URL};
pub use error::ApiError;
