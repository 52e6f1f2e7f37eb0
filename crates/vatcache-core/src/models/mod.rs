//! Data models for the VATSIM v3 network data feed.
//!
//! This module contains typed views over the upstream document:
//!
//! - `Snapshot`: the whole cached document plus the local `updated_at` stamp
//! - `Pilot`, `Controller`, `Atis`: connected clients
//! - `General`, `Server`, `Prefile` and the reference tables
//!
//! Every entity field is optional or defaulted. The upstream schema is not
//! validated beyond what these types need.

pub mod client;
pub mod network;
pub mod snapshot;

pub use client::{Atis, ClientKind, Controller, FlightPlan, Pilot, OBSERVER_FREQUENCY};
pub use network::{Facility, General, PilotRating, Prefile, Rating, Server};
pub use snapshot::{stamp_of, Snapshot, UPDATED_AT_FIELD};
