//! Read-side queries over the cached network snapshot.
//!
//! `DataHandler` calls `SnapshotStore::load` once per query and works on the
//! returned snapshot. The filtering itself lives in plain functions over
//! `&Snapshot` so it can be reused without a store.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::api::Upstream;
use crate::cache::{CacheError, SnapshotStore};
use crate::models::{Atis, Controller, Pilot, Snapshot};

/// Number of airports returned by the popularity ranking.
pub const POPULAR_AIRPORTS_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientFilter {
    All,
    Pilots,
    Controllers,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown client type '{0}' (expected all, pilots or controllers)")]
pub struct UnknownClientFilter(pub String);

impl FromStr for ClientFilter {
    type Err = UnknownClientFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ClientFilter::All),
            "pilots" => Ok(ClientFilter::Pilots),
            "controllers" => Ok(ClientFilter::Controllers),
            _ => Err(UnknownClientFilter(s.to_string())),
        }
    }
}

/// Everything connected at or filed for one airport.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AirportInfo {
    pub pilots: Vec<Pilot>,
    pub controllers: Vec<Controller>,
    pub atis: Option<Atis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AirportCount {
    pub id: String,
    pub count: u32,
}

// ============================================================================
// Snapshot queries
// ============================================================================

/// `All` is the network's unique user count, which can be absent upstream.
pub fn count_in(snapshot: &Snapshot, filter: ClientFilter) -> Option<u64> {
    match filter {
        ClientFilter::All => snapshot.general.unique_users,
        ClientFilter::Pilots => Some(snapshot.pilots.len() as u64),
        ClientFilter::Controllers => Some(snapshot.controllers.len() as u64),
    }
}

fn controller_serves(controller: &Controller, icao: &str) -> bool {
    if controller.is_observer_frequency() {
        return false;
    }
    if controller.callsign.contains(icao) {
        return true;
    }
    // US positions drop the leading K (KJFK -> JFK_TWR)
    match icao.strip_prefix('K') {
        Some(rest) if !rest.is_empty() => controller.callsign.contains(&format!("{}_", rest)),
        _ => false,
    }
}

pub fn airport_info_in(snapshot: &Snapshot, icao: &str) -> Option<AirportInfo> {
    if icao.is_empty() {
        return None;
    }

    let pilots = snapshot
        .pilots
        .iter()
        .filter(|p| p.serves_airport(icao))
        .cloned()
        .collect();

    let controllers = snapshot
        .controllers
        .iter()
        .filter(|c| controller_serves(c, icao))
        .cloned()
        .collect();

    let atis = snapshot
        .atis
        .iter()
        .filter(|a| a.station.callsign.contains(icao))
        .last()
        .cloned();

    Some(AirportInfo {
        pilots,
        controllers,
        atis,
    })
}

/// Airports ranked by how many flight plans depart from or arrive at them.
/// Ties keep the order in which airports were first seen.
pub fn popular_airports_in(snapshot: &Snapshot) -> Vec<AirportCount> {
    let mut tally: Vec<AirportCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    let endpoints = snapshot
        .pilots
        .iter()
        .flat_map(|p| [p.departure(), p.arrival()])
        .flatten();

    for id in endpoints {
        match index.get(id) {
            Some(&i) => tally[i].count += 1,
            None => {
                index.insert(id, tally.len());
                tally.push(AirportCount {
                    id: id.to_string(),
                    count: 1,
                });
            }
        }
    }

    tally.sort_by(|a, b| b.count.cmp(&a.count));
    tally.truncate(POPULAR_AIRPORTS_LIMIT);
    tally
}

pub fn flight_info_in(snapshot: &Snapshot, callsign: &str) -> Option<Pilot> {
    snapshot
        .pilots
        .iter()
        .find(|p| p.callsign == callsign)
        .cloned()
}

pub fn client_details_in(snapshot: &Snapshot, cid: i64) -> Option<Pilot> {
    snapshot.pilots.iter().find(|p| p.cid == cid).cloned()
}

pub fn supervisors_in(snapshot: &Snapshot) -> Vec<Controller> {
    snapshot
        .controllers
        .iter()
        .filter(|c| c.is_supervisor())
        .cloned()
        .collect()
}

pub fn controllers_in(snapshot: &Snapshot) -> Vec<Controller> {
    snapshot
        .controllers
        .iter()
        .filter(|c| c.is_active_position())
        .cloned()
        .collect()
}

// ============================================================================
// Store-backed handler
// ============================================================================

/// Query front end over a shared `SnapshotStore`.
pub struct DataHandler<U> {
    store: SnapshotStore<U>,
}

impl<U> Clone for DataHandler<U> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<U: Upstream> DataHandler<U> {
    pub fn new(store: SnapshotStore<U>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SnapshotStore<U> {
        &self.store
    }

    async fn snapshot(&self) -> Result<Arc<Snapshot>, CacheError> {
        self.store.load().await
    }

    pub async fn count(&self, filter: ClientFilter) -> Result<Option<u64>, CacheError> {
        Ok(count_in(&*self.snapshot().await?, filter))
    }

    /// `None` for an empty ICAO code, without touching the cache.
    pub async fn airport_info(&self, icao: &str) -> Result<Option<AirportInfo>, CacheError> {
        if icao.is_empty() {
            return Ok(None);
        }
        Ok(airport_info_in(&*self.snapshot().await?, icao))
    }

    pub async fn popular_airports(&self) -> Result<Vec<AirportCount>, CacheError> {
        Ok(popular_airports_in(&*self.snapshot().await?))
    }

    pub async fn flight_info(&self, callsign: &str) -> Result<Option<Pilot>, CacheError> {
        Ok(flight_info_in(&*self.snapshot().await?, callsign))
    }

    pub async fn clients(&self) -> Result<Vec<Pilot>, CacheError> {
        Ok(self.snapshot().await?.pilots.clone())
    }

    pub async fn client_details(&self, cid: i64) -> Result<Option<Pilot>, CacheError> {
        Ok(client_details_in(&*self.snapshot().await?, cid))
    }

    pub async fn supervisors(&self) -> Result<Vec<Controller>, CacheError> {
        Ok(supervisors_in(&*self.snapshot().await?))
    }

    pub async fn controllers(&self) -> Result<Vec<Controller>, CacheError> {
        Ok(controllers_in(&*self.snapshot().await?))
    }
}
