//! Network-wide metadata and reference tables carried in every snapshot.

use serde::{Deserialize, Serialize};

use super::FlightPlan;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct General {
    pub version: Option<i64>,
    pub reload: Option<i64>,
    pub update: Option<String>,
    pub update_timestamp: Option<String>,
    pub connected_clients: Option<u64>,
    pub unique_users: Option<u64>,
}

/// An FSD server clients connect to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub ident: Option<String>,
    pub hostname_or_ip: Option<String>,
    pub location: Option<String>,
    pub name: Option<String>,
    pub clients_connection_allowed: Option<i64>,
    pub client_connections_allowed: Option<bool>,
    pub is_sweatbox: Option<bool>,
}

/// A flight plan filed by a pilot who has not connected yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefile {
    #[serde(default)]
    pub cid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub callsign: String,
    pub flight_plan: Option<FlightPlan>,
    pub last_updated: Option<String>,
}

/// Controller facility type (0 = observer, 1 = FSS, ... 6 = center).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: i64,
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub long: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub long: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PilotRating {
    pub id: i64,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub long_name: String,
}
