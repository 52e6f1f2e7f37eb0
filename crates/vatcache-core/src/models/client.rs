use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frequency controllers log in on when only observing.
pub const OBSERVER_FREQUENCY: &str = "199.998";

/// Controller ratings held by network supervisors and administrators.
pub const SUPERVISOR_RATINGS: [i64; 2] = [11, 12];

/// Kind of connected client, as far as event classification cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Pilot,
    Controller,
}

impl ClientKind {
    /// Classify a raw client entry. Pilots are the only clients that report
    /// an altitude; a `0` altitude (on the ground) still counts.
    pub fn of(entry: &Value) -> Self {
        match entry.get("altitude") {
            Some(v) if !v.is_null() => ClientKind::Pilot,
            _ => ClientKind::Controller,
        }
    }
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientKind::Pilot => write!(f, "pilot"),
            ClientKind::Controller => write!(f, "controller"),
        }
    }
}

/// A connected pilot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pilot {
    #[serde(default)]
    pub cid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub callsign: String,
    pub server: Option<String>,
    pub pilot_rating: Option<i64>,
    pub military_rating: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<i64>,
    pub groundspeed: Option<i64>,
    pub transponder: Option<String>,
    pub heading: Option<i64>,
    pub qnh_i_hg: Option<f64>,
    pub qnh_mb: Option<i64>,
    pub flight_plan: Option<FlightPlan>,
    pub logon_time: Option<String>,
    pub last_updated: Option<String>,
}

impl Pilot {
    pub fn departure(&self) -> Option<&str> {
        self.flight_plan
            .as_ref()
            .and_then(|fp| fp.departure.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn arrival(&self) -> Option<&str> {
        self.flight_plan
            .as_ref()
            .and_then(|fp| fp.arrival.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// True if the filed flight plan departs from or arrives at `icao`.
    pub fn serves_airport(&self, icao: &str) -> bool {
        self.departure() == Some(icao) || self.arrival() == Some(icao)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub flight_rules: Option<String>,
    pub aircraft: Option<String>,
    pub aircraft_faa: Option<String>,
    pub aircraft_short: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub alternate: Option<String>,
    pub cruise_tas: Option<String>,
    pub altitude: Option<String>,
    pub deptime: Option<String>,
    pub enroute_time: Option<String>,
    pub fuel_time: Option<String>,
    pub remarks: Option<String>,
    pub route: Option<String>,
    pub revision_id: Option<i64>,
    pub assigned_transponder: Option<String>,
}

/// A connected air traffic controller or observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    #[serde(default)]
    pub cid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub callsign: String,
    pub frequency: Option<String>,
    pub facility: Option<i64>,
    pub rating: Option<i64>,
    pub server: Option<String>,
    pub visual_range: Option<i64>,
    pub text_atis: Option<Vec<String>>,
    pub last_updated: Option<String>,
    pub logon_time: Option<String>,
}

impl Controller {
    pub fn is_observer_frequency(&self) -> bool {
        self.frequency.as_deref() == Some(OBSERVER_FREQUENCY)
    }

    pub fn is_supervisor(&self) -> bool {
        self.rating.is_some_and(|r| SUPERVISOR_RATINGS.contains(&r))
    }

    /// Facility 0 is an observer connection, not an active position.
    pub fn is_active_position(&self) -> bool {
        self.facility != Some(0)
    }
}

/// An ATIS station. Same shape as a controller plus the information letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atis {
    #[serde(flatten)]
    pub station: Controller,
    pub atis_code: Option<String>,
}
