use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::{Atis, Controller, Facility, General, Pilot, PilotRating, Prefile, Rating, Server};
use crate::utils::format_age;

/// Field injected into every persisted snapshot with the local fetch time.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// One parsed copy of the network data feed, stamped with the time it was
/// fetched. Unknown top-level fields are kept in `extra`.
///
/// Decoding is lenient below the top level: an entry that does not fit its
/// type is logged and left out, and an unusable section decodes as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_section")]
    pub general: General,
    #[serde(default, deserialize_with = "lenient_list")]
    pub pilots: Vec<Pilot>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub controllers: Vec<Controller>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub atis: Vec<Atis>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub servers: Vec<Server>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub prefiles: Vec<Prefile>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub facilities: Vec<Facility>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub ratings: Vec<Rating>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub pilot_ratings: Vec<PilotRating>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Snapshot {
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.updated_at
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }

    /// Stale once the age strictly exceeds `threshold`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age_at(now) > threshold
    }

    pub fn age_display(&self) -> String {
        format_age(self.age().num_seconds())
    }

    pub fn facility_name(&self, id: i64) -> Option<&str> {
        self.facilities
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.long.as_str())
    }

    pub fn rating_name(&self, id: i64) -> Option<&str> {
        self.ratings
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.short.as_str())
    }
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!(found = %kind_of(&other), "Snapshot section is not a list, ignoring it");
            return Ok(Vec::new());
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "Skipping malformed snapshot entry");
                None
            }
        })
        .collect())
}

fn lenient_section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(T::default()),
        value => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed snapshot section, using defaults");
            T::default()
        })),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read the `updated_at` stamp from a raw persisted document.
pub fn stamp_of(document: &Value) -> Option<DateTime<Utc>> {
    document
        .get(UPDATED_AT_FIELD)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
