use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::LineFilter;

/// Body of a radar API response. Only the movement list is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadarResponse {
    #[serde(default, deserialize_with = "lenient_movements")]
    pub movements: Vec<Movement>,
}

/// One vehicle position report. The API omits fields freely, so everything is
/// optional, and a value of an unexpected type reads as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    #[serde(default, deserialize_with = "lenient")]
    pub trip_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub line: Option<Line>,
    #[serde(default, deserialize_with = "lenient")]
    pub direction: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "lenient")]
    pub heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Line {
    #[serde(default, deserialize_with = "lenient")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "lenient")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub longitude: Option<f64>,
}

/// Any JSON value; `None` when it does not fit `T`
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Entries that are not objects become empty movements, which never match a line
fn lenient_movements<'de, D>(deserializer: D) -> Result<Vec<Movement>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).unwrap_or_default())
        .collect())
}

impl Movement {
    /// Exact, case-sensitive match on both product and line name
    pub fn is_line(&self, filter: &LineFilter) -> bool {
        self.line.as_ref().is_some_and(|line| {
            line.product.as_deref() == Some(filter.product.as_str())
                && line.name.as_deref() == Some(filter.name.as_str())
        })
    }
}

/// Flattened movement of the tracked line, ready to be written as a CSV row
#[derive(Debug, Clone, PartialEq)]
pub struct MovementRecord {
    pub trip_id: Option<String>,
    pub line: Option<String>,
    pub direction: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
}

impl From<&Movement> for MovementRecord {
    fn from(m: &Movement) -> Self {
        let location = m.location.as_ref();
        Self {
            trip_id: m.trip_id.clone(),
            line: m.line.as_ref().and_then(|l| l.name.clone()),
            direction: m.direction.clone(),
            latitude: location.and_then(|l| l.latitude),
            longitude: location.and_then(|l| l.longitude),
            heading: m.heading,
            speed: m.speed,
        }
    }
}

/// Keep the movements of the configured line, in response order
pub fn extract_movements(response: &RadarResponse, filter: &LineFilter) -> Vec<MovementRecord> {
    response
        .movements
        .iter()
        .filter(|m| m.is_line(filter))
        .map(MovementRecord::from)
        .collect()
}

/// Running counters across poll cycles
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PollStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub empty_cycles: u64,
    pub rows_written: u64,
}

impl std::fmt::Display for MovementRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => write!(
                f,
                "Line {} trip {} towards {} at ({:.6}, {:.6})",
                or_dash(&self.line),
                or_dash(&self.trip_id),
                or_dash(&self.direction),
                lat,
                lon
            ),
            _ => write!(
                f,
                "Line {} trip {} towards {} at unknown position",
                or_dash(&self.line),
                or_dash(&self.trip_id),
                or_dash(&self.direction)
            ),
        }
    }
}
