//! Typed records produced by the feed loaders, and the snapshot wrapper
//! the store hands out to readers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// One of the three independently refreshed data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Departures,
    Parkings,
    Equipments,
}

impl Feed {
    pub const ALL: [Feed; 3] = [Feed::Departures, Feed::Parkings, Feed::Equipments];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Departures => "departures",
            Feed::Parkings => "parkings",
            Feed::Equipments => "equipments",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled departure from the real-time departures extract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    pub line: String,
    pub station: String,
    pub stop_point: String,
    pub destination: String,
    pub direction: String,
    pub departure_at: DateTime<Tz>,
    pub category: String,
}

/// Current occupancy of one parking facility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parking {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Tz>,
    pub available_spaces: u32,
    pub occupied_spaces: u32,
    pub available_accessible_spaces: Option<u32>,
    pub occupied_accessible_spaces: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentKind {
    Elevator,
    Escalator,
    Other,
}

impl FromStr for EquipmentKind {
    type Err = std::convert::Infallible;

    /// The feed uses both French and English labels; anything unknown maps
    /// to [`EquipmentKind::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_lowercase().as_str() {
            "ascenseur" | "elevator" => EquipmentKind::Elevator,
            "escalator" | "escalier mécanique" | "escalier mecanique" => EquipmentKind::Escalator,
            _ => EquipmentKind::Other,
        };
        Ok(kind)
    }
}

/// Calendar span during which an equipment status applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

/// Status of one elevator or escalator, as of the feed's header timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentDetail {
    pub id: String,
    pub name: String,
    pub kind: EquipmentKind,
    pub status: String,
    pub cause: Option<String>,
    pub effect: Option<String>,
    pub period: Option<Period>,
    pub station_id: String,
    pub station_name: String,
    pub line_id: String,
    pub updated_at: DateTime<Tz>,
}

/// The complete set of records currently known for one feed.
///
/// Snapshots are immutable once built; a refresh produces a new one.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot<T> {
    pub feed: Feed,
    pub records: Vec<T>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl<T> Snapshot<T> {
    /// The snapshot visible before the first successful load.
    pub fn empty(feed: Feed) -> Self {
        Self {
            feed,
            records: Vec::new(),
            loaded_at: None,
        }
    }

    pub fn new(feed: Feed, records: Vec<T>) -> Self {
        Self {
            feed,
            records,
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
