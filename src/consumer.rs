//! Per-feed accumulators fed one delimited record at a time.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use csv::StringRecord;

use crate::error::LoadError;
use crate::parser::datetime::{combine_date_hour, parse_datetime};
use crate::records::{Departure, Parking};

/// Accumulates typed records out of raw delimited lines.
///
/// `finalize` takes `self`, so it runs exactly once and the accumulated
/// collection can only be read after the whole input has been consumed.
pub trait RecordConsumer {
    type Record;

    /// `index` is the zero-based position of the record in the source,
    /// counting a skipped header.
    fn consume(&mut self, record: &StringRecord, index: u64) -> Result<(), LoadError>;

    fn finalize(self) -> Vec<Self::Record>;
}

fn field<'r>(record: &'r StringRecord, pos: usize, index: u64) -> Result<&'r str, LoadError> {
    record.get(pos).ok_or_else(|| LoadError::Format {
        record: index,
        message: format!("missing field {pos}, record has {} fields", record.len()),
    })
}

fn count(value: &str, index: u64) -> Result<u32, LoadError> {
    value.trim().parse().map_err(|_| LoadError::Format {
        record: index,
        message: format!("{value:?} is not a space count"),
    })
}

fn optional_count(record: &StringRecord, pos: usize, index: u64) -> Result<Option<u32>, LoadError> {
    match record.get(pos).map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => count(value, index).map(Some),
    }
}

pub struct DepartureConsumer {
    tz: Tz,
    departures: Vec<Departure>,
}

impl DepartureConsumer {
    pub const FIELD_COUNT: usize = 8;

    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            departures: Vec::new(),
        }
    }
}

impl RecordConsumer for DepartureConsumer {
    type Record = Departure;

    fn consume(&mut self, record: &StringRecord, index: u64) -> Result<(), LoadError> {
        let departure_at = combine_date_hour(
            field(record, 5, index)?,
            field(record, 6, index)?,
            self.tz,
        )?;
        self.departures.push(Departure {
            line: field(record, 0, index)?.to_string(),
            station: field(record, 1, index)?.to_string(),
            stop_point: field(record, 2, index)?.to_string(),
            destination: field(record, 3, index)?.to_string(),
            direction: field(record, 4, index)?.to_string(),
            departure_at,
            category: field(record, 7, index)?.to_string(),
        });
        Ok(())
    }

    /// Orders departures by station, then by time.
    fn finalize(mut self) -> Vec<Departure> {
        self.departures
            .sort_by(|a, b| (&a.station, a.departure_at).cmp(&(&b.station, b.departure_at)));
        self.departures
    }
}

pub struct ParkingConsumer {
    tz: Tz,
    parkings: BTreeMap<String, Parking>,
}

impl ParkingConsumer {
    pub const MIN_FIELD_COUNT: usize = 5;

    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            parkings: BTreeMap::new(),
        }
    }
}

impl RecordConsumer for ParkingConsumer {
    type Record = Parking;

    fn consume(&mut self, record: &StringRecord, index: u64) -> Result<(), LoadError> {
        if record.len() < Self::MIN_FIELD_COUNT {
            return Err(LoadError::Format {
                record: index,
                message: format!(
                    "expected at least {} fields, found {}",
                    Self::MIN_FIELD_COUNT,
                    record.len()
                ),
            });
        }
        let parking = Parking {
            id: field(record, 0, index)?.to_string(),
            name: field(record, 1, index)?.to_string(),
            updated_at: parse_datetime(field(record, 2, index)?, self.tz)?,
            available_spaces: count(field(record, 3, index)?, index)?,
            occupied_spaces: count(field(record, 4, index)?, index)?,
            available_accessible_spaces: optional_count(record, 5, index)?,
            occupied_accessible_spaces: optional_count(record, 6, index)?,
        };
        // a facility listed twice keeps its last line
        self.parkings.insert(parking.id.clone(), parking);
        Ok(())
    }

    fn finalize(self) -> Vec<Parking> {
        self.parkings.into_values().collect()
    }
}
