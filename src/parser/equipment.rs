//! Decoder for the elevator/escalator status XML document.
//!
//! The document is declared either as UTF-8 (explicitly or by default) or as
//! ISO-8859-1; anything else is refused. Its header splits the "as of" instant
//! into a `Date` and an `Hour` element, and the body nests
//! lines → stations → equipments.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::DateTime;
use chrono_tz::Tz;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use tracing::debug;

use crate::error::LoadError;
use crate::parser::datetime::{combine_date_hour, parse_date};
use crate::records::{EquipmentDetail, EquipmentKind, Period};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Deserialize)]
struct Root {
    #[serde(rename = "Info")]
    info: Info,
    #[serde(rename = "Data", default)]
    data: Data,
}

#[derive(Debug, Deserialize)]
struct Info {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Hour")]
    hour: String,
}

#[derive(Debug, Default, Deserialize)]
struct Data {
    #[serde(rename = "Line", default)]
    lines: Vec<LineElement>,
}

#[derive(Debug, Deserialize)]
struct LineElement {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Station", default)]
    stations: Vec<StationElement>,
}

#[derive(Debug, Deserialize)]
struct StationElement {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Equipment", default)]
    equipments: Vec<EquipmentElement>,
}

#[derive(Debug, Deserialize)]
struct EquipmentElement {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Cause")]
    cause: Option<String>,
    #[serde(rename = "Effect")]
    effect: Option<String>,
    #[serde(rename = "Start")]
    start: Option<String>,
    #[serde(rename = "End")]
    end: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl EquipmentElement {
    fn into_detail(
        self,
        line_id: &str,
        station: &StationElement,
        updated_at: DateTime<Tz>,
    ) -> Result<EquipmentDetail, LoadError> {
        let begin = non_empty(self.start).map(|s| parse_date(&s)).transpose()?;
        let end = non_empty(self.end).map(|s| parse_date(&s)).transpose()?;
        let period = match (begin, end) {
            (Some(begin), Some(end)) => Some(Period { begin, end }),
            (None, None) => None,
            (begin, end) => {
                debug!(
                    equipment = %self.id,
                    ?begin,
                    ?end,
                    "Incomplete unavailability period, ignored"
                );
                None
            }
        };
        let kind = self.kind.parse().unwrap_or(EquipmentKind::Other);

        Ok(EquipmentDetail {
            id: self.id,
            name: self.name,
            kind,
            status: self.status,
            cause: non_empty(self.cause),
            effect: non_empty(self.effect),
            period,
            station_id: station.id.clone(),
            station_name: station.name.clone(),
            line_id: line_id.to_string(),
            updated_at,
        })
    }
}

/// Returns the `encoding` pseudo-attribute of the XML declaration, if any.
fn declared_encoding(bytes: &[u8]) -> Result<Option<String>, LoadError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Decl(decl)) => {
                return match decl.encoding() {
                    Some(Ok(label)) => Ok(Some(String::from_utf8_lossy(&label).into_owned())),
                    Some(Err(e)) => Err(LoadError::Decode(e.to_string())),
                    None => Ok(None),
                };
            }
            Ok(Event::Comment(_)) | Ok(Event::Text(_)) => buf.clear(),
            Ok(_) => return Ok(None),
            Err(e) => return Err(LoadError::Decode(e.to_string())),
        }
    }
}

/// Transcodes the raw document to UTF-8 according to its declaration.
fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>, LoadError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match declared_encoding(bytes)? {
        Some(label) if label.eq_ignore_ascii_case("ISO-8859-1") => {
            Ok(encoding_rs::mem::decode_latin1(bytes))
        }
        Some(label) if !label.eq_ignore_ascii_case("UTF-8") => Err(LoadError::Charset(label)),
        _ => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| LoadError::Decode(e.to_string())),
    }
}

/// Decodes an equipment document into one record per equipment identifier.
///
/// Every record carries the header's reassembled timestamp. When the same
/// identifier appears several times, the last occurrence in document order
/// replaces the earlier ones. Elements without an `ID` are kept with an
/// empty identifier.
///
/// # Errors
///
/// Returns [`LoadError::Charset`] for a declared encoding other than UTF-8 or
/// ISO-8859-1, [`LoadError::Decode`] if the document is not well-formed or
/// lacks its `Info` header, and [`LoadError::TimeParse`] if the header date
/// and hour or an equipment's `Start`/`End` date do not parse.
pub fn load_equipments(bytes: &[u8], tz: Tz) -> Result<Vec<EquipmentDetail>, LoadError> {
    let text = decode_document(bytes)?;
    let root: Root = quick_xml::de::from_str(&text)?;

    let updated_at = combine_date_hour(&root.info.date, &root.info.hour, tz)?;

    let mut equipments = BTreeMap::new();
    let mut seen = 0usize;
    for line in root.data.lines {
        for mut station in line.stations {
            for element in std::mem::take(&mut station.equipments) {
                seen += 1;
                let detail = element.into_detail(&line.id, &station, updated_at)?;
                equipments.insert(detail.id.clone(), detail);
            }
        }
    }

    if seen != equipments.len() {
        debug!(
            seen,
            kept = equipments.len(),
            "Duplicate equipment identifiers, later entries kept"
        );
    }

    Ok(equipments.into_values().collect())
}
