//! Loaders turning raw feed bytes into typed records.
//!
//! Departures and parkings are `;`-separated extracts read through
//! [`load_delimited`]; equipments come as an XML document read through
//! [`load_equipments`].

pub mod datetime;
pub mod delimited;
pub mod equipment;

pub use delimited::{DelimitedOptions, load_delimited};
pub use equipment::load_equipments;
