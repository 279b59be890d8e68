//! Real-time transit feeds for the Lyon network.
//!
//! Departures, parking occupancy and elevator/escalator status are fetched
//! periodically from local files or SFTP, parsed into typed records, and the
//! latest snapshot of each feed is kept in memory for readers.

pub mod config;
pub mod consumer;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod parser;
pub mod records;
pub mod refresh;
pub mod store;
pub mod web;
