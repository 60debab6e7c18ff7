//! Scrapes the Redbridge council waste-collection schedule and republishes
//! it as an iCalendar feed plus small day lookups.
//!
//! The schedule page only renders dates behind a session handshake: a
//! SaveAddress request must seed an address cookie before the page at
//! <https://my.redbridge.gov.uk/RecycleRefuse> shows anything. This crate
//! owns that handshake, the per-stream HTML extraction rules, the
//! normalization pipeline, the day-resolution helpers, the calendar
//! emitter, and the shared result cache; serving them over HTTP lives in
//! `rbc_server`.

pub mod cache;
pub mod calendar;
pub mod collection_client;
pub mod days;
pub mod error;
pub mod model;
