//! Turns raw per-stream harvests into a deduplicated, sorted slot list.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use chrono_tz::Tz;
use regex::Regex;

use crate::model::{Collection, WasteStream};

use super::extract::{normalize_spaces, StreamHarvest};

/// Resolve harvests into dated collection slots.
///
/// Applies, in order: date parsing, `(date, stream)` deduplication with
/// field merging, garden-notice propagation onto the other streams, and a
/// stable ascending date sort (ties stay in stream-table order).
pub(crate) fn normalize(harvests: &[StreamHarvest], tz: Tz, start_hour: u32) -> Vec<Collection> {
    let day_digits = Regex::new(r"\d+").expect("digit pattern is valid");

    let mut results: Vec<Collection> = Vec::new();
    let mut seen: HashMap<(DateTime<Tz>, WasteStream), usize> = HashMap::new();
    let mut garden_notice = String::new();

    for harvest in harvests {
        let mut added = 0_usize;
        for entry in &harvest.entries {
            if entry.day.is_empty() || entry.month.is_empty() {
                continue;
            }
            let Some(date) = parse_date(&day_digits, &entry.day, &entry.month, tz, start_hour)
            else {
                continue;
            };

            let key = (date, harvest.stream);
            if let Some(&index) = seen.get(&key) {
                // Repeat sighting: fill gaps, never overwrite, never duplicate.
                let existing = &mut results[index];
                if !entry.note.is_empty() && existing.note.is_empty() {
                    existing.note = entry.note.clone();
                }
                if !harvest.instructions.is_empty() && existing.instructions.is_empty() {
                    existing.instructions = harvest.instructions.clone();
                }
                continue;
            }

            seen.insert(key, results.len());
            results.push(Collection {
                date,
                stream: harvest.stream,
                instructions: harvest.instructions.clone(),
                note: entry.note.clone(),
            });
            added += 1;
        }

        if harvest.stream == WasteStream::GardenWaste && added == 0 && !harvest.notice.is_empty() {
            garden_notice = harvest.notice.clone();
        }
    }

    // A suspended garden service annotates its siblings instead of
    // producing phantom events. Kept as one explicit post-pass so the
    // coupling stays auditable.
    if !garden_notice.is_empty() {
        for collection in &mut results {
            if collection.stream == WasteStream::GardenWaste {
                continue;
            }
            collection.note = append_note(&collection.note, &garden_notice);
        }
    }

    results.sort_by_key(|collection| collection.date);
    results
}

/// Parse a day/month text pair into the collection instant.
///
/// Only the digits of the day text are used (the page decorates days with
/// ordinal suffixes); the month text carries the page's contextual year,
/// e.g. "December 2025".
fn parse_date(
    day_digits: &Regex,
    day_text: &str,
    month_text: &str,
    tz: Tz,
    start_hour: u32,
) -> Option<DateTime<Tz>> {
    let day = day_digits.find(day_text)?.as_str();
    let month = normalize_spaces(month_text);
    if month.is_empty() {
        return None;
    }

    let parsed = NaiveDate::parse_from_str(&format!("{day} {month}"), "%d %B %Y").ok()?;
    tz.with_ymd_and_hms(parsed.year(), parsed.month(), parsed.day(), start_hour, 0, 0)
        .earliest()
}

/// Append `extra` to `existing` on a new line, skipping blanks and text
/// already present.
fn append_note(existing: &str, extra: &str) -> String {
    let existing = existing.trim();
    let extra = extra.trim();
    if extra.is_empty() {
        return existing.to_string();
    }
    if existing.is_empty() {
        return extra.to_string();
    }
    if existing.contains(extra) {
        return existing.to_string();
    }
    format!("{existing}\n{extra}")
}
