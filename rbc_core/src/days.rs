//! Pure helpers answering "which streams are collected when".
//!
//! Everything here is a function of the caller's `now` and an
//! already-fetched slot list; no I/O, no shared state.

use chrono::{DateTime, Datelike, Days, Duration};
use chrono_tz::Tz;

use crate::model::{Collection, WasteStream};

/// Streams collected on one calendar date.
///
/// Derived on demand from a slot list, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    /// Start instant of the first slot that day.
    pub date: DateTime<Tz>,
    /// Streams collected that day; first-seen order, unique, never empty.
    pub types: Vec<WasteStream>,
}

/// How long a slot stays "current" after its start instant.
fn collection_window() -> Duration {
    Duration::hours(1)
}

/// Bucket slots into per-day summaries, ascending by date.
#[must_use]
pub fn group_days(collections: &[Collection]) -> Vec<DaySummary> {
    let mut sorted: Vec<&Collection> = collections.iter().collect();
    sorted.sort_by_key(|collection| collection.date);

    let mut days: Vec<DaySummary> = Vec::new();
    for collection in sorted {
        match days.last_mut() {
            Some(day) if same_day(day.date, collection.date) => {
                if !day.types.contains(&collection.stream) {
                    day.types.push(collection.stream);
                }
            }
            _ => days.push(DaySummary {
                date: collection.date,
                types: vec![collection.stream],
            }),
        }
    }
    days
}

/// Streams being collected "today": the calendar date matches `now` and
/// the collection window has not yet elapsed. At exactly start + window
/// the day no longer counts.
#[must_use]
pub fn today(now: DateTime<Tz>, collections: &[Collection]) -> Vec<WasteStream> {
    group_days(collections)
        .into_iter()
        .find(|day| same_day(now, day.date) && now < day.date + collection_window())
        .map(|day| day.types)
        .unwrap_or_default()
}

/// Streams being collected on the calendar day after `now`, regardless of
/// clock time.
#[must_use]
pub fn tomorrow(now: DateTime<Tz>, collections: &[Collection]) -> Vec<WasteStream> {
    let target = now + Days::new(1);
    group_days(collections)
        .into_iter()
        .find(|day| same_day(target, day.date))
        .map(|day| day.types)
        .unwrap_or_default()
}

/// First day that is still upcoming: strictly in the future, or today with
/// its collection window not yet elapsed.
#[must_use]
pub fn next_day(now: DateTime<Tz>, collections: &[Collection]) -> Option<DaySummary> {
    group_days(collections)
        .into_iter()
        .find(|day| now < day.date + collection_window())
}

/// Whole calendar days between two instants, midnight to midnight in
/// their timezone; independent of time of day.
#[must_use]
pub fn days_between(from: DateTime<Tz>, to: DateTime<Tz>) -> i64 {
    to.date_naive()
        .signed_duration_since(from.date_naive())
        .num_days()
}

fn same_day(a: DateTime<Tz>, b: DateTime<Tz>) -> bool {
    a.year() == b.year() && a.ordinal() == b.ordinal()
}
