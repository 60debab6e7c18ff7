//! Renders collection slots as an iCalendar document.

use std::collections::HashSet;

use chrono::Duration;
use chrono_tz::Tz;
use ical::generator::{Emitter, IcalCalendarBuilder, IcalEvent, Property};
use ical::parser::ical::component::IcalAlarm;
use ical::{ical_param, ical_property};
use regex::Regex;

use crate::collection_client::DEFAULT_TIMEZONE;
use crate::error::CalendarError;
use crate::model::Collection;

const PROD_ID: &str = "-//redbridge-ics//EN";
const UID_DOMAIN: &str = "redbridge-ics";
const DEFAULT_INSTRUCTION: &str = "Place bins out by 06:00 on collection day.";
const REMINDER_TEXT: &str = "Bin collection reminder";
const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Settings for the emitted feed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Feed display name (X-WR-CALNAME); required.
    pub name: String,
    /// Feed description (X-WR-CALDESC); omitted when empty.
    pub description: String,
    /// Timezone identifier stamped on event times; empty for the default.
    pub timezone: String,
}

/// Transforms scraped slots into an .ics payload.
#[derive(Debug)]
pub struct Builder {
    name: String,
    description: String,
    tz: Tz,
    tz_name: String,
}

impl Builder {
    /// Validate the feed settings and construct a builder.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::NameRequired`] for an empty feed name and
    /// [`CalendarError::Timezone`] for an unknown timezone.
    pub fn new(cfg: Config) -> Result<Self, CalendarError> {
        if cfg.name.is_empty() {
            return Err(CalendarError::NameRequired);
        }
        let tz_name = if cfg.timezone.is_empty() {
            DEFAULT_TIMEZONE.to_string()
        } else {
            cfg.timezone
        };
        let tz: Tz = tz_name
            .parse()
            .map_err(|_unknown| CalendarError::Timezone(tz_name.clone()))?;

        Ok(Self {
            name: cfg.name,
            description: cfg.description,
            tz,
            tz_name,
        })
    }

    /// Render the slots as an iCalendar document.
    ///
    /// The mapping is deterministic: re-emitting the same slot list yields
    /// byte-identical output, so calendar clients can deduplicate on UID.
    #[must_use]
    pub fn build(&self, collections: &[Collection]) -> String {
        let mut calendar = IcalCalendarBuilder::version("2.0")
            .gregorian()
            .prodid(PROD_ID)
            .build();
        calendar
            .properties
            .push(ical_property!("METHOD", "PUBLISH"));
        calendar
            .properties
            .push(ical_property!("X-WR-CALNAME", escape_text(&self.name)));
        if !self.description.is_empty() {
            calendar
                .properties
                .push(ical_property!("X-WR-CALDESC", escape_text(&self.description)));
        }

        for collection in collections {
            calendar.events.push(self.event(collection));
        }

        calendar.generate()
    }

    fn event(&self, collection: &Collection) -> IcalEvent {
        let start = collection.date.with_timezone(&self.tz);
        let end = start + Duration::hours(1);

        let mut event = IcalEvent::new();
        event
            .properties
            .push(ical_property!("UID", event_uid(collection, &self.tz)));
        event.properties.push(ical_property!(
            "DTSTAMP",
            start.format(DATE_TIME_FORMAT).to_string()
        ));
        event.properties.push(ical_property!(
            "DTSTART",
            start.format(DATE_TIME_FORMAT).to_string(),
            ical_param!("TZID", self.tz_name.as_str())
        ));
        event.properties.push(ical_property!(
            "DTEND",
            end.format(DATE_TIME_FORMAT).to_string(),
            ical_param!("TZID", self.tz_name.as_str())
        ));
        event.properties.push(ical_property!(
            "SUMMARY",
            format!("Bin: {}", title_case(collection.stream.name()))
        ));
        event
            .properties
            .push(ical_property!("CATEGORIES", collection.stream.name()));
        event.properties.push(ical_property!(
            "DESCRIPTION",
            escape_text(&description(collection))
        ));
        event
            .properties
            .push(ical_property!("TRANSP", "TRANSPARENT"));

        event.alarms.push(reminder("-PT11H"));
        event.alarms.push(reminder("-PT30M"));
        event
    }
}

/// Stable identifier for one (stream, date) slot.
///
/// Changing this function is a breaking change: subscribed calendar
/// clients deduplicate re-published events by UID.
fn event_uid(collection: &Collection, tz: &Tz) -> String {
    let whitespace = Regex::new(r"\s+").expect("whitespace pattern is valid");
    let slug = whitespace
        .replace_all(collection.stream.name(), "-")
        .to_lowercase();
    let day = collection.date.with_timezone(tz).format(DATE_FORMAT);
    format!("{slug}-{day}@{UID_DOMAIN}")
}

/// Assemble the event description from its sections, blank-line separated;
/// empty sections are omitted.
fn description(collection: &Collection) -> String {
    let mut sections: Vec<String> = Vec::new();

    let mut instruction_lines: Vec<String> = collection
        .instructions
        .iter()
        .map(|instruction| format!("\u{2022} {}", instruction.text))
        .collect();
    if instruction_lines.is_empty() {
        instruction_lines.push(format!("\u{2022} {DEFAULT_INSTRUCTION}"));
    }
    sections.push(format!("INSTRUCTIONS\n{}", instruction_lines.join("\n")));

    let (missed, other) = partition_links(collection);
    if !missed.is_empty() {
        sections.push(format!("MISSED COLLECTION\n{}", missed.join("\n")));
    }
    if !other.is_empty() {
        sections.push(format!("LINKS\n{}", other.join("\n")));
    }

    if !collection.note.is_empty() {
        let notes: Vec<String> = collection
            .note
            .lines()
            .map(|line| format!("\u{2022} {line}"))
            .collect();
        sections.push(format!("NOTE\n{}", notes.join("\n")));
    }

    sections.join("\n\n")
}

/// Split harvested links into missed-collection reporting pages and the
/// rest, deduplicated across instructions.
fn partition_links(collection: &Collection) -> (Vec<String>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut missed = Vec::new();
    let mut other = Vec::new();

    for instruction in &collection.instructions {
        let reports_missed = instruction.text.to_lowercase().contains("missed");
        for link in &instruction.links {
            if !seen.insert(link.clone()) {
                continue;
            }
            if reports_missed || link.to_lowercase().contains("missed") {
                missed.push(link.clone());
            } else {
                other.push(link.clone());
            }
        }
    }

    (missed, other)
}

fn reminder(trigger: &str) -> IcalAlarm {
    let mut alarm = IcalAlarm::new();
    alarm.properties.push(ical_property!("ACTION", "DISPLAY"));
    alarm
        .properties
        .push(ical_property!("DESCRIPTION", REMINDER_TEXT));
    alarm.properties.push(ical_property!("TRIGGER", trigger));
    alarm
}

/// RFC 5545 TEXT escaping.
fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
