//! Per-stream extraction rules over the parsed schedule document.
//!
//! Each waste stream renders its own container with stream-specific class
//! names for the day and month fields; everything else about the blocks is
//! uniform, so the rules live in one table iterated the same way for every
//! stream.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::model::{Instruction, WasteStream};

const SCHEDULE_CONTAINER: &str = ".your-collection-schedule-container";
const DETAIL_SELECTOR: &str = ".collectionDetail";
const INSTRUCTION_SELECTOR: &str = "p.instructions";
const LINK_SELECTOR: &str = "a[href]";
const NOTICE_SELECTOR: &str = ".collectionDates-container .upcoming-dates";
const NOTE_SELECTOR: &str = ".asterisk-note";

/// Selector rules for one waste stream's block.
pub(crate) struct StreamRule {
    pub(crate) container: &'static str,
    pub(crate) entry: &'static str,
    pub(crate) day: &'static str,
    pub(crate) month: &'static str,
    pub(crate) stream: WasteStream,
}

/// Fixed rule table; adding a stream is one more row.
pub(crate) const STREAM_RULES: [StreamRule; 4] = [
    StreamRule {
        container: ".refuse-container",
        entry: ".collectionDates-container .garden-collection-postdate",
        day: ".refuse-garden-collection-day-numeric",
        month: ".refuse-collection-month",
        stream: WasteStream::Refuse,
    },
    StreamRule {
        container: ".recycle-container",
        entry: ".collectionDates-container .garden-collection-postdate",
        day: ".recycling-garden-collection-day-numeric",
        month: ".recycling-collection-month",
        stream: WasteStream::Recycling,
    },
    StreamRule {
        container: ".garden-container",
        entry: ".collectionDates-container .garden-collection-postdate",
        day: ".garden-collection-day-numeric",
        month: ".garden-collection-month",
        stream: WasteStream::GardenWaste,
    },
    StreamRule {
        container: ".foodwasteCollectionDay",
        entry: ".collectionDates-container .garden-collection-postdate",
        day: ".food-garden-collection-day-numeric",
        month: ".food-collection-month",
        stream: WasteStream::FoodWaste,
    },
];

/// One raw date entry pulled from a stream block.
pub(crate) struct RawEntry {
    pub(crate) day: String,
    pub(crate) month: String,
    pub(crate) note: String,
}

/// Everything harvested from one stream's container.
pub(crate) struct StreamHarvest {
    pub(crate) stream: WasteStream,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) notice: String,
    pub(crate) entries: Vec<RawEntry>,
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector is valid")
}

/// Harvest every configured stream from the document.
///
/// Returns `None` when the outer schedule container is missing entirely.
/// A missing per-stream container is not an error; the stream may be
/// seasonally absent.
pub(crate) fn harvest_streams(document: &Html, base: &Url) -> Option<Vec<StreamHarvest>> {
    let container = document.select(&sel(SCHEDULE_CONTAINER)).next()?;

    let mut harvests = Vec::new();
    for rule in &STREAM_RULES {
        let Some(block) = container.select(&sel(rule.container)).next() else {
            debug!(stream = rule.stream.name(), "stream container missing, skipping");
            continue;
        };
        harvests.push(StreamHarvest {
            stream: rule.stream,
            instructions: extract_instructions(block, base),
            notice: extract_notice(block),
            entries: extract_entries(block, rule),
        });
    }
    Some(harvests)
}

fn extract_entries(block: ElementRef<'_>, rule: &StreamRule) -> Vec<RawEntry> {
    let day_sel = sel(rule.day);
    let month_sel = sel(rule.month);
    block
        .select(&sel(rule.entry))
        .map(|entry| RawEntry {
            day: first_text(entry, &day_sel),
            month: first_text(entry, &month_sel),
            note: extract_note_text(entry, rule),
        })
        .collect()
}

/// Gather the per-entry footnote, excluding the nodes that are themselves
/// the day or month fields.
fn extract_note_text(entry: ElementRef<'_>, rule: &StreamRule) -> String {
    let day_class = rule.day.trim_start_matches('.');
    let month_class = rule.month.trim_start_matches('.');

    let mut notes = Vec::new();
    for node in entry.select(&sel(NOTE_SELECTOR)) {
        let class_attr = node.value().attr("class").unwrap_or_default();
        if class_attr.contains(day_class)
            || class_attr.contains(month_class)
            || class_attr.contains("collection-day")
            || class_attr.contains("collection-month")
        {
            continue;
        }
        let text = element_text(node);
        if !text.is_empty() {
            notes.push(text);
        }
    }
    notes.join(" ")
}

/// Harvest guidance paragraphs once per stream, independent of how many
/// dated entries the block carries.
fn extract_instructions(block: ElementRef<'_>, base: &Url) -> Vec<Instruction> {
    let Some(detail) = block.select(&sel(DETAIL_SELECTOR)).next() else {
        return Vec::new();
    };

    detail
        .select(&sel(INSTRUCTION_SELECTOR))
        .filter_map(|paragraph| {
            let text = element_text(paragraph);
            if text.is_empty() {
                return None;
            }
            Some(Instruction {
                text,
                links: extract_links(paragraph, base),
            })
        })
        .collect()
}

fn extract_links(scope: ElementRef<'_>, base: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in scope.select(&sel(LINK_SELECTOR)) {
        let href = anchor.value().attr("href").map(str::trim).unwrap_or_default();
        if href.is_empty() {
            continue;
        }
        let Some(resolved) = resolve_link(base, href) else {
            continue;
        };
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }
    links
}

fn resolve_link(base: &Url, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(href).ok().map(|resolved| resolved.to_string())
        }
        Err(_) => None,
    }
}

fn extract_notice(block: ElementRef<'_>) -> String {
    first_text(block, &sel(NOTICE_SELECTOR))
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_spaces(&element.text().collect::<Vec<_>>().join(" "))
}

/// Collapse whitespace runs to single spaces and trim.
pub(crate) fn normalize_spaces(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://my.redbridge.gov.uk").expect("base url")
    }

    #[test]
    fn resolves_relative_links_against_base() {
        assert_eq!(
            resolve_link(&base(), "/MissedCollection/refuse").as_deref(),
            Some("https://my.redbridge.gov.uk/MissedCollection/refuse")
        );
        assert_eq!(
            resolve_link(&base(), "https://example.org/guide").as_deref(),
            Some("https://example.org/guide")
        );
    }

    #[test]
    fn deduplicates_links_within_one_instruction() {
        let html = Html::parse_fragment(
            r#"<p class="instructions">See <a href="/a">here</a> and <a href="/a">here</a> and <a href="/b">there</a>.</p>"#,
        );
        let paragraph = html
            .select(&sel(INSTRUCTION_SELECTOR))
            .next()
            .expect("paragraph");
        let links = extract_links(paragraph, &base());
        assert_eq!(
            links,
            vec![
                "https://my.redbridge.gov.uk/a".to_string(),
                "https://my.redbridge.gov.uk/b".to_string(),
            ]
        );
    }

    #[test]
    fn note_text_skips_date_field_nodes() {
        let html = Html::parse_fragment(concat!(
            r#"<div class="entry">"#,
            r#"<span class="refuse-garden-collection-day-numeric asterisk-note">1</span>"#,
            r#"<span class="refuse-collection-month asterisk-note">December 2025</span>"#,
            r#"<span class="asterisk-note">* Revised date</span>"#,
            r#"</div>"#,
        ));
        let entry = html.select(&sel(".entry")).next().expect("entry");
        let note = extract_note_text(entry, &STREAM_RULES[0]);
        assert_eq!(note, "* Revised date");
    }

    #[test]
    fn normalizes_whitespace_runs() {
        assert_eq!(normalize_spaces("  2 \n\t December  2025 "), "2 December 2025");
        assert_eq!(normalize_spaces("   "), "");
    }
}
