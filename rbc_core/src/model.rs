//! Domain data structures for waste streams and collection slots.

use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

/// Waste streams collected by the council.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasteStream {
    /// General household refuse.
    Refuse,
    /// Mixed dry recycling.
    Recycling,
    /// Garden waste; the service is suspended over winter.
    GardenWaste,
    /// Food waste caddies.
    FoodWaste,
}

impl WasteStream {
    /// Display name as it appears on the schedule page and in JSON payloads.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WasteStream::Refuse => "Refuse",
            WasteStream::Recycling => "Recycling",
            WasteStream::GardenWaste => "Garden Waste",
            WasteStream::FoodWaste => "Food Waste",
        }
    }
}

impl fmt::Display for WasteStream {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

impl Serialize for WasteStream {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A single scheduled collection slot.
///
/// Unique per `(date, stream)` once normalized; `date` carries the
/// configured collection start hour in the configured timezone, never
/// midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    /// Collection date stamped with the start hour.
    pub date: DateTime<Tz>,
    /// Waste stream being collected.
    pub stream: WasteStream,
    /// Guidance paragraphs harvested from the stream's detail block.
    pub instructions: Vec<Instruction>,
    /// Free-text note attached to this slot.
    pub note: String,
}

/// One guidance paragraph and the links embedded in it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instruction {
    /// Paragraph text, whitespace normalized.
    pub text: String,
    /// Absolute, deduplicated link targets in document order.
    pub links: Vec<String>,
}
