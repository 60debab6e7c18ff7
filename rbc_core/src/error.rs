//! Error types for scraping and calendar generation.

use thiserror::Error;

/// Errors produced while acquiring, fetching, or normalizing the schedule.
///
/// Every variant is returned to the caller; the core never retries and
/// never swallows a failure.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The SaveAddress handshake completed without the session cookie
    /// appearing in either the response or the jar.
    #[error("failed to seed address session cookie")]
    AddressSetup {
        /// Failing status code, recorded when the remote also errored.
        status: Option<u16>,
    },

    /// The schedule request returned a client or server error status.
    #[error("fetch schedule: unexpected status {status}")]
    FetchStatus {
        /// Status code of the schedule response.
        status: u16,
    },

    /// Transport-level failure on either request.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be read as a markup document.
    #[error("parse schedule: {0}")]
    Parse(String),

    /// The markup parsed but yielded zero collection slots. Callers treat
    /// this as "schedule temporarily unparseable", not a transport failure.
    #[error("no collections found in schedule")]
    NoCollections,

    /// The scraper was constructed with unusable settings.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors raised while constructing the calendar builder.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// A feed name is required for the X-WR-CALNAME property.
    #[error("calendar name is required")]
    NameRequired,

    /// The configured timezone is not in the tz database.
    #[error("unknown timezone {0:?}")]
    Timezone(String),
}
