//! Client for the council schedule page.
//!
//! The schedule only renders dates once a SaveAddress request has seeded a
//! session cookie for the selected address, so every scrape is a two-step
//! exchange: handshake, short courtesy pause, then the schedule fetch.

mod extract;
mod normalize;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Client;
use scraper::Html;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::error::ScrapeError;
use crate::model::Collection;

/// Bootstrap path that persists the selected address server-side.
const SAVE_ADDRESS_PATH: &str = "/Shared/SaveAddress";
/// Session cookie proving the address handshake took.
const SESSION_COOKIE: &str = "RedbridgeIV3LivePref";
/// Courtesy pause between the handshake and the schedule request.
const SEED_PAUSE: Duration = Duration::from_millis(150);

/// Default origin of the council site.
pub const DEFAULT_BASE_URL: &str = "https://my.redbridge.gov.uk";
/// Default path of the schedule page.
pub const DEFAULT_SCHEDULE_PATH: &str = "/RecycleRefuse";
/// Timezone the schedule page's dates are local to.
pub const DEFAULT_TIMEZONE: &str = "Europe/London";
/// Default hour of day collections start.
pub const DEFAULT_START_HOUR: u32 = 6;

/// Settings for scraping the council site.
#[derive(Debug, Clone)]
pub struct Config {
    /// Origin of the council site, no trailing slash.
    pub base_url: String,
    /// Path of the schedule page.
    pub schedule_path: String,
    /// Unique property reference number identifying the address.
    pub uprn: String,
    /// Free-text address line sent with the handshake; empty to omit.
    pub address_line: String,
    /// Postcode sent with the handshake; empty to omit.
    pub postcode: String,
    /// Latitude sent with the handshake; empty to omit.
    pub latitude: String,
    /// Longitude sent with the handshake; empty to omit.
    pub longitude: String,
    /// User-Agent header for both requests.
    pub user_agent: String,
    /// Hour of day (0-23) stamped onto every collection slot.
    pub start_hour: u32,
    /// Timeout applied to each HTTP request.
    pub request_timeout: Duration,
    /// IANA timezone name the page's dates are local to.
    pub timezone: String,
}

/// Performs the SaveAddress handshake and scrapes the upcoming schedule.
pub struct Scraper {
    cfg: Config,
    base: Url,
    tz: Tz,
}

impl Scraper {
    /// Validate the configuration and construct a scraper.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Config`] when required settings are missing
    /// or unusable.
    pub fn new(cfg: Config) -> Result<Self, ScrapeError> {
        if cfg.base_url.is_empty() || cfg.schedule_path.is_empty() {
            return Err(ScrapeError::Config(
                "base URL and schedule path are required".to_string(),
            ));
        }
        if cfg.uprn.is_empty() {
            return Err(ScrapeError::Config("UPRN is required".to_string()));
        }
        if cfg.start_hour > 23 {
            return Err(ScrapeError::Config(
                "start hour must be between 0 and 23".to_string(),
            ));
        }
        let base = Url::parse(&cfg.base_url)
            .map_err(|err| ScrapeError::Config(format!("invalid base URL: {err}")))?;
        let tz: Tz = cfg
            .timezone
            .parse()
            .map_err(|_unknown| ScrapeError::Config(format!("unknown timezone {:?}", cfg.timezone)))?;

        Ok(Self { cfg, base, tz })
    }

    /// Scrape the remote page for upcoming collection slots.
    ///
    /// Runs the full pipeline: handshake, courtesy pause, fetch, extract,
    /// normalize. The configured timeout bounds each HTTP call; dropping
    /// the returned future cancels the scrape, pause included.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::AddressSetup`] when the handshake cannot be
    /// verified, [`ScrapeError::FetchStatus`]/[`ScrapeError::Network`] on a
    /// failed schedule request, and [`ScrapeError::NoCollections`] when the
    /// page parsed but yielded no slots.
    pub async fn fetch_collections(&self) -> Result<Vec<Collection>, ScrapeError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(&self.cfg.user_agent)
            .timeout(self.cfg.request_timeout)
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        self.seed_address(&client, &jar).await?;

        // Short pause to avoid hammering the origin immediately.
        sleep(SEED_PAUSE).await;

        let body = self.fetch_schedule(&client).await?;
        let collections = self.parse_collections(&body)?;
        if collections.is_empty() {
            return Err(ScrapeError::NoCollections);
        }
        Ok(collections)
    }

    async fn seed_address(&self, client: &Client, jar: &Jar) -> Result<(), ScrapeError> {
        let endpoint = self
            .base
            .join(SAVE_ADDRESS_PATH)
            .map_err(|err| ScrapeError::Config(format!("invalid base URL: {err}")))?;

        let mut params: Vec<(&str, String)> = vec![("uprn", self.cfg.uprn.clone())];
        if !self.cfg.address_line.is_empty() {
            params.push(("address", self.cfg.address_line.clone()));
        }
        if !self.cfg.postcode.is_empty() {
            params.push(("postcode", self.cfg.postcode.clone()));
        }
        if !self.cfg.latitude.is_empty() {
            params.push(("latitude", self.cfg.latitude.clone()));
        }
        if !self.cfg.longitude.is_empty() {
            params.push(("longitude", self.cfg.longitude.clone()));
        }
        params.push(("_", Utc::now().timestamp_millis().to_string()));

        let response = client.get(endpoint.clone()).query(&params).send().await?;
        let status = response.status();

        // The cookie decides success, not the status. The site has been
        // seen setting the session cookie while returning an error body,
        // and omitting Set-Cookie when the jar already holds it, so the
        // cookie check must come first and a failing status is tolerated
        // whenever the cookie is present.
        let mut has_cookie = response
            .cookies()
            .any(|cookie| cookie.name() == SESSION_COOKIE);
        if !has_cookie {
            has_cookie = jar_holds_session_cookie(jar, &endpoint);
        }
        if !has_cookie {
            let status = (status.as_u16() >= 400).then_some(status.as_u16());
            return Err(ScrapeError::AddressSetup { status });
        }

        Ok(())
    }

    async fn fetch_schedule(&self, client: &Client) -> Result<Vec<u8>, ScrapeError> {
        let endpoint = self
            .base
            .join(&self.cfg.schedule_path)
            .map_err(|err| ScrapeError::Config(format!("invalid schedule path: {err}")))?;

        let response = client.get(endpoint).send().await?;
        let status = response.status().as_u16();
        if status >= 400 {
            return Err(ScrapeError::FetchStatus { status });
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn parse_collections(&self, body: &[u8]) -> Result<Vec<Collection>, ScrapeError> {
        let text =
            std::str::from_utf8(body).map_err(|err| ScrapeError::Parse(err.to_string()))?;
        let document = Html::parse_document(text);

        let Some(harvests) = extract::harvest_streams(&document, &self.base) else {
            debug!("schedule container missing from document");
            return Err(ScrapeError::NoCollections);
        };

        Ok(normalize::normalize(&harvests, self.tz, self.cfg.start_hour))
    }
}

fn jar_holds_session_cookie(jar: &Jar, url: &Url) -> bool {
    let Some(header) = jar.cookies(url) else {
        return false;
    };
    let Ok(cookies) = header.to_str() else {
        return false;
    };
    cookies
        .split(';')
        .filter_map(|cookie| cookie.split_once('='))
        .any(|(name, _value)| name.trim() == SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::http::header;
    use axum::response::{Html as HtmlResponse, IntoResponse};
    use axum::routing::get;
    use axum::Router;
    use chrono::Timelike;
    use chrono_tz::Tz;

    use crate::error::ScrapeError;
    use crate::model::WasteStream;

    use super::{Config, Scraper};

    const SCHEDULE_FIXTURE: &str = include_str!("collection_client/tests/schedule.html");
    const GARDEN_PAUSED_FIXTURE: &str = include_str!("collection_client/tests/garden_paused.html");
    const GARDEN_NOTICE: &str = "Garden waste collections are paused until March.";

    fn test_config(base_url: String) -> Config {
        Config {
            base_url,
            schedule_path: "/RecycleRefuse".to_string(),
            uprn: "123".to_string(),
            address_line: String::new(),
            postcode: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            user_agent: "test-agent".to_string(),
            start_hour: 6,
            request_timeout: std::time::Duration::from_secs(1),
            timezone: "Europe/London".to_string(),
        }
    }

    async fn serve(app: Router) -> SocketAddr {
        let server = axum::Server::bind(&"127.0.0.1:0".parse().expect("loopback addr"))
            .serve(app.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    async fn save_address_with_cookie() -> impl IntoResponse {
        (
            [(header::SET_COOKIE, "RedbridgeIV3LivePref=abc; Path=/")],
            "ok",
        )
    }

    #[tokio::test]
    async fn fetch_collections_success() {
        let app = Router::new()
            .route("/Shared/SaveAddress", get(save_address_with_cookie))
            .route(
                "/RecycleRefuse",
                get(|| async { HtmlResponse(SCHEDULE_FIXTURE) }),
            );
        let addr = serve(app).await;

        let scraper = Scraper::new(test_config(format!("http://{addr}"))).expect("scraper");
        let collections = scraper.fetch_collections().await.expect("collections");

        assert_eq!(collections.len(), 7);

        let first = &collections[0];
        assert_eq!(first.stream, WasteStream::Refuse);
        assert_eq!(first.date.hour(), 6);

        let garden = collections
            .iter()
            .filter(|c| c.stream == WasteStream::GardenWaste)
            .count();
        let food = collections
            .iter()
            .filter(|c| c.stream == WasteStream::FoodWaste)
            .count();
        assert_eq!(garden, 1, "duplicate garden entries must collapse to one");
        assert_eq!(food, 2, "the malformed food entry must be skipped");

        for collection in &collections {
            assert_eq!(collection.date.timezone(), "Europe/London".parse::<Tz>().unwrap());
        }
    }

    #[tokio::test]
    async fn save_address_failure_without_cookie() {
        let app = Router::new().route(
            "/Shared/SaveAddress",
            get(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let addr = serve(app).await;

        let scraper = Scraper::new(test_config(format!("http://{addr}"))).expect("scraper");
        let err = scraper.fetch_collections().await.expect_err("must fail");

        assert!(matches!(
            err,
            ScrapeError::AddressSetup { status: Some(500) }
        ));
    }

    /// Intentionally permissive policy: a failing handshake status is
    /// tolerated whenever the session cookie arrived anyway.
    #[tokio::test]
    async fn save_address_failure_with_cookie_is_tolerated() {
        let app = Router::new()
            .route(
                "/Shared/SaveAddress",
                get(|| async {
                    (
                        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                        [(header::SET_COOKIE, "RedbridgeIV3LivePref=abc; Path=/")],
                        "error body",
                    )
                }),
            )
            .route(
                "/RecycleRefuse",
                get(|| async { HtmlResponse(SCHEDULE_FIXTURE) }),
            );
        let addr = serve(app).await;

        let scraper = Scraper::new(test_config(format!("http://{addr}"))).expect("scraper");
        let collections = scraper.fetch_collections().await.expect("collections");
        assert!(!collections.is_empty());
    }

    #[tokio::test]
    async fn empty_schedule_yields_no_collections() {
        let app = Router::new()
            .route("/Shared/SaveAddress", get(save_address_with_cookie))
            .route("/RecycleRefuse", get(|| async { HtmlResponse("") }));
        let addr = serve(app).await;

        let scraper = Scraper::new(test_config(format!("http://{addr}"))).expect("scraper");
        let err = scraper.fetch_collections().await.expect_err("must fail");
        assert!(matches!(err, ScrapeError::NoCollections));
    }

    #[tokio::test]
    async fn schedule_error_status_fails_the_fetch() {
        let app = Router::new()
            .route("/Shared/SaveAddress", get(save_address_with_cookie))
            .route(
                "/RecycleRefuse",
                get(|| async { axum::http::StatusCode::BAD_GATEWAY }),
            );
        let addr = serve(app).await;

        let scraper = Scraper::new(test_config(format!("http://{addr}"))).expect("scraper");
        let err = scraper.fetch_collections().await.expect_err("must fail");
        assert!(matches!(err, ScrapeError::FetchStatus { status: 502 }));
    }

    #[test]
    fn parse_collections_harvests_instructions_and_links() {
        let scraper =
            Scraper::new(test_config("https://my.redbridge.gov.uk".to_string())).expect("scraper");
        let collections = scraper
            .parse_collections(SCHEDULE_FIXTURE.as_bytes())
            .expect("collections");

        let refuse = collections
            .iter()
            .find(|c| c.stream == WasteStream::Refuse)
            .expect("refuse slot");
        assert_eq!(refuse.instructions.len(), 2);
        assert_eq!(
            refuse.instructions[1].links,
            vec!["https://my.redbridge.gov.uk/MissedCollection/refuse".to_string()]
        );

        let noted = collections
            .iter()
            .find(|c| c.stream == WasteStream::Refuse && !c.note.is_empty())
            .expect("noted refuse slot");
        assert_eq!(noted.note, "* Collection may be later than usual.");

        let food = collections
            .iter()
            .find(|c| c.stream == WasteStream::FoodWaste)
            .expect("food slot");
        assert!(food.instructions.is_empty());
    }

    #[test]
    fn garden_pause_notice_propagates_to_other_streams() {
        let scraper =
            Scraper::new(test_config("https://my.redbridge.gov.uk".to_string())).expect("scraper");
        let collections = scraper
            .parse_collections(GARDEN_PAUSED_FIXTURE.as_bytes())
            .expect("collections");

        assert_eq!(collections.len(), 2);
        for collection in &collections {
            assert_ne!(collection.stream, WasteStream::GardenWaste);
            assert_eq!(collection.note.matches(GARDEN_NOTICE).count(), 1);
        }
    }

    #[test]
    fn invalid_encoding_is_a_parse_error() {
        let scraper =
            Scraper::new(test_config("https://my.redbridge.gov.uk".to_string())).expect("scraper");
        let err = scraper
            .parse_collections(&[0xff, 0xfe, 0x00])
            .expect_err("must fail");
        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn missing_outer_container_is_no_collections() {
        let scraper =
            Scraper::new(test_config("https://my.redbridge.gov.uk".to_string())).expect("scraper");
        let err = scraper
            .parse_collections(b"<html><body><p>maintenance</p></body></html>")
            .expect_err("must fail");
        assert!(matches!(err, ScrapeError::NoCollections));
    }

    #[test]
    fn new_rejects_bad_settings() {
        let mut cfg = test_config("https://my.redbridge.gov.uk".to_string());
        cfg.uprn = String::new();
        assert!(matches!(
            Scraper::new(cfg),
            Err(ScrapeError::Config(_))
        ));

        let mut cfg = test_config("https://my.redbridge.gov.uk".to_string());
        cfg.start_hour = 24;
        assert!(matches!(Scraper::new(cfg), Err(ScrapeError::Config(_))));

        let mut cfg = test_config("https://my.redbridge.gov.uk".to_string());
        cfg.timezone = "Europe/Atlantis".to_string();
        assert!(matches!(Scraper::new(cfg), Err(ScrapeError::Config(_))));
    }
}
