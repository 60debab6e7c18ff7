//! HTTP handlers wiring the scraper, cache, and calendar builder together.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use rbc_core::cache::CollectionCache;
use rbc_core::calendar;
use rbc_core::collection_client::Scraper;
use rbc_core::days;
use rbc_core::error::ScrapeError;
use rbc_core::model::Collection;

const CACHE_CONTROL_ICS: &str = "public, max-age=300";

/// Source of collection slots; lets handler tests stub out the network
/// scraper.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Fetch the current upcoming collections.
    async fn fetch_collections(&self) -> Result<Vec<Collection>, ScrapeError>;
}

#[async_trait]
impl CollectionSource for Scraper {
    async fn fetch_collections(&self) -> Result<Vec<Collection>, ScrapeError> {
        Scraper::fetch_collections(self).await
    }
}

/// Shared state behind every route.
pub struct AppState {
    pub source: Arc<dyn CollectionSource>,
    pub calendar: calendar::Builder,
    pub cache: CollectionCache,
    pub cache_ttl: Duration,
    pub tz: Tz,
}

/// Error rendered as `{"error": <code>}` with a matching status code.
#[derive(Debug)]
pub enum ApiError {
    /// The `now` override failed to parse as RFC 3339.
    InvalidNow,
    /// No day summary lies at or after the requested instant.
    NoUpcoming,
    /// Collections could not be produced for an API route.
    Unavailable,
    /// Scrape failure surfaced on the calendar route.
    Scrape(ScrapeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            ApiError::InvalidNow => (StatusCode::BAD_REQUEST, "invalid_now"),
            ApiError::NoUpcoming => (StatusCode::NOT_FOUND, "no_upcoming_collections"),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            ApiError::Scrape(ref err) => (StatusCode::BAD_GATEWAY, scrape_code(err)),
        };
        (status, Json(json!({ "error": code }))).into_response()
    }
}

fn scrape_code(err: &ScrapeError) -> &'static str {
    match err {
        ScrapeError::NoCollections => "failed_to_parse_schedule",
        ScrapeError::AddressSetup { .. } => "address_setup_failed",
        _ => "scrape_failed",
    }
}

/// Query parameters accepted by the day-lookup routes.
#[derive(Debug, Deserialize)]
pub struct NowParams {
    /// RFC 3339 override for "now"; defaults to the wall clock.
    now: Option<String>,
}

/// Query parameters accepted by the calendar route.
#[derive(Debug, Deserialize)]
pub struct CalendarParams {
    /// Bypass the cache and force a fresh scrape.
    #[serde(default)]
    refresh: bool,
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve the iCalendar feed.
pub async fn calendar_ics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CalendarParams>,
) -> Result<Response, ApiError> {
    let collections = collections(&state, params.refresh).await.map_err(|err| {
        error!(error = %err, "scrape failed");
        ApiError::Scrape(err)
    })?;

    let payload = state.calendar.build(&collections);
    Ok((
        [
            (CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (CACHE_CONTROL, CACHE_CONTROL_ICS),
        ],
        payload,
    )
        .into_response())
}

/// Next upcoming collection day: `{date, days, types}`.
pub async fn next(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NowParams>,
) -> Result<Json<Value>, ApiError> {
    let now = resolve_now(params.now.as_deref(), state.tz)?;
    let collections = available_collections(&state).await?;

    let day = days::next_day(now, &collections).ok_or(ApiError::NoUpcoming)?;
    Ok(Json(json!({
        "date": day.date.format("%Y-%m-%d").to_string(),
        "days": days::days_between(now, day.date),
        "types": day.types,
    })))
}

/// Streams for today and tomorrow: `{today: [...], tomorrow: [...]}`.
pub async fn types(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NowParams>,
) -> Result<Json<Value>, ApiError> {
    let now = resolve_now(params.now.as_deref(), state.tz)?;
    let collections = available_collections(&state).await?;

    Ok(Json(json!({
        "today": days::today(now, &collections),
        "tomorrow": days::tomorrow(now, &collections),
    })))
}

/// Boolean "is today a collection day" lookup.
pub async fn is_today(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NowParams>,
) -> Result<Json<Value>, ApiError> {
    let now = resolve_now(params.now.as_deref(), state.tz)?;
    let collections = available_collections(&state).await?;

    let streams = days::today(now, &collections);
    Ok(Json(json!({
        "today": !streams.is_empty(),
        "types": streams,
    })))
}

/// Boolean "is tomorrow a collection day" lookup.
pub async fn is_tomorrow(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NowParams>,
) -> Result<Json<Value>, ApiError> {
    let now = resolve_now(params.now.as_deref(), state.tz)?;
    let collections = available_collections(&state).await?;

    let streams = days::tomorrow(now, &collections);
    Ok(Json(json!({
        "tomorrow": !streams.is_empty(),
        "types": streams,
    })))
}

/// Serve from cache when fresh, otherwise scrape and repopulate.
///
/// A failed scrape never touches the cache, so stale-but-unexpired data
/// keeps being served to other requests while one fails.
async fn collections(state: &AppState, force: bool) -> Result<Vec<Collection>, ScrapeError> {
    if !force {
        if let Some(items) = state.cache.get(state.cache_ttl).await {
            debug!(items = items.len(), "cache hit");
            return Ok(items);
        }
    }

    let started = Instant::now();
    info!("scrape start");
    let items = state.source.fetch_collections().await?;
    info!(
        items = items.len(),
        took_ms = started.elapsed().as_millis() as u64,
        "scrape complete"
    );

    state.cache.set(items.clone()).await;
    Ok(items)
}

async fn available_collections(state: &AppState) -> Result<Vec<Collection>, ApiError> {
    collections(state, false).await.map_err(|err| {
        error!(error = %err, "collections unavailable");
        ApiError::Unavailable
    })
}

fn resolve_now(input: Option<&str>, tz: Tz) -> Result<DateTime<Tz>, ApiError> {
    let input = input.map(str::trim).unwrap_or_default();
    if input.is_empty() {
        return Ok(Utc::now().with_timezone(&tz));
    }
    DateTime::parse_from_rfc3339(input)
        .map(|parsed| parsed.with_timezone(&tz))
        .map_err(|_invalid| ApiError::InvalidNow)
}
