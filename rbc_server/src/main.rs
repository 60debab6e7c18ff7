use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rbc_core::cache::CollectionCache;
use rbc_core::calendar;
use rbc_core::collection_client::{self, Scraper};

mod config;
mod handler;

use handler::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_unset| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load()?;

    let scraper = Scraper::new(collection_client::Config {
        base_url: cfg.base_url.clone(),
        schedule_path: cfg.schedule_path.clone(),
        uprn: cfg.uprn.clone(),
        address_line: cfg.address_line.clone(),
        postcode: cfg.postcode.clone(),
        latitude: cfg.latitude.clone(),
        longitude: cfg.longitude.clone(),
        user_agent: cfg.user_agent.clone(),
        start_hour: cfg.start_hour,
        request_timeout: cfg.request_timeout,
        timezone: cfg.timezone.clone(),
    })?;

    let builder = calendar::Builder::new(calendar::Config {
        name: cfg.calendar_name.clone(),
        description: cfg.calendar_description.clone(),
        timezone: cfg.timezone.clone(),
    })?;

    let tz = cfg
        .timezone
        .parse()
        .map_err(|err| anyhow::anyhow!("unknown timezone: {err}"))?;

    let state = Arc::new(AppState {
        source: Arc::new(scraper),
        calendar: builder,
        cache: CollectionCache::new(),
        cache_ttl: cfg.cache_ttl,
        tz,
    });

    let app = Router::new()
        .route("/healthz", get(handler::healthz))
        .route("/calendar.ics", get(handler::calendar_ics))
        .route("/api/next", get(handler::next))
        .route("/api/types", get(handler::types))
        .route("/api/is-today", get(handler::is_today))
        .route("/api/is-tomorrow", get(handler::is_tomorrow))
        .with_state(state);

    let addr: SocketAddr = cfg.listen_addr.parse().context("invalid LISTEN_ADDR")?;
    info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to install shutdown handler");
    }
}
