use std::env::current_dir;
use std::fs::write;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use rbc_core::calendar;
use rbc_core::collection_client::{
    self, Scraper, DEFAULT_BASE_URL, DEFAULT_SCHEDULE_PATH, DEFAULT_START_HOUR, DEFAULT_TIMEZONE,
};

/// Fetch the collection schedule once and write an iCalendar file.
#[derive(Debug, Parser)]
pub struct Arguments {
    /// unique property reference number of the address
    pub uprn: String,
    /// free-text address line sent with the handshake
    #[arg(long)]
    pub address_line: Option<String>,
    /// postcode sent with the handshake
    #[arg(long)]
    pub postcode: Option<String>,
    /// latitude sent with the handshake
    #[arg(long)]
    pub latitude: Option<String>,
    /// longitude sent with the handshake
    #[arg(long)]
    pub longitude: Option<String>,
    /// origin of the council site
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// path of the schedule page
    #[arg(long, default_value = DEFAULT_SCHEDULE_PATH)]
    pub schedule_path: String,
    /// hour of day collections start
    #[arg(long, default_value_t = DEFAULT_START_HOUR)]
    pub start_hour: u32,
    /// output file name
    #[arg(long, default_value = "calendar.ics")]
    pub output: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();

    let scraper = Scraper::new(collection_client::Config {
        base_url: args.base_url.clone(),
        schedule_path: args.schedule_path.clone(),
        uprn: args.uprn.clone(),
        address_line: args.address_line.clone().unwrap_or_default(),
        postcode: args.postcode.clone().unwrap_or_default(),
        latitude: args.latitude.clone().unwrap_or_default(),
        longitude: args.longitude.clone().unwrap_or_default(),
        user_agent: String::from("redbridge-bin-calendar/1.0"),
        start_hour: args.start_hour,
        request_timeout: Duration::from_secs(15),
        timezone: DEFAULT_TIMEZONE.to_string(),
    })?;

    let builder = calendar::Builder::new(calendar::Config {
        name: String::from("Redbridge Collections"),
        description: String::from("Household waste & recycling (scraped)"),
        timezone: DEFAULT_TIMEZONE.to_string(),
    })?;

    let collections = scraper.fetch_collections().await?;
    let payload = builder.build(&collections);

    let mut path = current_dir()?;
    path.push(&args.output);
    write(path, payload)?;

    Ok(())
}
