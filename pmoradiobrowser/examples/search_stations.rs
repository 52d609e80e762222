//! Example: search the directory using the PMOMusic configuration
//!
//! Run with: cargo run -p pmoradiobrowser --example search_stations -- jazz FR

use pmoconfig::get_config;
use pmoradiobrowser::{init_logging, RadioBrowserClient, StationOrder, StationQuery};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config();
    init_logging(&config);

    let mut args = std::env::args().skip(1);
    let tag = args.next().unwrap_or_else(|| "jazz".to_string());
    let country = args.next();

    let client = RadioBrowserClient::from_config(&config)?;

    let mut query = StationQuery::new()
        .tag(&tag)
        .order(StationOrder::Votes)
        .reverse(true)
        .hide_broken(true)
        .limit(15);
    if let Some(code) = &country {
        query = query.country_code(code);
    }

    let stations = client.search_stations(&query).await?;
    println!("Top {} stations tagged '{}':\n", stations.len(), tag);
    for station in &stations {
        println!(
            "  {:<40} {:>3} {:>4} kbps  {}",
            station.name,
            station.countrycode,
            station.bitrate,
            station.stream_url()
        );
    }

    if let Some(selected) = client.discovery_cache().current() {
        println!(
            "\nServed by {} (selected at {})",
            selected.base_url, selected.discovered_at
        );
    }

    Ok(())
}
