//! Example: walk through one mirror discovery pass
//!
//! Run with: cargo run -p pmoradiobrowser --example discover_mirror

use pmoradiobrowser::{DiscoveryOptions, DohClient, HttpMirrorProbe, MirrorDiscovery};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let options = DiscoveryOptions::default();
    let doh = Arc::new(DohClient::new(pmoradiobrowser::doh::DEFAULT_DOH_ENDPOINT)?);

    println!("Resolving {}...\n", options.rendezvous_domain);
    let addresses = doh.resolve(&options.rendezvous_domain).await?;
    for address in &addresses {
        match doh.reverse(address).await {
            Ok(host) => println!("  {:<16} -> {}", address, host),
            Err(e) => println!("  {:<16} -> (dropped: {})", address, e),
        }
    }

    let probe = Arc::new(HttpMirrorProbe::new(reqwest::Client::new(), &options));
    let discovery = MirrorDiscovery::new(doh, probe, options);

    let base_url = discovery.discover().await?;
    println!("\nSelected mirror: {}", base_url);

    Ok(())
}
