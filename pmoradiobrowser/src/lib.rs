//! Radio Browser client library for PMOMusic
//!
//! This crate exposes the community Radio Browser directory
//! (<https://www.radio-browser.info>) to PMOMusic. The directory has no
//! fixed API host: it is served by a rotating pool of mirrors, so most of the
//! work here is finding a live one.
//!
//! # Components
//!
//! - **DoH client** ([`DohClient`]): A and PTR lookups over a JSON
//!   DNS-over-HTTPS endpoint
//! - **Mirror discovery** ([`MirrorDiscovery`]): resolves the rendezvous
//!   domain, reverse-resolves each address, then races HTTP probes and keeps
//!   the first mirror that reports its canonical `server_name`
//! - **Discovery cache** ([`DiscoveryCache`]): keeps the selected mirror for
//!   an update interval (two hours by default)
//! - **Directory client** ([`RadioBrowserClient`]): runs requests against the
//!   cached mirror and retries once through a forced discovery
//!
//! # Example
//!
//! ```no_run
//! use pmoradiobrowser::{RadioBrowserClient, StationOrder, StationQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RadioBrowserClient::new()?;
//!
//!     let top = client
//!         .search_stations(
//!             &StationQuery::new()
//!                 .tag("jazz")
//!                 .order(StationOrder::Votes)
//!                 .reverse(true)
//!                 .limit(10),
//!         )
//!         .await?;
//!     for station in top {
//!         println!("{} ({})", station.name, station.countrycode);
//!     }
//!
//!     // Raw access for endpoints without a typed helper
//!     let stats = client.request("stats", &[]).await?;
//!     println!("{}", stats);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration Extension
//!
//! With the `pmoconfig` feature (default), [`RadioBrowserConfigExt`] reads the
//! discovery settings from the `sources.radiobrowser` section and
//! [`RadioBrowserClient::from_config`] builds a client from them.

pub mod cache;
pub mod client;
pub mod discovery;
pub mod doh;
pub mod error;
pub mod models;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

#[cfg(feature = "pmoconfig")]
pub mod logging;

// Re-exports
pub use cache::{DiscoveryCache, SelectedServer};
pub use client::{ClientBuilder, RadioBrowserClient};
pub use discovery::{Discover, DiscoveryOptions, HttpMirrorProbe, MirrorDiscovery, MirrorProbe};
pub use doh::{DohClient, NameResolver, RecordType};
pub use error::{Error, Result};
pub use models::{ClickResult, Country, Station, StationOrder, StationQuery, Tag};

#[cfg(feature = "pmoconfig")]
pub use config_ext::RadioBrowserConfigExt;

#[cfg(feature = "pmoconfig")]
pub use logging::init_logging;
