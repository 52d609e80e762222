//! HTTP client for the Radio Browser directory
//!
//! Every request goes to the mirror held by the [`DiscoveryCache`]. When a
//! request against that mirror fails (transport error, non-2xx status or a
//! body that is not JSON), the client forces a fresh discovery and tries
//! exactly once more. A second failure is reported as
//! [`Error::DirectoryUnavailable`].
//!
//! # Example
//!
//! ```no_run
//! use pmoradiobrowser::{RadioBrowserClient, StationQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RadioBrowserClient::new()?;
//!
//!     let stations = client
//!         .search_stations(&StationQuery::new().country_code("FR").limit(10))
//!         .await?;
//!     for station in stations {
//!         println!("{} - {}", station.name, station.stream_url());
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::cache::{DiscoveryCache, DEFAULT_UPDATE_INTERVAL_SECS};
use crate::discovery::{Discover, DiscoveryOptions, HttpMirrorProbe, MirrorDiscovery};
use crate::doh::{DohClient, DEFAULT_DOH_ENDPOINT};
use crate::error::{Error, Result};
use crate::models::{ClickResult, Country, Station, StationQuery, Tag};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "PMOMusic/0.3.10 (pmoradiobrowser)";

/// Radio Browser directory client
///
/// Cloning is cheap: clones share the HTTP connection pool and the
/// discovery cache.
#[derive(Debug, Clone)]
pub struct RadioBrowserClient {
    pub(crate) client: Client,
    cache: Arc<DiscoveryCache>,
    timeout: Duration,
}

impl RadioBrowserClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client around an existing HTTP client and discovery cache
    pub fn with_cache(client: Client, cache: Arc<DiscoveryCache>) -> Self {
        Self {
            client,
            cache,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Get the discovery cache shared by this client and its clones
    pub fn discovery_cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }

    /// Build a request URL from an API base, a path and query parameters
    ///
    /// ```
    /// use pmoradiobrowser::RadioBrowserClient;
    ///
    /// let url = RadioBrowserClient::build_url(
    ///     "https://de1.api.radio-browser.info/json",
    ///     "/stations/search",
    ///     &[("name", "fip radio")],
    /// )?;
    /// assert_eq!(
    ///     url.as_str(),
    ///     "https://de1.api.radio-browser.info/json/stations/search?name=fip+radio"
    /// );
    /// # Ok::<(), pmoradiobrowser::Error>(())
    /// ```
    pub fn build_url(base_url: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))?;

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        Ok(url)
    }

    // ========================================================================
    // Raw requests
    // ========================================================================

    /// Perform one logical directory request
    ///
    /// Tries the cached mirror first, then once more after a forced discovery.
    pub async fn request(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let first: Result<Value> = async {
            let base_url = self.cache.get_base_url(false).await?;
            self.fetch(&base_url, path, params).await
        }
        .await;

        let first_error = match first {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        warn!(path, error = %first_error, "Directory request failed, forcing mirror discovery");

        let retry: Result<Value> = async {
            let base_url = self.cache.get_base_url(true).await?;
            self.fetch(&base_url, path, params).await
        }
        .await;

        retry.map_err(|e| Error::DirectoryUnavailable {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Same as [`request`](Self::request), deserialised into `T`
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let value = self.request(path, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fetch(&self, base_url: &str, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = Self::build_url(base_url, path, params)?;
        debug!(%url, "Directory request");

        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(Error::ApiError(format!(
                "API returned status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    // ========================================================================
    // Directory queries
    // ========================================================================

    /// Search stations (`stations/search`)
    pub async fn search_stations(&self, query: &StationQuery) -> Result<Vec<Station>> {
        let pairs = query.query_pairs();
        let params: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        self.request_as("stations/search", &params).await
    }

    /// Fetch stations by their UUIDs (`stations/byuuid`)
    pub async fn stations_by_uuid(&self, uuids: &[&str]) -> Result<Vec<Station>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = uuids.join(",");
        self.request_as("stations/byuuid", &[("uuids", joined.as_str())])
            .await
    }

    /// Fetch a single station by UUID
    pub async fn station(&self, uuid: &str) -> Result<Option<Station>> {
        Ok(self.stations_by_uuid(&[uuid]).await?.into_iter().next())
    }

    /// List countries with their station counts (`countries`)
    pub async fn countries(&self) -> Result<Vec<Country>> {
        self.request_as("countries", &[]).await
    }

    /// List tags with their station counts (`tags`)
    pub async fn tags(&self) -> Result<Vec<Tag>> {
        self.request_as("tags", &[]).await
    }

    /// Register a play of a station and get its stream URL (`url/{uuid}`)
    pub async fn count_click(&self, uuid: &str) -> Result<ClickResult> {
        self.request_as(&format!("url/{}", uuid), &[]).await
    }
}

/// Builder for configuring a RadioBrowserClient
pub struct ClientBuilder {
    client: Option<Client>,
    doh_endpoint: String,
    discovery: DiscoveryOptions,
    discoverer: Option<Arc<dyn Discover>>,
    update_interval: Duration,
    timeout: Duration,
    user_agent: String,
    proxy: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            doh_endpoint: DEFAULT_DOH_ENDPOINT.to_string(),
            discovery: DiscoveryOptions::default(),
            discoverer: None,
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the DNS-over-HTTPS endpoint used for discovery
    pub fn doh_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.doh_endpoint = endpoint.into();
        self
    }

    /// Set the rendezvous domain listing the mirrors
    pub fn rendezvous_domain(mut self, domain: impl Into<String>) -> Self {
        self.discovery.rendezvous_domain = domain.into();
        self
    }

    /// Set the timeout of a single mirror probe
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.discovery.probe_timeout = timeout;
        self
    }

    /// Replace all discovery options at once
    pub fn discovery_options(mut self, options: DiscoveryOptions) -> Self {
        self.discovery = options;
        self
    }

    /// Use a custom discoverer instead of DoH + HTTP probes
    pub fn discoverer(mut self, discoverer: Arc<dyn Discover>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    /// Set how long a discovered mirror is trusted
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a proxy URL
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<RadioBrowserClient> {
        let client = if let Some(client) = self.client {
            client
        } else {
            let mut builder = Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout);

            if let Some(proxy_url) = &self.proxy {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::other(format!("Invalid proxy: {}", e)))?;
                builder = builder.proxy(proxy);
            }

            builder.build()?
        };

        let discoverer: Arc<dyn Discover> = match self.discoverer {
            Some(discoverer) => discoverer,
            None => {
                let resolver = Arc::new(DohClient::with_client(client.clone(), self.doh_endpoint));
                let prober = Arc::new(HttpMirrorProbe::new(client.clone(), &self.discovery));
                Arc::new(MirrorDiscovery::new(resolver, prober, self.discovery))
            }
        };

        Ok(RadioBrowserClient {
            client,
            cache: Arc::new(DiscoveryCache::new(discoverer, self.update_interval)),
            timeout: self.timeout,
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("doh_endpoint", &self.doh_endpoint)
            .field("discovery", &self.discovery)
            .field("custom_discoverer", &self.discoverer.is_some())
            .field("update_interval", &self.update_interval)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("proxy", &self.proxy)
            .finish()
    }
}
