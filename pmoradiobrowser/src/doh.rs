//! Minimal DNS-over-HTTPS client
//!
//! Only what mirror discovery needs: A lookups and PTR reverse lookups
//! against a JSON DoH endpoint (`?name=...&type=...`, `Accept: application/dns-json`).
//! There is no retry and no caching at this layer.

use crate::error::{Error, Result};
use crate::models::DohResponse;
use async_trait::async_trait;
use reqwest::Client;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::debug;

/// Default DoH endpoint (Cloudflare JSON API)
pub const DEFAULT_DOH_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

/// Default timeout for a single DoH query
pub const DEFAULT_DOH_TIMEOUT_SECS: u64 = 10;

const DNS_JSON_CONTENT_TYPE: &str = "application/dns-json";

/// DNS record types this client knows how to ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A,
    Ptr,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Ptr => "PTR",
        }
    }
}

/// Name resolution as seen by mirror discovery
///
/// Implemented by [`DohClient`]; tests substitute their own resolvers.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolves `name` to the address strings of its A records, in answer order
    async fn resolve(&self, name: &str) -> Result<Vec<String>>;

    /// Reverse-resolves a dotted IPv4 address to a hostname (no trailing dot)
    async fn reverse(&self, address: &str) -> Result<String>;
}

/// JSON DNS-over-HTTPS client
#[derive(Debug, Clone)]
pub struct DohClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl DohClient {
    /// Create a client for the given endpoint with its own HTTP client
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_DOH_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Create a client sharing an existing reqwest connection pool
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(DEFAULT_DOH_TIMEOUT_SECS),
        }
    }

    /// Override the per-query timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the DoH endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the `in-addr.arpa` name used to reverse-resolve a dotted IPv4 address
    ///
    /// `1.2.3.4` becomes `4.3.2.1.in-addr.arpa`.
    pub fn ptr_name(address: &str) -> Result<String> {
        let ip: Ipv4Addr = address
            .parse()
            .map_err(|_| Error::dns(address, "not a dotted IPv4 address"))?;
        let [a, b, c, d] = ip.octets();
        Ok(format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a))
    }

    /// Issue one query and return the `data` field of every answer
    ///
    /// Every failure, transport included, is reported as [`Error::Dns`].
    pub async fn query(&self, name: &str, record_type: RecordType) -> Result<Vec<String>> {
        debug!(name, record_type = record_type.as_str(), "DoH query");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("type", record_type.as_str())])
            .header(reqwest::header::ACCEPT, DNS_JSON_CONTENT_TYPE)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::dns(name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::dns(
                name,
                format!("DoH endpoint returned status: {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::dns(name, e.to_string()))?;
        let parsed: DohResponse =
            serde_json::from_str(&body).map_err(|e| Error::dns(name, e.to_string()))?;

        if parsed.status != 0 {
            return Err(Error::dns(
                name,
                format!("DNS response code {}", parsed.status),
            ));
        }

        let answers = parsed
            .answer
            .ok_or_else(|| Error::dns(name, "response has no answer section"))?;

        Ok(answers.into_iter().map(|answer| answer.data).collect())
    }

    /// Resolve a name to its A record addresses
    pub async fn resolve(&self, name: &str) -> Result<Vec<String>> {
        self.query(name, RecordType::A).await
    }

    /// Reverse-resolve an IPv4 address to the hostname of its first PTR record
    pub async fn reverse(&self, address: &str) -> Result<String> {
        let ptr_name = Self::ptr_name(address)?;
        let answers = self.query(&ptr_name, RecordType::Ptr).await?;

        let first = answers
            .into_iter()
            .next()
            .ok_or_else(|| Error::dns(&ptr_name, "no PTR record"))?;

        Ok(first.strip_suffix('.').unwrap_or(&first).to_string())
    }
}

#[async_trait]
impl NameResolver for DohClient {
    async fn resolve(&self, name: &str) -> Result<Vec<String>> {
        DohClient::resolve(self, name).await
    }

    async fn reverse(&self, address: &str) -> Result<String> {
        DohClient::reverse(self, address).await
    }
}
