//! Mirror discovery
//!
//! The directory is served by a rotating pool of mirrors. The pool is only
//! known through the A records of a rendezvous domain, so one discovery pass:
//!
//! 1. resolves the rendezvous domain to mirror addresses,
//! 2. reverse-resolves every address concurrently (failures only drop that address),
//! 3. probes every candidate host concurrently for its self-reported `server_name`,
//! 4. keeps the first probe to succeed and cancels the others.
//!
//! The winner's reported name, not its PTR record, builds the API base URL:
//! a mirror being decommissioned may keep a stale reverse record.

use crate::doh::NameResolver;
use crate::error::{Error, Result};
use crate::models::MirrorConfig;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Rendezvous domain whose A records enumerate the live mirrors
pub const DEFAULT_RENDEZVOUS_DOMAIN: &str = "all.api.radio-browser.info";

/// Path, relative to a mirror root, of the document carrying `server_name`
pub const DEFAULT_CONFIG_PATH: &str = "json/config";

/// Path prefix of the JSON API on a mirror
pub const DEFAULT_API_PATH: &str = "json";

/// Upper bound for a single mirror probe
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Tunables of a discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub rendezvous_domain: String,
    /// Scheme used both for probes and for the published base URL
    pub scheme: String,
    pub config_path: String,
    pub api_path: String,
    pub probe_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            rendezvous_domain: DEFAULT_RENDEZVOUS_DOMAIN.to_string(),
            scheme: "https".to_string(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }
}

impl DiscoveryOptions {
    /// API base URL for a mirror's canonical hostname
    ///
    /// ```
    /// use pmoradiobrowser::DiscoveryOptions;
    ///
    /// let options = DiscoveryOptions::default();
    /// assert_eq!(
    ///     options.base_url("de1.api.radio-browser.info"),
    ///     "https://de1.api.radio-browser.info/json"
    /// );
    /// ```
    pub fn base_url(&self, server_name: &str) -> String {
        format!(
            "{}://{}/{}",
            self.scheme,
            server_name,
            self.api_path.trim_matches('/')
        )
    }
}

/// Asks one candidate host for its canonical server name
#[async_trait]
pub trait MirrorProbe: Send + Sync {
    async fn probe(&self, host: &str) -> Result<String>;
}

/// Produces a live API base URL
///
/// [`MirrorDiscovery`] is the real implementation; the discovery cache only
/// depends on this trait.
#[async_trait]
pub trait Discover: Send + Sync {
    async fn discover(&self) -> Result<String>;
}

/// HTTP probe fetching `{scheme}://{host}/{config_path}`
#[derive(Debug, Clone)]
pub struct HttpMirrorProbe {
    client: Client,
    scheme: String,
    config_path: String,
}

impl HttpMirrorProbe {
    pub fn new(client: Client, options: &DiscoveryOptions) -> Self {
        Self {
            client,
            scheme: options.scheme.clone(),
            config_path: options.config_path.trim_start_matches('/').to_string(),
        }
    }

    fn probe_url(&self, host: &str) -> String {
        format!("{}://{}/{}", self.scheme, host, self.config_path)
    }
}

#[async_trait]
impl MirrorProbe for HttpMirrorProbe {
    async fn probe(&self, host: &str) -> Result<String> {
        let url = self.probe_url(host);
        debug!(%url, "Probing mirror");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::ApiError(format!(
                "Mirror {} returned status: {}",
                host,
                response.status()
            )));
        }

        let config: MirrorConfig = response.json().await?;
        let server_name = config.server_name.trim().trim_end_matches('.');
        if server_name.is_empty() {
            return Err(Error::api_error(format!(
                "Mirror {} reported an empty server_name",
                host
            )));
        }

        Ok(server_name.to_string())
    }
}

/// One discovery pass over the rendezvous domain
pub struct MirrorDiscovery {
    resolver: Arc<dyn NameResolver>,
    prober: Arc<dyn MirrorProbe>,
    options: DiscoveryOptions,
}

impl MirrorDiscovery {
    pub fn new(
        resolver: Arc<dyn NameResolver>,
        prober: Arc<dyn MirrorProbe>,
        options: DiscoveryOptions,
    ) -> Self {
        Self {
            resolver,
            prober,
            options,
        }
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Resolve the rendezvous domain and reverse-resolve every address
    ///
    /// A failed reverse lookup drops that address only. A failure to resolve
    /// the rendezvous domain itself is returned as is.
    pub async fn candidates(&self) -> Result<Vec<String>> {
        let domain = &self.options.rendezvous_domain;
        let addresses = self.resolver.resolve(domain).await?;
        debug!(domain = %domain, count = addresses.len(), "Resolved mirror addresses");

        let lookups = addresses.iter().map(|address| async move {
            match self.resolver.reverse(address).await {
                Ok(host) => Some(host),
                Err(e) => {
                    debug!(%address, error = %e, "Dropping mirror address without PTR");
                    None
                }
            }
        });

        let mut seen = HashSet::new();
        Ok(join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .filter(|host| seen.insert(host.clone()))
            .collect())
    }

    /// Probe every candidate concurrently and return the first reported server name
    ///
    /// Losing probes are cancelled and awaited before this returns.
    pub async fn race(&self, candidates: &[String]) -> Result<String> {
        let cancel = CancellationToken::new();
        let mut probes = JoinSet::new();

        for host in candidates {
            let prober = Arc::clone(&self.prober);
            let host = host.clone();
            let token = cancel.child_token();
            let probe_timeout = self.options.probe_timeout;

            probes.spawn(async move {
                let outcome = tokio::select! {
                    _ = token.cancelled() => Err(Error::other("probe cancelled")),
                    result = tokio::time::timeout(probe_timeout, prober.probe(&host)) => {
                        result.unwrap_or(Err(Error::Timeout))
                    }
                };
                (host, outcome)
            });
        }

        let mut winner = None;
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((host, Ok(server_name))) => {
                    debug!(%host, %server_name, "Mirror probe won the race");
                    winner = Some(server_name);
                    break;
                }
                Ok((host, Err(e))) => {
                    debug!(%host, error = %e, "Mirror probe failed");
                }
                Err(e) => {
                    warn!(error = %e, "Mirror probe task failed");
                }
            }
        }

        cancel.cancel();
        while probes.join_next().await.is_some() {}

        winner.ok_or_else(|| Error::DiscoveryExhausted {
            domain: self.options.rendezvous_domain.clone(),
            candidates: candidates.len(),
        })
    }

    /// Run a full discovery pass and return the API base URL of the winner
    pub async fn discover(&self) -> Result<String> {
        let candidates = self.candidates().await?;
        let server_name = match self.race(&candidates).await {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "Mirror discovery exhausted");
                return Err(e);
            }
        };

        let base_url = self.options.base_url(&server_name);
        info!(%base_url, candidates = candidates.len(), "Discovered directory mirror");
        Ok(base_url)
    }
}

#[async_trait]
impl Discover for MirrorDiscovery {
    async fn discover(&self) -> Result<String> {
        MirrorDiscovery::discover(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Resolver answering from fixed tables; addresses missing from `ptr` fail
    struct FakeResolver {
        addresses: Vec<String>,
        ptr: HashMap<String, String>,
    }

    impl FakeResolver {
        fn new(entries: &[(&str, Option<&str>)]) -> Self {
            Self {
                addresses: entries.iter().map(|(a, _)| a.to_string()).collect(),
                ptr: entries
                    .iter()
                    .filter_map(|(a, h)| h.map(|h| (a.to_string(), h.to_string())))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl NameResolver for FakeResolver {
        async fn resolve(&self, name: &str) -> Result<Vec<String>> {
            if name == DEFAULT_RENDEZVOUS_DOMAIN {
                Ok(self.addresses.clone())
            } else {
                Err(Error::dns(name, "unknown name"))
            }
        }

        async fn reverse(&self, address: &str) -> Result<String> {
            self.ptr
                .get(address)
                .cloned()
                .ok_or_else(|| Error::dns(address, "no PTR record"))
        }
    }

    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed(&'static str),
        Fail,
        Hang,
    }

    /// Counts probe futures dropped before they finished
    struct DropGuard<'a> {
        dropped: &'a AtomicUsize,
        finished: bool,
    }

    impl Drop for DropGuard<'_> {
        fn drop(&mut self) {
            if !self.finished {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[derive(Default)]
    struct FakeProbe {
        behaviours: HashMap<String, Behaviour>,
        probed: Mutex<Vec<String>>,
        cancelled: AtomicUsize,
    }

    impl FakeProbe {
        fn new(behaviours: &[(&str, Behaviour)]) -> Self {
            Self {
                behaviours: behaviours
                    .iter()
                    .map(|(h, b)| (h.to_string(), *b))
                    .collect(),
                ..Default::default()
            }
        }

        fn probed(&self) -> Vec<String> {
            let mut probed = self.probed.lock().unwrap().clone();
            probed.sort();
            probed
        }
    }

    #[async_trait]
    impl MirrorProbe for FakeProbe {
        async fn probe(&self, host: &str) -> Result<String> {
            self.probed.lock().unwrap().push(host.to_string());
            let mut guard = DropGuard {
                dropped: &self.cancelled,
                finished: false,
            };
            let outcome = match self.behaviours.get(host).copied().unwrap_or(Behaviour::Fail) {
                Behaviour::Succeed(name) => Ok(name.to_string()),
                Behaviour::Fail => Err(Error::api_error("probe refused")),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(Error::api_error("woke up"))
                }
            };
            guard.finished = true;
            outcome
        }
    }

    fn discovery(resolver: FakeResolver, probe: Arc<FakeProbe>) -> MirrorDiscovery {
        MirrorDiscovery::new(Arc::new(resolver), probe, DiscoveryOptions::default())
    }

    #[tokio::test]
    async fn test_failed_reverse_lookup_only_drops_its_address() {
        let resolver = FakeResolver::new(&[
            ("10.0.0.1", Some("de1.api.radio-browser.info")),
            ("10.0.0.2", None),
            ("10.0.0.3", Some("nl1.api.radio-browser.info")),
        ]);
        let discovery = discovery(resolver, Arc::new(FakeProbe::default()));

        let candidates = discovery.candidates().await.unwrap();
        assert_eq!(
            candidates,
            vec!["de1.api.radio-browser.info", "nl1.api.radio-browser.info"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_ptr_names_are_probed_once() {
        let resolver = FakeResolver::new(&[
            ("10.0.0.1", Some("de1.api.radio-browser.info")),
            ("10.0.0.2", Some("de1.api.radio-browser.info")),
        ]);
        let discovery = discovery(resolver, Arc::new(FakeProbe::default()));
        assert_eq!(discovery.candidates().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rendezvous_resolution_failure_propagates() {
        let resolver = FakeResolver::new(&[]);
        let options = DiscoveryOptions {
            rendezvous_domain: "elsewhere.example".to_string(),
            ..Default::default()
        };
        let discovery =
            MirrorDiscovery::new(Arc::new(resolver), Arc::new(FakeProbe::default()), options);

        assert!(discovery.discover().await.unwrap_err().is_dns_error());
    }

    #[tokio::test]
    async fn test_single_winner_is_selected_whatever_its_position() {
        let hosts = ["a.example", "b.example", "c.example", "d.example"];

        for winner in 0..hosts.len() {
            let entries: Vec<(String, Option<&str>)> = hosts
                .iter()
                .enumerate()
                .map(|(i, h)| (format!("10.0.0.{}", i + 1), Some(*h)))
                .collect();
            let entries: Vec<(&str, Option<&str>)> =
                entries.iter().map(|(a, h)| (a.as_str(), *h)).collect();
            let behaviours: Vec<(&str, Behaviour)> = hosts
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    if i == winner {
                        (*h, Behaviour::Succeed("fi1.api.radio-browser.info"))
                    } else {
                        (*h, Behaviour::Fail)
                    }
                })
                .collect();

            let discovery = discovery(
                FakeResolver::new(&entries),
                Arc::new(FakeProbe::new(&behaviours)),
            );

            assert_eq!(
                discovery.discover().await.unwrap(),
                "https://fi1.api.radio-browser.info/json"
            );
        }
    }

    #[tokio::test]
    async fn test_winner_cancels_pending_probes() {
        let resolver = FakeResolver::new(&[
            ("10.0.0.1", Some("slow1.example")),
            ("10.0.0.2", Some("fast.example")),
            ("10.0.0.3", Some("slow2.example")),
        ]);
        let probe = Arc::new(FakeProbe::new(&[
            ("slow1.example", Behaviour::Hang),
            ("fast.example", Behaviour::Succeed("de2.api.radio-browser.info")),
            ("slow2.example", Behaviour::Hang),
        ]));
        let discovery = discovery(resolver, Arc::clone(&probe));

        let base_url = discovery.discover().await.unwrap();

        assert_eq!(base_url, "https://de2.api.radio-browser.info/json");
        // every loser that got to start was torn down before discover returned
        let started_losers = probe.probed().len() - 1;
        assert_eq!(probe.cancelled.load(Ordering::SeqCst), started_losers);
    }

    #[tokio::test]
    async fn test_all_probes_failing_exhausts_discovery() {
        let resolver = FakeResolver::new(&[
            ("10.0.0.1", Some("a.example")),
            ("10.0.0.2", Some("b.example")),
        ]);
        let probe = Arc::new(FakeProbe::new(&[
            ("a.example", Behaviour::Fail),
            ("b.example", Behaviour::Fail),
        ]));
        let discovery = discovery(resolver, Arc::clone(&probe));

        let err = discovery.discover().await.unwrap_err();
        assert!(matches!(
            err,
            Error::DiscoveryExhausted { candidates: 2, .. }
        ));
        assert_eq!(probe.probed(), vec!["a.example", "b.example"]);
    }

    #[tokio::test]
    async fn test_no_candidates_exhausts_discovery() {
        let resolver = FakeResolver::new(&[("10.0.0.1", None), ("10.0.0.2", None)]);
        let probe = Arc::new(FakeProbe::default());
        let discovery = discovery(resolver, Arc::clone(&probe));

        let err = discovery.discover().await.unwrap_err();
        assert!(matches!(
            err,
            Error::DiscoveryExhausted { candidates: 0, .. }
        ));
        assert!(probe.probed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_is_bounded_by_timeout() {
        let resolver = FakeResolver::new(&[
            ("10.0.0.1", Some("hang.example")),
            ("10.0.0.2", Some("down.example")),
        ]);
        let probe = Arc::new(FakeProbe::new(&[
            ("hang.example", Behaviour::Hang),
            ("down.example", Behaviour::Fail),
        ]));
        let options = DiscoveryOptions {
            probe_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let discovery = MirrorDiscovery::new(Arc::new(resolver), probe, options);

        let err = discovery.discover().await.unwrap_err();
        assert!(err.is_discovery_exhausted());
    }

    #[tokio::test]
    async fn test_http_probe_reads_server_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/json/config")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"check_enabled":true,"server_name":"at1.api.radio-browser.info"}"#)
            .create_async()
            .await;

        let options = DiscoveryOptions {
            scheme: "http".to_string(),
            ..Default::default()
        };
        let probe = HttpMirrorProbe::new(Client::new(), &options);

        let name = probe.probe(&server.host_with_port()).await.unwrap();
        assert_eq!(name, "at1.api.radio-browser.info");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_probe_rejects_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/json/config")
            .with_status(503)
            .create_async()
            .await;

        let options = DiscoveryOptions {
            scheme: "http".to_string(),
            ..Default::default()
        };
        let probe = HttpMirrorProbe::new(Client::new(), &options);

        assert!(probe.probe(&server.host_with_port()).await.is_err());
    }

    #[test]
    fn test_base_url_trims_path_slashes() {
        let options = DiscoveryOptions {
            api_path: "/json/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            options.base_url("nl1.api.radio-browser.info"),
            "https://nl1.api.radio-browser.info/json"
        );
    }
}
