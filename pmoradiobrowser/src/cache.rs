//! Discovery cache
//!
//! Holds the last selected mirror so that discovery runs at most once per
//! update interval instead of once per request. The selection is published as
//! a whole (`Arc<SelectedServer>` swapped under a lock): readers see either the
//! previous pair of base URL and timestamp or the new one, never a mix.
//!
//! Refreshes are single-flight. A caller that waited for another caller's
//! refresh reuses the result it published, even when it asked for a forced
//! refresh, since that result is newer than the server it wanted to replace.

use crate::discovery::Discover;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default staleness interval (two hours)
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 2 * 3600;

/// The mirror currently in use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedServer {
    /// API base URL, e.g. `https://de1.api.radio-browser.info/json`
    pub base_url: String,
    /// Monotonic selection instant, used for staleness
    pub selected_at: Instant,
    /// Wall-clock selection time, for diagnostics
    pub discovered_at: DateTime<Utc>,
    /// Increases by one with every published selection
    pub generation: u64,
}

impl SelectedServer {
    pub fn age(&self) -> Duration {
        self.selected_at.elapsed()
    }

    /// True once the selection is older than `interval`
    pub fn is_stale(&self, interval: Duration) -> bool {
        self.age() > interval
    }
}

/// Process-lifetime cache of the selected mirror
pub struct DiscoveryCache {
    discoverer: Arc<dyn Discover>,
    update_interval: Duration,
    current: RwLock<Option<Arc<SelectedServer>>>,
    refresh: Mutex<()>,
    runs: AtomicU64,
    generation: AtomicU64,
}

impl DiscoveryCache {
    pub fn new(discoverer: Arc<dyn Discover>, update_interval: Duration) -> Self {
        Self {
            discoverer,
            update_interval,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
            runs: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Snapshot of the current selection, if any
    pub fn current(&self) -> Option<Arc<SelectedServer>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// True when nothing is selected or the selection is too old to be trusted
    pub fn is_stale(&self) -> bool {
        self.current()
            .map_or(true, |server| server.is_stale(self.update_interval))
    }

    /// Drop the current selection; the next `get_base_url` call runs discovery
    pub fn invalidate(&self) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        debug!("Discovery cache invalidated");
    }

    /// Number of discovery passes started so far, successful or not
    pub fn discovery_runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Return the API base URL, running discovery when needed
    ///
    /// Discovery runs when `force_refresh` is set, when nothing is cached, or
    /// when the cached selection is stale. Otherwise no network I/O happens.
    /// A failed discovery leaves the previous selection in place.
    pub async fn get_base_url(&self, force_refresh: bool) -> Result<String> {
        let observed = self.current();

        if !force_refresh {
            if let Some(server) = &observed {
                if !server.is_stale(self.update_interval) {
                    return Ok(server.base_url.clone());
                }
            }
        }

        let observed_generation = observed.as_ref().map(|server| server.generation);
        let _refresh = self.refresh.lock().await;

        if let Some(server) = self.current() {
            if Some(server.generation) != observed_generation
                && !server.is_stale(self.update_interval)
            {
                debug!(base_url = %server.base_url, "Reusing selection published while waiting");
                return Ok(server.base_url.clone());
            }
        }

        self.runs.fetch_add(1, Ordering::SeqCst);
        debug!(force_refresh, "Running mirror discovery");
        let base_url = self.discoverer.discover().await?;

        let selected = Arc::new(SelectedServer {
            base_url: base_url.clone(),
            selected_at: Instant::now(),
            discovered_at: Utc::now(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        });
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(selected);

        info!(%base_url, "Published directory mirror");
        Ok(base_url)
    }
}

impl std::fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("update_interval", &self.update_interval)
            .field("current", &self.current())
            .field("discovery_runs", &self.discovery_runs())
            .finish()
    }
}
