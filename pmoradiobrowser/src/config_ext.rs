//! Extension pour intégrer Radio Browser dans pmoconfig
//!
//! Ce module fournit le trait `RadioBrowserConfigExt` qui ajoute à
//! `pmoconfig::Config` les réglages de la découverte des miroirs.
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoradiobrowser::{RadioBrowserClient, RadioBrowserConfigExt};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//!
//! if !config.get_radiobrowser_enabled()? {
//!     println!("Radio Browser is disabled");
//!     return Ok(());
//! }
//!
//! let client = RadioBrowserClient::from_config(&config)?;
//! # Ok(())
//! # }
//! ```

use crate::cache::DEFAULT_UPDATE_INTERVAL_SECS;
use crate::client::{ClientBuilder, RadioBrowserClient, DEFAULT_USER_AGENT};
use crate::discovery::{DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_RENDEZVOUS_DOMAIN};
use crate::doh::DEFAULT_DOH_ENDPOINT;
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

const SECTION: [&str; 2] = ["sources", "radiobrowser"];

fn key(name: &str) -> [&str; 3] {
    [SECTION[0], SECTION[1], name]
}

/// Trait d'extension pour gérer la configuration Radio Browser dans pmoconfig
///
/// Les getters persistent automatiquement la valeur par défaut lorsque la clé
/// n'existe pas encore.
pub trait RadioBrowserConfigExt {
    /// Vérifie si Radio Browser est activé (default: `true`)
    fn get_radiobrowser_enabled(&self) -> Result<bool>;

    /// Active ou désactive Radio Browser
    fn set_radiobrowser_enabled(&self, enabled: bool) -> Result<()>;

    /// Domaine dont les enregistrements A listent les miroirs
    fn get_radiobrowser_rendezvous_domain(&self) -> Result<String>;

    fn set_radiobrowser_rendezvous_domain(&self, domain: &str) -> Result<()>;

    /// Endpoint DNS-over-HTTPS (API JSON)
    fn get_radiobrowser_doh_endpoint(&self) -> Result<String>;

    fn set_radiobrowser_doh_endpoint(&self, endpoint: &str) -> Result<()>;

    /// Durée de validité d'un miroir découvert, en secondes (default: 2 heures)
    fn get_radiobrowser_update_interval_secs(&self) -> Result<u64>;

    fn set_radiobrowser_update_interval_secs(&self, secs: u64) -> Result<()>;

    /// Délai maximal d'une sonde de miroir, en secondes (default: 5)
    fn get_radiobrowser_probe_timeout_secs(&self) -> Result<u64>;

    fn set_radiobrowser_probe_timeout_secs(&self, secs: u64) -> Result<()>;

    /// User-Agent envoyé aux miroirs
    fn get_radiobrowser_user_agent(&self) -> Result<String>;

    fn set_radiobrowser_user_agent(&self, user_agent: &str) -> Result<()>;
}

fn get_string_or_default(config: &Config, name: &str, default: &str) -> Result<String> {
    match config.get_value(&key(name)) {
        Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        _ => {
            config.set_value(&key(name), Value::String(default.to_string()))?;
            Ok(default.to_string())
        }
    }
}

fn get_u64_or_default(config: &Config, name: &str, default: u64) -> Result<u64> {
    match config.get_value(&key(name)) {
        Ok(Value::Number(n)) if n.as_u64().is_some_and(|v| v > 0) => {
            Ok(n.as_u64().unwrap_or(default))
        }
        _ => {
            config.set_value(&key(name), Value::Number(default.into()))?;
            Ok(default)
        }
    }
}

impl RadioBrowserConfigExt for Config {
    fn get_radiobrowser_enabled(&self) -> Result<bool> {
        match self.get_value(&key("enabled")) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => {
                self.set_radiobrowser_enabled(true)?;
                Ok(true)
            }
        }
    }

    fn set_radiobrowser_enabled(&self, enabled: bool) -> Result<()> {
        self.set_value(&key("enabled"), Value::Bool(enabled))
    }

    fn get_radiobrowser_rendezvous_domain(&self) -> Result<String> {
        get_string_or_default(self, "rendezvous_domain", DEFAULT_RENDEZVOUS_DOMAIN)
    }

    fn set_radiobrowser_rendezvous_domain(&self, domain: &str) -> Result<()> {
        self.set_value(&key("rendezvous_domain"), Value::String(domain.to_string()))
    }

    fn get_radiobrowser_doh_endpoint(&self) -> Result<String> {
        get_string_or_default(self, "doh_endpoint", DEFAULT_DOH_ENDPOINT)
    }

    fn set_radiobrowser_doh_endpoint(&self, endpoint: &str) -> Result<()> {
        self.set_value(&key("doh_endpoint"), Value::String(endpoint.to_string()))
    }

    fn get_radiobrowser_update_interval_secs(&self) -> Result<u64> {
        get_u64_or_default(self, "update_interval_secs", DEFAULT_UPDATE_INTERVAL_SECS)
    }

    fn set_radiobrowser_update_interval_secs(&self, secs: u64) -> Result<()> {
        self.set_value(&key("update_interval_secs"), Value::Number(secs.into()))
    }

    fn get_radiobrowser_probe_timeout_secs(&self) -> Result<u64> {
        get_u64_or_default(self, "probe_timeout_secs", DEFAULT_PROBE_TIMEOUT_SECS)
    }

    fn set_radiobrowser_probe_timeout_secs(&self, secs: u64) -> Result<()> {
        self.set_value(&key("probe_timeout_secs"), Value::Number(secs.into()))
    }

    fn get_radiobrowser_user_agent(&self) -> Result<String> {
        get_string_or_default(self, "user_agent", DEFAULT_USER_AGENT)
    }

    fn set_radiobrowser_user_agent(&self, user_agent: &str) -> Result<()> {
        self.set_value(&key("user_agent"), Value::String(user_agent.to_string()))
    }
}

impl ClientBuilder {
    /// Apply the `sources.radiobrowser` section and the host HTTP timeout
    pub fn with_config(self, config: &Config) -> Result<Self> {
        Ok(self
            .rendezvous_domain(config.get_radiobrowser_rendezvous_domain()?)
            .doh_endpoint(config.get_radiobrowser_doh_endpoint()?)
            .update_interval(Duration::from_secs(
                config.get_radiobrowser_update_interval_secs()?,
            ))
            .probe_timeout(Duration::from_secs(
                config.get_radiobrowser_probe_timeout_secs()?,
            ))
            .user_agent(config.get_radiobrowser_user_agent()?)
            .timeout(Duration::from_secs(config.get_http_timeout_secs()?)))
    }
}

impl RadioBrowserClient {
    /// Build a client from the PMOMusic configuration
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        RadioBrowserClient::builder().with_config(config)?.build()
    }
}
