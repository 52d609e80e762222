//! Error types for the Radio Browser adapter

/// Result type alias for Radio Browser operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the Radio Browser adapter
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A DNS-over-HTTPS query failed or came back without a usable answer
    #[error("DNS query for {name} failed: {reason}")]
    Dns { name: String, reason: String },

    /// No mirror behind the rendezvous domain answered a probe
    #[error("No live mirror found behind {domain} ({candidates} candidates probed)")]
    DiscoveryExhausted { domain: String, candidates: usize },

    /// Both the cached mirror and a freshly discovered one failed
    #[error("Directory unavailable for {path}: {reason}")]
    DirectoryUnavailable { path: String, reason: String },

    /// API returned an error status
    #[error("API error: {0}")]
    ApiError(String),

    /// Timeout error
    #[error("Request timeout")]
    Timeout,

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an API error
    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::ApiError(msg.into())
    }

    /// Create a DNS error for the queried name
    pub fn dns(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dns {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_dns_error(&self) -> bool {
        matches!(self, Error::Dns { .. })
    }

    pub fn is_discovery_exhausted(&self) -> bool {
        matches!(self, Error::DiscoveryExhausted { .. })
    }

    pub fn is_directory_unavailable(&self) -> bool {
        matches!(self, Error::DirectoryUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        assert!(Error::dns("example.org", "no answer").is_dns_error());
        assert!(Error::DiscoveryExhausted {
            domain: "all.api.radio-browser.info".into(),
            candidates: 0,
        }
        .is_discovery_exhausted());
        assert!(Error::DirectoryUnavailable {
            path: "countries".into(),
            reason: "boom".into(),
        }
        .is_directory_unavailable());
        assert!(!Error::Timeout.is_dns_error());
    }

    #[test]
    fn test_display() {
        let err = Error::dns("4.3.2.1.in-addr.arpa", "empty answer");
        assert_eq!(
            err.to_string(),
            "DNS query for 4.3.2.1.in-addr.arpa failed: empty answer"
        );
    }
}
