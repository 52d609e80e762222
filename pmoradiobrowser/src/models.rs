//! Data models for DoH answers, mirror probes and Radio Browser API responses
//!
//! Field names follow the upstream JSON. Every directory model is lenient
//! (`#[serde(default)]`) because mirrors do not always run the same API version.

use serde::{Deserialize, Serialize};

// ============================================================================
// DNS-over-HTTPS
// ============================================================================

/// JSON body returned by a DoH endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DohResponse {
    /// DNS RCODE (0 = NOERROR)
    #[serde(rename = "Status", default)]
    pub status: u32,
    /// Answer section, absent when the server had nothing to say
    #[serde(rename = "Answer")]
    pub answer: Option<Vec<DohAnswer>>,
}

/// One record of a DoH answer section
#[derive(Debug, Clone, Deserialize)]
pub struct DohAnswer {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub record_type: u16,
    #[serde(rename = "TTL", default)]
    pub ttl: u32,
    pub data: String,
}

// ============================================================================
// Mirror probe
// ============================================================================

/// Subset of a mirror's `json/config` document
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Canonical hostname the mirror reports for itself
    pub server_name: String,
}

// ============================================================================
// Directory API
// ============================================================================

/// A radio station as listed by the directory
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Station {
    pub changeuuid: String,
    pub stationuuid: String,
    pub name: String,
    pub url: String,
    pub url_resolved: String,
    pub homepage: String,
    pub favicon: String,
    /// Comma separated tag list
    pub tags: String,
    pub country: String,
    pub countrycode: String,
    pub state: String,
    pub language: String,
    pub votes: i64,
    pub codec: String,
    pub bitrate: u32,
    pub hls: u8,
    pub lastcheckok: u8,
    pub clickcount: i64,
}

impl Station {
    /// Split the comma separated tag list
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// URL to hand to a player: the resolved stream when known, the raw URL otherwise
    pub fn stream_url(&self) -> &str {
        if self.url_resolved.is_empty() {
            &self.url
        } else {
            &self.url_resolved
        }
    }

    /// Whether the directory's last health check of the stream succeeded
    pub fn is_ok(&self) -> bool {
        self.lastcheckok == 1
    }
}

/// A country with its station count
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Country {
    pub name: String,
    pub iso_3166_1: String,
    pub stationcount: u32,
}

/// A tag with its station count
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Tag {
    pub name: String,
    pub stationcount: u32,
}

/// Answer to a click count request (`url/{stationuuid}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClickResult {
    pub ok: bool,
    pub message: String,
    pub stationuuid: String,
    pub name: String,
    pub url: String,
}

/// Sort order accepted by `stations/search`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationOrder {
    Name,
    Votes,
    ClickCount,
    Bitrate,
    Random,
}

impl StationOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationOrder::Name => "name",
            StationOrder::Votes => "votes",
            StationOrder::ClickCount => "clickcount",
            StationOrder::Bitrate => "bitrate",
            StationOrder::Random => "random",
        }
    }
}

/// Parameters for `stations/search`
///
/// # Example
///
/// ```
/// use pmoradiobrowser::{StationOrder, StationQuery};
///
/// let query = StationQuery::new()
///     .country_code("FR")
///     .tag("jazz")
///     .order(StationOrder::Votes)
///     .limit(20);
/// assert!(query.query_pairs().contains(&("tag", "jazz".to_string())));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationQuery {
    name: Option<String>,
    country_code: Option<String>,
    tag: Option<String>,
    order: Option<StationOrder>,
    reverse: bool,
    offset: Option<u32>,
    limit: Option<u32>,
    hide_broken: bool,
}

impl StationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// ISO 3166-1 alpha-2 code, matched exactly by the directory
    pub fn country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = Some(code.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn order(mut self, order: StationOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn hide_broken(mut self, hide: bool) -> Self {
        self.hide_broken = hide;
        self
    }

    /// Query string pairs understood by the directory
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(name) = &self.name {
            pairs.push(("name", name.clone()));
        }
        if let Some(code) = &self.country_code {
            pairs.push(("countrycode", code.clone()));
        }
        if let Some(tag) = &self.tag {
            pairs.push(("tag", tag.clone()));
            pairs.push(("tagExact", "true".to_string()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.as_str().to_string()));
        }
        if self.reverse {
            pairs.push(("reverse", "true".to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if self.hide_broken {
            pairs.push(("hidebroken", "true".to_string()));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doh_response_without_answer() {
        let response: DohResponse = serde_json::from_str(r#"{"Status":0,"TC":false}"#).unwrap();
        assert_eq!(response.status, 0);
        assert!(response.answer.is_none());
    }

    #[test]
    fn test_station_deserialize_partial() {
        let json = r#"{
            "stationuuid": "9617a958-0601-11e8-ae97-52543be04c81",
            "name": "FIP",
            "url": "http://icecast.radiofrance.fr/fip-midfi.mp3",
            "url_resolved": "",
            "tags": "eclectic, jazz,,world",
            "countrycode": "FR",
            "bitrate": 128,
            "lastcheckok": 1,
            "unknown_field": "ignored"
        }"#;

        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.name, "FIP");
        assert_eq!(station.tag_list(), vec!["eclectic", "jazz", "world"]);
        assert_eq!(
            station.stream_url(),
            "http://icecast.radiofrance.fr/fip-midfi.mp3"
        );
        assert!(station.is_ok());
        assert_eq!(station.votes, 0);
    }

    #[test]
    fn test_empty_query_has_no_pairs() {
        assert!(StationQuery::new().query_pairs().is_empty());
    }

    #[test]
    fn test_query_pairs() {
        let pairs = StationQuery::new()
            .name("fip")
            .country_code("FR")
            .order(StationOrder::ClickCount)
            .reverse(true)
            .offset(40)
            .limit(20)
            .hide_broken(true)
            .query_pairs();

        assert_eq!(
            pairs,
            vec![
                ("name", "fip".to_string()),
                ("countrycode", "FR".to_string()),
                ("order", "clickcount".to_string()),
                ("reverse", "true".to_string()),
                ("offset", "40".to_string()),
                ("limit", "20".to_string()),
                ("hidebroken", "true".to_string()),
            ]
        );
    }
}
