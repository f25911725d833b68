//! Wire types exchanged with the analytics service.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used on the wire, in UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way the analytics service expects it.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// One access to a resource path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointHit {
    /// Name of the reporting application
    pub app: String,
    /// Resource path, e.g. `/events/12`
    pub uri: String,
    /// Client address
    pub ip: String,
    /// When the access happened
    #[serde(with = "wire_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl EndpointHit {
    /// Build a hit for `uri` at `timestamp`.
    #[must_use]
    pub fn new(
        app: impl Into<String>,
        uri: impl Into<String>,
        ip: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            app: app.into(),
            uri: uri.into(),
            ip: ip.into(),
            timestamp,
        }
    }
}

/// Aggregated hit count for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewStats {
    /// Name of the reporting application
    pub app: String,
    /// Resource path
    pub uri: String,
    /// Number of hits (distinct clients when the query asked for unique hits)
    pub hits: u64,
}

/// Parameters of a hit-count query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    /// Inclusive lower bound
    pub start: DateTime<Utc>,
    /// Inclusive upper bound
    pub end: DateTime<Utc>,
    /// Paths to count; empty means every path
    pub uris: Vec<String>,
    /// Count distinct client addresses only
    pub unique: bool,
}

impl StatsQuery {
    /// Query-string pairs, with `uris` repeated once per path.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("start", format_timestamp(self.start)),
            ("end", format_timestamp(self.end)),
        ];
        pairs.extend(self.uris.iter().map(|uri| ("uris", uri.clone())));
        pairs.push(("unique", self.unique.to_string()));
        pairs
    }
}

mod wire_timestamp {
    use super::{DateTime, NaiveDateTime, TIMESTAMP_FORMAT, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(*at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
