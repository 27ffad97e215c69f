//! Series data: models, catalog, transport and the fetch client
//!
//! Payloads from the API are kept as opaque JSON (`serde_json::Value`); this
//! module only looks inside them to find the observation mapping and the
//! optional frequency field.

pub mod catalog;
pub mod frequency;
pub mod series;
pub mod transport;

pub use catalog::{all_series, dashboard_series, get_series_by_id, SeriesInfo};
pub use frequency::Frequency;
pub use series::{FetchError, FetchOptions, RetryPolicy, SeriesClient};
pub use transport::{HttpTransport, Transport, TransportError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Where a returned payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Fetched from the API just now
    Network,
    /// Served from a fresh cache entry
    Cache,
    /// Served from an expired cache entry because the API was unavailable
    Stale,
}

/// Result of fetching one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedSeries {
    /// The API payload
    pub data: Value,
    /// Where the payload came from
    pub source: DataSource,
    /// When the payload was cached, for cache and stale sources
    pub stored_at: Option<DateTime<Utc>>,
}

impl FetchedSeries {
    pub fn network(data: Value) -> Self {
        Self {
            data,
            source: DataSource::Network,
            stored_at: None,
        }
    }

    pub fn cached(data: Value, stored_at: DateTime<Utc>) -> Self {
        Self {
            data,
            source: DataSource::Cache,
            stored_at: Some(stored_at),
        }
    }

    pub fn stale(data: Value, stored_at: DateTime<Utc>) -> Self {
        Self {
            data,
            source: DataSource::Stale,
            stored_at: Some(stored_at),
        }
    }

    /// Whether this data may be outdated
    pub fn is_stale(&self) -> bool {
        self.source == DataSource::Stale
    }

    /// The date → observation mapping inside the payload
    pub fn observations(&self) -> Option<&Map<String, Value>> {
        observations(&self.data)
    }
}

/// Series identifier → frequency mapping
///
/// Used to pick the cache key and TTL before the API has told us the
/// frequency. Series not in the table get the default TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable(BTreeMap<String, Frequency>);

impl FrequencyTable {
    pub fn new(entries: BTreeMap<String, Frequency>) -> Self {
        Self(entries)
    }

    /// An empty table; every series falls back to the default TTL
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, series: &str) -> Option<Frequency> {
        self.0.get(series).copied()
    }

    pub fn insert(&mut self, series: impl Into<String>, frequency: Frequency) {
        self.0.insert(series.into(), frequency);
    }

    /// Overlays `other` on top of this table
    pub fn merge(&mut self, other: FrequencyTable) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Frequency)> {
        self.0.iter()
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self(catalog::default_frequencies())
    }
}

/// Finds the observation mapping, either at the top level or under `data`
pub fn observations(payload: &Value) -> Option<&Map<String, Value>> {
    payload
        .get("value")
        .or_else(|| payload.get("data").and_then(|d| d.get("value")))
        .and_then(Value::as_object)
}

/// Reads the frequency the server reported, if any
///
/// Looks for `frequency` or `freq` at the top level first, then under `data`.
pub fn response_frequency(payload: &Value) -> Option<Frequency> {
    let read = |obj: &Value| {
        ["frequency", "freq"]
            .iter()
            .filter_map(|field| obj.get(*field).and_then(Value::as_str))
            .find_map(Frequency::parse)
    };
    read(payload).or_else(|| payload.get("data").and_then(read))
}
