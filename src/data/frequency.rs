//! Sampling frequency of a series and the cache lifetime it implies

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifetime used for entries whose frequency is unknown
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Error returned when a frequency string is not recognized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown frequency: '{0}'. Valid values: d, w, m, q, a")]
pub struct ParseFrequencyError(pub String);

/// Sampling cadence of an economic series
///
/// Serialized as the single-letter code the API uses (`"d"`, `"w"`, `"m"`,
/// `"q"`, `"a"`). Annual also accepts `"y"` on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "d")]
    Daily,
    #[serde(rename = "w")]
    Weekly,
    #[serde(rename = "m")]
    Monthly,
    #[serde(rename = "q")]
    Quarterly,
    #[serde(rename = "a", alias = "y")]
    Annual,
}

impl Frequency {
    /// Single-letter code used in cache keys and on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Daily => "d",
            Frequency::Weekly => "w",
            Frequency::Monthly => "m",
            Frequency::Quarterly => "q",
            Frequency::Annual => "a",
        }
    }

    /// How long a cached response for a series of this frequency stays fresh
    ///
    /// Faster-moving series get a shorter lifetime.
    pub fn ttl(&self) -> Duration {
        match self {
            Frequency::Daily => Duration::hours(6),
            Frequency::Weekly => Duration::hours(12),
            Frequency::Monthly => Duration::hours(24),
            Frequency::Quarterly => Duration::days(7),
            Frequency::Annual => Duration::days(30),
        }
    }

    /// Parses a frequency leniently, returning `None` for anything unrecognized
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "d" | "daily" => Some(Frequency::Daily),
            "w" | "weekly" => Some(Frequency::Weekly),
            "m" | "monthly" => Some(Frequency::Monthly),
            "q" | "quarterly" => Some(Frequency::Quarterly),
            "a" | "y" | "annual" | "yearly" => Some(Frequency::Annual),
            _ => None,
        }
    }
}

/// TTL for an optional frequency, falling back to the default lifetime
pub fn ttl_for(frequency: Option<Frequency>) -> Duration {
    frequency
        .map(|f| f.ttl())
        .unwrap_or_else(|| Duration::hours(DEFAULT_TTL_HOURS))
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::parse(s).ok_or_else(|| ParseFrequencyError(s.to_string()))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
