//! Cache key derivation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::Frequency;

/// Identity of one cached query: series, date range and sampling frequency
///
/// Equality is structural over all four fields. A key without a frequency
/// never matches a key with one, so learning a series' frequency later does
/// not collide with earlier unqualified entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub series: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub frequency: Option<Frequency>,
}

impl CacheKey {
    pub fn new(
        series: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Option<Frequency>,
    ) -> Self {
        Self {
            series: series.into(),
            start,
            end,
            frequency,
        }
    }
}

/// Human-readable form for log lines, e.g. `cpi_m_2020-01-01_2020-12-31`
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency {
            Some(freq) => write!(f, "{}_{}_{}_{}", self.series, freq, self.start, self.end),
            None => write!(f, "{}_{}_{}", self.series, self.start, self.end),
        }
    }
}
