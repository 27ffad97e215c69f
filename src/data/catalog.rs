//! Static catalog of the series the API serves
//!
//! The catalog supplies display names and the default frequency of each
//! series. Configuration may override the frequencies.

use std::collections::BTreeMap;

use super::Frequency;

/// A series known to the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesInfo {
    /// Identifier used in API paths (e.g. `"cpi"`)
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Upstream FRED series code
    pub fred_code: &'static str,
    /// Sampling frequency
    pub frequency: Frequency,
    /// Whether the series is part of the default dashboard
    pub dashboard: bool,
}

/// Every series the API is known to serve
pub static SERIES: [SeriesInfo; 7] = [
    SeriesInfo {
        id: "cpi",
        name: "Consumer Price Index",
        fred_code: "CPIAUCSL",
        frequency: Frequency::Monthly,
        dashboard: true,
    },
    SeriesInfo {
        id: "unemployment",
        name: "Unemployment Rate",
        fred_code: "UNRATE",
        frequency: Frequency::Monthly,
        dashboard: true,
    },
    SeriesInfo {
        id: "fedfunds",
        name: "Federal Funds Rate",
        fred_code: "FEDFUNDS",
        frequency: Frequency::Monthly,
        dashboard: true,
    },
    SeriesInfo {
        id: "gdp",
        name: "Gross Domestic Product",
        fred_code: "GDP",
        frequency: Frequency::Quarterly,
        dashboard: true,
    },
    SeriesInfo {
        id: "pce",
        name: "Personal Consumption Expenditures",
        fred_code: "PCE",
        frequency: Frequency::Monthly,
        dashboard: true,
    },
    SeriesInfo {
        id: "t10y3m",
        name: "10-Year minus 3-Month Treasury Spread",
        fred_code: "T10Y3M",
        frequency: Frequency::Daily,
        dashboard: true,
    },
    SeriesInfo {
        id: "nasdaq",
        name: "NASDAQ Composite Index",
        fred_code: "NASDAQCOM",
        frequency: Frequency::Daily,
        dashboard: false,
    },
];

/// Returns all known series
pub fn all_series() -> &'static [SeriesInfo] {
    &SERIES
}

/// Looks up a series by its API identifier (case-sensitive)
pub fn get_series_by_id(id: &str) -> Option<&'static SeriesInfo> {
    SERIES.iter().find(|s| s.id == id)
}

/// Identifiers of the series loaded by default
pub fn dashboard_series() -> Vec<&'static str> {
    SERIES.iter().filter(|s| s.dashboard).map(|s| s.id).collect()
}

/// Default series → frequency mapping derived from the catalog
pub fn default_frequencies() -> BTreeMap<String, Frequency> {
    SERIES
        .iter()
        .map(|s| (s.id.to_string(), s.frequency))
        .collect()
}
