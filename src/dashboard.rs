//! Dashboard loading
//!
//! Loads every dashboard series plus the aggregate insight concurrently and
//! collects the outcome into a `DashboardSnapshot`.

use chrono::{DateTime, Local, Months, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use crate::data::{FetchOptions, FetchedSeries, SeriesClient, Transport};

/// Outcome of loading one series
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SeriesStatus {
    /// Data is available (fresh, cached or stale)
    Loaded(FetchedSeries),
    /// No data of any kind could be obtained
    Failed { error: String },
}

/// Everything loaded for one dashboard refresh
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Series in request order
    pub series: Vec<(String, SeriesStatus)>,
    /// Aggregate insight, if the endpoint answered
    pub insight: Option<Value>,
    /// Whether the health probe succeeded before loading
    pub backend_awake: bool,
    pub loaded_at: DateTime<Local>,
}

impl DashboardSnapshot {
    /// Looks up the status of a series by identifier
    pub fn get(&self, id: &str) -> Option<&SeriesStatus> {
        self.series
            .iter()
            .find(|(series, _)| series == id)
            .map(|(_, status)| status)
    }

    pub fn loaded_count(&self) -> usize {
        self.series
            .iter()
            .filter(|(_, s)| matches!(s, SeriesStatus::Loaded(_)))
            .count()
    }

    /// Number of series served from expired cache entries
    pub fn stale_count(&self) -> usize {
        self.series
            .iter()
            .filter(|(_, s)| matches!(s, SeriesStatus::Loaded(f) if f.is_stale()))
            .count()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.series
            .iter()
            .filter(|(_, s)| matches!(s, SeriesStatus::Failed { .. }))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Key numbers pulled from a series payload for display
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    /// Number of dated observations
    pub observations: usize,
    /// Most recent date with a numeric value, and that value
    pub latest: Option<(String, f64)>,
    /// The numeric observation before `latest`
    pub previous: Option<(String, f64)>,
}

impl SeriesSummary {
    /// Summarizes the `value` mapping of a payload
    ///
    /// Dates are ISO strings, so lexical order is chronological. Null
    /// observations are counted but skipped for latest/previous.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let values = crate::data::observations(payload)?;

        let mut numeric: Vec<(&String, f64)> = values
            .iter()
            .filter_map(|(date, v)| v.as_f64().map(|n| (date, n)))
            .collect();
        numeric.sort_by(|a, b| a.0.cmp(b.0));

        let mut recent = numeric.iter().rev();
        let latest = recent.next().map(|(d, v)| (d.to_string(), *v));
        let previous = recent.next().map(|(d, v)| (d.to_string(), *v));

        Some(Self {
            observations: values.len(),
            latest,
            previous,
        })
    }

    /// Percentage change from `previous` to `latest`
    pub fn change_pct(&self) -> Option<f64> {
        let (_, latest) = self.latest.as_ref()?;
        let (_, previous) = self.previous.as_ref()?;
        if *previous == 0.0 {
            return None;
        }
        Some((latest - previous) / previous * 100.0)
    }
}

/// The default dashboard window: five years back to `today`
pub fn default_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_months(Months::new(60))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}

/// Fills open range bounds: the end defaults to `today`, the start to five years before the end
pub fn fill_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let end = end.unwrap_or(today);
    let start = start.unwrap_or_else(|| default_range(end).0);
    (start, end)
}

/// Loads the given series and the overall insight concurrently
///
/// The backend is pinged first to wake it from a cold start; a failed ping
/// does not stop the load. The insight is skipped when
/// `options.include_derived` is off.
pub async fn load_dashboard<T: Transport>(
    client: &SeriesClient<T>,
    series: &[String],
    start: NaiveDate,
    end: NaiveDate,
    options: FetchOptions,
) -> DashboardSnapshot {
    let backend_awake = client.health().await;

    let fetches = series
        .iter()
        .map(|id| client.fetch_series(id, start, end, options));

    let insight = async {
        if options.include_derived {
            client.fetch_overall_insight(start, end, options.use_cache).await
        } else {
            None
        }
    };

    let (results, insight) =
        futures::future::join(futures::future::join_all(fetches), insight).await;

    let series = series
        .iter()
        .zip(results)
        .map(|(id, result)| {
            let status = match result {
                Ok(fetched) => SeriesStatus::Loaded(fetched),
                Err(e) => SeriesStatus::Failed {
                    error: e.to_string(),
                },
            };
            (id.clone(), status)
        })
        .collect();

    DashboardSnapshot {
        start,
        end,
        series,
        insight,
        backend_awake,
        loaded_at: Local::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, ResponseCache};
    use crate::data::{RetryPolicy, TransportError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers by path: every series but `gdp` succeeds, health fails
    struct PathTransport;

    #[async_trait]
    impl Transport for PathTransport {
        async fn get_json(
            &self,
            path: &str,
            _query: &[(&str, String)],
        ) -> Result<Value, TransportError> {
            match path {
                "/health" => Err(TransportError::Timeout),
                "/insights/overall" => Ok(json!({"insight": "mixed"})),
                "/series/gdp" => Err(TransportError::Status(500)),
                _ => Ok(json!({"data": {"value": {"2024-01-01": 1.0, "2024-02-01": 2.0}}})),
            }
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_default_range_is_five_years() {
        let (start, end) = default_range(date("2025-06-15"));
        assert_eq!(start, date("2020-06-15"));
        assert_eq!(end, date("2025-06-15"));

        // Leap day clamps to the end of February
        let (start, _) = default_range(date("2024-02-29"));
        assert_eq!(start, date("2019-02-28"));
    }

    #[test]
    fn test_summary_picks_latest_numeric_observations() {
        let payload = json!({"data": {"value": {
            "2024-03-01": null,
            "2024-01-01": 100.0,
            "2024-02-01": 110.0
        }}});

        let summary = SeriesSummary::from_payload(&payload).unwrap();
        assert_eq!(summary.observations, 3);
        assert_eq!(summary.latest, Some(("2024-02-01".to_string(), 110.0)));
        assert_eq!(summary.previous, Some(("2024-01-01".to_string(), 100.0)));
        assert!((summary.change_pct().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_without_values() {
        assert!(SeriesSummary::from_payload(&json!({"trend": {}})).is_none());

        let summary = SeriesSummary::from_payload(&json!({"value": {}})).unwrap();
        assert_eq!(summary.observations, 0);
        assert!(summary.latest.is_none());
        assert!(summary.change_pct().is_none());
    }

    #[tokio::test]
    async fn test_load_dashboard_collects_every_series() {
        let cache = Arc::new(ResponseCache::new(MemoryStore::new()));
        let client = SeriesClient::new(PathTransport, cache).with_retry_policy(RetryPolicy {
            max_retries: 0,
            delay: Duration::ZERO,
        });
        let series: Vec<String> = ["cpi", "gdp", "t10y3m"].iter().map(|s| s.to_string()).collect();

        let snapshot = load_dashboard(
            &client,
            &series,
            date("2020-01-01"),
            date("2024-12-31"),
            FetchOptions::default(),
        )
        .await;

        assert!(!snapshot.backend_awake);
        assert_eq!(snapshot.insight, Some(json!({"insight": "mixed"})));
        assert_eq!(snapshot.loaded_count(), 2);
        assert_eq!(snapshot.stale_count(), 0);
        assert_eq!(snapshot.failed(), vec!["gdp"]);
        assert!(matches!(snapshot.get("cpi"), Some(SeriesStatus::Loaded(_))));
        let order: Vec<&str> = snapshot.series.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["cpi", "gdp", "t10y3m"]);
    }

    #[tokio::test]
    async fn test_load_dashboard_without_derived_skips_insight() {
        let cache = Arc::new(ResponseCache::new(MemoryStore::new()));
        let client = SeriesClient::new(PathTransport, cache);
        let options = FetchOptions {
            use_cache: true,
            include_derived: false,
        };

        let snapshot = load_dashboard(
            &client,
            &["cpi".to_string()],
            date("2020-01-01"),
            date("2024-12-31"),
            options,
        )
        .await;

        assert!(snapshot.insight.is_none());
        assert_eq!(snapshot.loaded_count(), 1);
    }
}
