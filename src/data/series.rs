//! Series fetch client with cache, bounded retries and stale fallback
//!
//! `SeriesClient::fetch_series` runs one logical fetch:
//!
//! 1. Fresh cache entry → return it, no network call. An expired entry is
//!    not evicted here, it is kept as the fallback for step 4
//! 2. Otherwise GET `/series/{id}`; on success cache the payload and return it
//! 3. Timeouts and connection failures are retried after a fixed delay, up to
//!    `RetryPolicy::max_retries` times
//! 4. When the request finally fails, an expired cache entry is served if one
//!    exists, tagged `DataSource::Stale`; otherwise the error is returned

use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError};
use super::{observations, response_frequency, FetchedSeries, FrequencyTable};
use crate::cache::{Lookup, ResponseCache};

/// Date format the API expects in query strings
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors surfaced by `fetch_series` once retries and stale fallback are exhausted
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeouts or connection failures on every attempt
    #[error("Network unavailable after {attempts} attempt(s): {source}")]
    TransientNetwork {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The API answered with an error status or an unusable body
    #[error("API error: {0}")]
    Remote(#[source] TransportError),
}

/// How many times to retry transient failures and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Fixed wait before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(5),
        }
    }
}

/// Per-call switches for `fetch_series`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Read and write the client cache, and ask the server to use its own
    pub use_cache: bool,
    /// Ask the server to include derived analytics (AI insight text)
    pub include_derived: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            include_derived: true,
        }
    }
}

/// Client for fetching series data through the response cache
pub struct SeriesClient<T: Transport> {
    transport: T,
    cache: Arc<ResponseCache>,
    retry: RetryPolicy,
    frequencies: FrequencyTable,
}

impl<T: Transport> SeriesClient<T> {
    /// Creates a client with the default retry policy and frequency table
    pub fn new(transport: T, cache: Arc<ResponseCache>) -> Self {
        Self {
            transport,
            cache,
            retry: RetryPolicy::default(),
            frequencies: FrequencyTable::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_frequencies(mut self, frequencies: FrequencyTable) -> Self {
        self.frequencies = frequencies;
        self
    }

    /// The shared cache, for diagnostics
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetches one series for a date range
    ///
    /// # Arguments
    /// * `series` - API identifier of the series (e.g. `"cpi"`)
    /// * `start` / `end` - Inclusive date range
    /// * `options` - Cache and derived-analytics switches
    ///
    /// # Returns
    /// * `Ok(FetchedSeries)` - Fresh, cached or stale data; check `source`
    /// * `Err(FetchError)` - The API failed and no cached data exists
    pub async fn fetch_series(
        &self,
        series: &str,
        start: NaiveDate,
        end: NaiveDate,
        options: FetchOptions,
    ) -> Result<FetchedSeries, FetchError> {
        let hint = self.frequencies.get(series);

        // An expired entry is held back rather than evicted: it is the fallback
        let mut fallback = None;
        if options.use_cache {
            match self.cache.lookup(series, start, end, hint) {
                Lookup::Fresh(entry) => {
                    debug!(series, "serving from cache");
                    return Ok(FetchedSeries::cached(entry.data, entry.stored_at));
                }
                Lookup::Expired(entry) => fallback = Some(entry),
                Lookup::Missing => {}
            }
        }

        let path = format!("/series/{}", series);
        let query = [
            ("start", start.format(DATE_FORMAT).to_string()),
            ("end", end.format(DATE_FORMAT).to_string()),
            ("use_cache", options.use_cache.to_string()),
            ("include_ai", options.include_derived.to_string()),
        ];

        let mut attempt: u32 = 0;
        let error = loop {
            let result = self
                .transport
                .get_json(&path, &query)
                .await
                .and_then(validate_series_payload);

            match result {
                Ok(data) => {
                    if options.use_cache {
                        let reported = response_frequency(&data);
                        if let (Some(reported), Some(configured)) = (reported, hint) {
                            if reported != configured {
                                warn!(
                                    series,
                                    %reported,
                                    %configured,
                                    "server frequency differs from configured frequency"
                                );
                            }
                        }
                        // Keyed like the lookup above, expiring at the reported rate
                        let key = ResponseCache::key(series, start, end, hint);
                        self.cache.insert(key, data.clone(), reported.or(hint));
                    }
                    info!(series, attempts = attempt + 1, "fetched series");
                    return Ok(FetchedSeries::network(data));
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        series,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "transient failure, retrying in {:?}",
                        self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) if e.is_transient() => {
                    break FetchError::TransientNetwork {
                        attempts: attempt + 1,
                        source: e,
                    };
                }
                Err(e) => break FetchError::Remote(e),
            }
        };

        if options.use_cache {
            let stale = fallback.or_else(|| self.cache.peek_stale(series, start, end, hint));
            if let Some(entry) = stale {
                warn!(series, stored_at = %entry.stored_at, error = %error, "serving stale data");
                return Ok(FetchedSeries::stale(entry.data, entry.stored_at));
            }
        }

        Err(error)
    }

    /// Fetches the aggregate insight across all series
    ///
    /// Best effort: any failure is logged and yields `None`. Not cached.
    pub async fn fetch_overall_insight(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        use_cache: bool,
    ) -> Option<Value> {
        let query = [
            ("start", start.format(DATE_FORMAT).to_string()),
            ("end", end.format(DATE_FORMAT).to_string()),
            ("use_cache", use_cache.to_string()),
        ];
        match self.transport.get_json("/insights/overall", &query).await {
            Ok(insight) => Some(insight),
            Err(e) => {
                warn!(error = %e, "overall insight unavailable");
                None
            }
        }
    }

    /// Pings the liveness endpoint, also waking a cold backend
    pub async fn health(&self) -> bool {
        match self.transport.get_json("/health", &[]).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}

/// Rejects payloads without an observation mapping
fn validate_series_payload(payload: Value) -> Result<Value, TransportError> {
    if observations(&payload).is_some() {
        Ok(payload)
    } else {
        Err(TransportError::Malformed(
            "response has no `value` mapping".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryStore};
    use crate::data::{DataSource, Frequency};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Plays back canned responses and records each call
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value, TransportError>>>,
        calls: Mutex<Vec<(String, Vec<(String, String)>, Instant)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get_json(
            &self,
            path: &str,
            query: &[(&str, String)],
        ) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push((
                path.to_string(),
                query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                Instant::now(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout))
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn payload(v: f64) -> Value {
        json!({"data": {"value": {"2020-01-01": v}}, "frequency": "m"})
    }

    fn create_client(
        responses: Vec<Result<Value, TransportError>>,
    ) -> (SeriesClient<ScriptedTransport>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let cache = Arc::new(ResponseCache::with_clock(MemoryStore::new(), clock.clone()));
        let client = SeriesClient::new(ScriptedTransport::new(responses), cache).with_retry_policy(
            RetryPolicy {
                max_retries: 2,
                delay: Duration::from_secs(5),
            },
        );
        (client, clock)
    }

    #[tokio::test]
    async fn test_network_success_is_cached_with_reported_frequency() {
        let (client, _clock) = create_client(vec![Ok(payload(258.7))]);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        let fetched = client
            .fetch_series("cpi", start, end, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.source, DataSource::Network);
        assert_eq!(fetched.data, payload(258.7));
        assert_eq!(
            client.cache().get("cpi", start, end, Some(Frequency::Monthly)),
            Some(payload(258.7))
        );
    }

    #[tokio::test]
    async fn test_request_carries_range_and_flags() {
        let (client, _clock) = create_client(vec![Ok(payload(1.0))]);
        let options = FetchOptions {
            use_cache: true,
            include_derived: false,
        };

        client
            .fetch_series("gdp", date("2019-04-01"), date("2024-04-01"), options)
            .await
            .unwrap();

        let calls = client.transport.calls.lock().unwrap();
        let (path, query, _) = &calls[0];
        assert_eq!(path, "/series/gdp");
        assert_eq!(
            query,
            &vec![
                ("start".to_string(), "2019-04-01".to_string()),
                ("end".to_string(), "2024-04-01".to_string()),
                ("use_cache".to_string(), "true".to_string()),
                ("include_ai".to_string(), "false".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fresh_cache_hit_skips_network() {
        let (client, _clock) = create_client(vec![Ok(payload(1.0))]);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        client.fetch_series("cpi", start, end, FetchOptions::default()).await.unwrap();
        let second = client
            .fetch_series("cpi", start, end, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(second.source, DataSource::Cache);
        assert_eq!(second.data, payload(1.0));
        assert_eq!(client.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_use_cache_false_bypasses_cache_both_ways() {
        let (client, _clock) = create_client(vec![Ok(payload(1.0)), Ok(payload(2.0))]);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));
        let options = FetchOptions {
            use_cache: false,
            include_derived: true,
        };

        client.fetch_series("cpi", start, end, options).await.unwrap();
        let second = client.fetch_series("cpi", start, end, options).await.unwrap();

        assert_eq!(second.data, payload(2.0));
        assert_eq!(client.transport.call_count(), 2);
        assert!(client.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_timing_out_makes_max_retries_plus_one_attempts() {
        let (client, _clock) = create_client(vec![]);

        let err = client
            .fetch_series("cpi", date("2020-01-01"), date("2020-12-31"), FetchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TransientNetwork { attempts: 3, .. }));
        let calls = client.transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert_eq!(pair[1].2 - pair[0].2, Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let (client, _clock) = create_client(vec![
            Err(TransportError::Connection("reset".to_string())),
            Ok(payload(4.2)),
        ]);

        let fetched = client
            .fetch_series("cpi", date("2020-01-01"), date("2020-12-31"), FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.source, DataSource::Network);
        assert_eq!(client.transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_remote_error_is_not_retried() {
        let (client, _clock) = create_client(vec![Err(TransportError::Status(500))]);

        let err = client
            .fetch_series("cpi", date("2020-01-01"), date("2020-12-31"), FetchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Remote(TransportError::Status(500))));
        assert_eq!(client.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_payload_without_values_is_remote_error() {
        let (client, _clock) = create_client(vec![Ok(json!({"detail": "oops"}))]);

        let err = client
            .fetch_series("cpi", date("2020-01-01"), date("2020-12-31"), FetchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Remote(TransportError::Malformed(_))));
        assert!(client.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_served_stale_after_retries() {
        let (client, clock) = create_client(vec![Ok(payload(1.0))]);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));
        client.fetch_series("cpi", start, end, FetchOptions::default()).await.unwrap();

        clock.advance(ChronoDuration::hours(30));
        let fetched = client
            .fetch_series("cpi", start, end, FetchOptions::default())
            .await
            .unwrap();

        assert!(fetched.is_stale());
        assert_eq!(fetched.data, payload(1.0));
        assert_eq!(
            fetched.stored_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        // one success, then initial + 2 retries
        assert_eq!(client.transport.call_count(), 4);
    }

    #[tokio::test]
    async fn test_unknown_series_uses_unqualified_key() {
        let (client, _clock) = create_client(vec![Ok(json!({"value": {"2020-01-01": 1}}))]);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        client.fetch_series("oil", start, end, FetchOptions::default()).await.unwrap();
        let second = client
            .fetch_series("oil", start, end, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(second.source, DataSource::Cache);
        assert!(client.cache().get("oil", start, end, None).is_some());
    }

    #[tokio::test]
    async fn test_reported_frequency_sets_ttl_but_not_key() {
        let quarterly = json!({"value": {"2020-01-01": 1.0}, "frequency": "q"});
        let (client, clock) = create_client(vec![Ok(quarterly)]);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        client.fetch_series("oil", start, end, FetchOptions::default()).await.unwrap();

        // Quarterly entries outlive the 24h default
        clock.advance(ChronoDuration::hours(30));
        let second = client
            .fetch_series("oil", start, end, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(second.source, DataSource::Cache);
        assert_eq!(client.transport.call_count(), 1);
        let entry = client.cache().peek_stale("oil", start, end, None).unwrap();
        assert_eq!(entry.frequency, Some(Frequency::Quarterly));
    }

    #[tokio::test]
    async fn test_overall_insight_is_best_effort() {
        let (client, _clock) = create_client(vec![
            Ok(json!({"insight": "steady"})),
            Err(TransportError::Status(502)),
        ]);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        assert_eq!(
            client.fetch_overall_insight(start, end, true).await,
            Some(json!({"insight": "steady"}))
        );
        assert_eq!(client.fetch_overall_insight(start, end, false).await, None);

        let calls = client.transport.calls.lock().unwrap();
        assert_eq!(calls[0].0, "/insights/overall");
        assert_eq!(calls[1].1[2], ("use_cache".to_string(), "false".to_string()));
    }

    #[tokio::test]
    async fn test_health() {
        let (client, _clock) = create_client(vec![Ok(json!({"status": "healthy"}))]);
        assert!(client.health().await);
        assert!(!client.health().await);
    }
}
