//! Plain-text rendering of dashboard snapshots and cache statistics
//!
//! Each `build_*_lines` function returns the lines to print, so output can be
//! tested without capturing stdout.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::CacheStats;
use crate::dashboard::{DashboardSnapshot, SeriesStatus, SeriesSummary};
use crate::data::{get_series_by_id, DataSource, FetchedSeries};

/// Width of the series identifier column
const ID_WIDTH: usize = 14;

/// Builds the full dashboard report
pub fn build_snapshot_lines(snapshot: &DashboardSnapshot) -> Vec<String> {
    let mut lines = vec![format!(
        "Range {} to {} (loaded {})",
        snapshot.start,
        snapshot.end,
        snapshot.loaded_at.format("%Y-%m-%d %H:%M")
    )];
    if !snapshot.backend_awake {
        lines.push("API did not answer the health check; results may be slow or cached".to_string());
    }
    lines.push(String::new());

    for (id, status) in &snapshot.series {
        lines.push(build_series_line(id, status));
    }

    if let Some(insight) = &snapshot.insight {
        lines.push(String::new());
        lines.extend(build_insight_lines(insight));
    }

    let stale = snapshot.stale_count();
    if stale > 0 {
        lines.push(String::new());
        lines.push(format!("{} series shown from expired cache", stale));
    }
    lines
}

/// One line per series: name, latest value, change and data source
pub fn build_series_line(id: &str, status: &SeriesStatus) -> String {
    let name = get_series_by_id(id).map(|info| info.name).unwrap_or(id);
    match status {
        SeriesStatus::Failed { error } => {
            format!("{:<width$} {}  error: {}", id, name, error, width = ID_WIDTH)
        }
        SeriesStatus::Loaded(fetched) => {
            let summary = SeriesSummary::from_payload(&fetched.data);
            let value = match summary.as_ref().and_then(|s| s.latest.as_ref()) {
                Some((date, value)) => {
                    let change = summary
                        .as_ref()
                        .and_then(SeriesSummary::change_pct)
                        .map(|pct| format!(" ({:+.2}%)", pct))
                        .unwrap_or_default();
                    format!("{} = {:.2}{}", date, value, change)
                }
                None => "no observations".to_string(),
            };
            format!(
                "{:<width$} {}  {}  [{}]",
                id,
                name,
                value,
                source_label(fetched),
                width = ID_WIDTH
            )
        }
    }
}

fn source_label(fetched: &FetchedSeries) -> String {
    match (fetched.source, fetched.stored_at) {
        (DataSource::Network, _) => "live".to_string(),
        (DataSource::Cache, Some(at)) => format!("cached {}", format_timestamp(at)),
        (DataSource::Stale, Some(at)) => format!("STALE since {}", format_timestamp(at)),
        (DataSource::Cache, None) => "cached".to_string(),
        (DataSource::Stale, None) => "STALE".to_string(),
    }
}

/// Renders the overall insight: the health score when present, then the narrative
///
/// The API sends `{health_percent, metrics, ai_insight}`; older payloads with a
/// plain `insight`/`summary`/`text` field still render, and anything else is
/// printed as raw JSON.
pub fn build_insight_lines(insight: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(health) = insight.get("health_percent").and_then(Value::as_f64) {
        lines.push(format!("Economic health: {:.0}%", health));
    }

    let text = ["ai_insight", "insight", "summary", "text"]
        .iter()
        .find_map(|field| insight.get(field).and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty());

    match text {
        Some(text) => {
            lines.push("Insight:".to_string());
            lines.extend(text.lines().map(|l| format!("  {}", l)));
        }
        None if lines.is_empty() => lines.push(format!("Insight: {}", insight)),
        None => {}
    }
    lines
}

pub fn build_stats_lines(stats: &CacheStats) -> Vec<String> {
    let mut lines = vec![
        format!("Entries:  {} ({} valid, {} expired)", stats.total, stats.valid, stats.expired),
        format!("Size:     {}", format_bytes(stats.size_bytes)),
    ];
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        lines.push(format!("Oldest:   {}", format_timestamp(oldest)));
        lines.push(format!("Newest:   {}", format_timestamp(newest)));
    }
    lines
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}
