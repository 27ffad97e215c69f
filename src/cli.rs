//! Command-line interface parsing for fredwatch
//!
//! This module handles parsing of CLI arguments using clap: the global
//! configuration flags, the subcommands, and the date range and frequency
//! override arguments they share.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Config;
use crate::dashboard::fill_range;
use crate::data::{FetchOptions, Frequency};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A date argument is not in YYYY-MM-DD form
    #[error("Invalid date: '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    /// The start of a range falls after its end
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A frequency override is not `SERIES=CODE`
    #[error("Invalid frequency override: '{0}'. Expected SERIES=CODE, CODE one of d w m q a")]
    InvalidFrequency(String),
}

/// fredwatch - cached, retrying client for the FRED macro dashboard API
#[derive(Parser, Debug)]
#[command(name = "fredwatch")]
#[command(about = "Fetch and watch macroeconomic series with a local response cache")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    /// Directory for the persistent cache
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Keep the cache in memory only
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// Override a series frequency, e.g. `--frequency gdp=q` (repeatable)
    #[arg(
        long = "frequency",
        global = true,
        value_name = "SERIES=CODE",
        value_parser = parse_frequency_override
    )]
    pub frequencies: Vec<(String, Frequency)>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch series (the dashboard set when none are given)
    Fetch(FetchArgs),
    /// Show the aggregate insight across all series
    Insights(InsightsArgs),
    /// Ping the API
    Health,
    /// Inspect or maintain the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Reload the dashboard periodically until interrupted
    Watch(WatchArgs),
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Entry counts, size and age range
    Stats,
    /// Remove every entry
    Clear,
    /// Remove expired entries
    Cleanup,
}

/// Date range shared by the data commands
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// First date (YYYY-MM-DD); defaults to five years before the end
    #[arg(long, value_parser = parse_date_arg)]
    pub start: Option<NaiveDate>,

    /// Last date (YYYY-MM-DD); defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    pub end: Option<NaiveDate>,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Series identifiers, e.g. cpi gdp
    pub series: Vec<String>,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Bypass the client and server caches
    #[arg(long)]
    pub no_cache: bool,

    /// Skip derived analytics
    #[arg(long)]
    pub no_ai: bool,

    /// Print the snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InsightsArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Bypass the server cache
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Series identifiers (the dashboard set when none are given)
    pub series: Vec<String>,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Seconds between reloads (overrides the config file)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

/// Parses a `YYYY-MM-DD` date argument.
///
/// # Arguments
/// * `s` - The date string from CLI
///
/// # Returns
/// * `Ok(NaiveDate)` if the string is a valid calendar date
/// * `Err(CliError::InvalidDate)` otherwise
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(s.to_string()))
}

/// Parses a `SERIES=CODE` frequency override.
pub fn parse_frequency_override(s: &str) -> Result<(String, Frequency), CliError> {
    let invalid = || CliError::InvalidFrequency(s.to_string());
    let (series, code) = s.split_once('=').ok_or_else(invalid)?;
    let series = series.trim();
    if series.is_empty() {
        return Err(invalid());
    }
    let frequency = Frequency::parse(code).ok_or_else(invalid)?;
    Ok((series.to_string(), frequency))
}

impl RangeArgs {
    /// Fills in missing bounds and checks the range is ordered
    pub fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), CliError> {
        let (start, end) = fill_range(self.start, self.end, today);
        if start > end {
            return Err(CliError::InvalidRange { start, end });
        }
        Ok((start, end))
    }
}

impl FetchArgs {
    pub fn options(&self) -> FetchOptions {
        FetchOptions {
            use_cache: !self.no_cache,
            include_derived: !self.no_ai,
        }
    }
}

impl Cli {
    /// Applies flag overrides on top of file and environment configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(base) = &self.api_base {
            config.api_base = base.clone();
        }
        for (series, frequency) in &self.frequencies {
            config.frequencies.insert(series.clone(), *frequency);
        }
        if let Command::Watch(WatchArgs {
            interval: Some(secs),
            ..
        }) = &self.command
        {
            config.refresh_interval_secs = *secs;
        }
    }
}

/// Falls back to the dashboard series when none were named
pub fn series_or_dashboard(series: &[String]) -> Vec<String> {
    if series.is_empty() {
        crate::data::dashboard_series()
            .into_iter()
            .map(String::from)
            .collect()
    } else {
        series.iter().map(|s| s.trim().to_lowercase()).collect()
    }
}
