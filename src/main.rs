//! fredwatch - fetch and watch FRED macro series from the dashboard API
//!
//! A thin command-line front end over the library: it loads configuration,
//! opens the persistent response cache, and runs one subcommand.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing::{debug, info, warn};

use fredwatch::cache::{FileStore, MemoryStore, ResponseCache};
use fredwatch::cli::{
    series_or_dashboard, CacheAction, Cli, Command, FetchArgs, InsightsArgs, WatchArgs,
};
use fredwatch::config::Config;
use fredwatch::dashboard::{load_dashboard, DashboardSnapshot};
use fredwatch::data::{FetchOptions, HttpTransport, SeriesClient};
use fredwatch::refresh::{RefreshHandle, RefreshMessage, RefreshTarget};
use fredwatch::{logging, report};

type Client = SeriesClient<HttpTransport>;
type BoxError = Box<dyn std::error::Error>;

/// Opens the response cache, falling back to memory when no cache directory exists
fn open_cache(cli: &Cli) -> ResponseCache {
    if cli.no_persist {
        return ResponseCache::new(MemoryStore::new());
    }
    let store = match &cli.cache_dir {
        Some(dir) => Some(FileStore::with_dir(dir.clone())),
        None => FileStore::new(),
    };
    match store {
        Some(store) => {
            debug!(dir = %store.dir().display(), "using persistent cache");
            ResponseCache::new(store)
        }
        None => {
            warn!("no cache directory available, caching in memory only");
            ResponseCache::new(MemoryStore::new())
        }
    }
}

fn build_client(config: &Config, cache: Arc<ResponseCache>) -> Result<Client, BoxError> {
    let transport = HttpTransport::new(config.api_base.clone(), config.request_timeout())?;
    Ok(SeriesClient::new(transport, cache)
        .with_retry_policy(config.retry_policy())
        .with_frequencies(config.frequencies.clone()))
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_snapshot(snapshot: &DashboardSnapshot, json: bool) -> Result<(), BoxError> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else {
        print_lines(report::build_snapshot_lines(snapshot));
    }
    Ok(())
}

fn run_cache(action: CacheAction, cache: &ResponseCache) -> Result<(), BoxError> {
    match action {
        CacheAction::Stats => print_lines(report::build_stats_lines(&cache.stats())),
        CacheAction::Clear => {
            cache.clear();
            println!("Cache cleared");
        }
        CacheAction::Cleanup => {
            let removed = cache.cleanup();
            println!("Removed {} expired entries", removed);
        }
    }
    Ok(())
}

async fn run_fetch(args: &FetchArgs, client: &Client) -> Result<(), BoxError> {
    let (start, end) = args.range.resolve(Local::now().date_naive())?;
    let series = series_or_dashboard(&args.series);

    let snapshot = load_dashboard(client, &series, start, end, args.options()).await;
    print_snapshot(&snapshot, args.json)?;

    if snapshot.loaded_count() == 0 {
        return Err("no series data could be loaded".into());
    }
    Ok(())
}

async fn run_insights(args: &InsightsArgs, client: &Client) -> Result<(), BoxError> {
    let (start, end) = args.range.resolve(Local::now().date_naive())?;
    match client.fetch_overall_insight(start, end, !args.no_cache).await {
        Some(insight) => {
            print_lines(report::build_insight_lines(&insight));
            Ok(())
        }
        None => Err("insight unavailable".into()),
    }
}

async fn run_watch(args: &WatchArgs, config: &Config, client: Client) -> Result<(), BoxError> {
    let (start, end) = args.range.resolve(Local::now().date_naive())?;
    let target = RefreshTarget {
        series: series_or_dashboard(&args.series),
        start: args.range.start,
        end: args.range.end,
        options: FetchOptions::default(),
    };
    let client = Arc::new(client);

    let snapshot =
        load_dashboard(client.as_ref(), &target.series, start, end, target.options).await;
    print_snapshot(&snapshot, false)?;

    let mut handle =
        RefreshHandle::spawn(config.refresh_config(), Arc::clone(&client), target);
    info!(interval_secs = config.refresh_interval_secs, "watching");

    loop {
        tokio::select! {
            message = handle.recv() => match message {
                Some(RefreshMessage::RefreshStarted) => debug!("refresh started"),
                Some(RefreshMessage::SnapshotReady(snapshot)) => {
                    println!();
                    print_snapshot(&snapshot, false)?;
                }
                Some(RefreshMessage::CacheSwept(removed)) => {
                    if removed > 0 {
                        info!(removed, "expired cache entries removed");
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown();
                break;
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let mut config =
        Config::load(cli.config.as_deref())?.with_env_overrides(|key| std::env::var(key).ok());
    cli.apply_overrides(&mut config);
    debug!(api_base = %config.api_base, "configuration loaded");

    let cache = Arc::new(open_cache(&cli));

    match &cli.command {
        Command::Cache { action } => run_cache(*action, &cache),
        Command::Health => {
            let client = build_client(&config, cache)?;
            if client.health().await {
                println!("API is up at {}", config.api_base);
                Ok(())
            } else {
                Err(format!("API did not respond at {}", config.api_base).into())
            }
        }
        Command::Fetch(args) => run_fetch(args, &build_client(&config, cache)?).await,
        Command::Insights(args) => run_insights(args, &build_client(&config, cache)?).await,
        Command::Watch(args) => run_watch(args, &config, build_client(&config, cache)?).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
