//! Integration tests for CLI argument handling
//!
//! Runs the binary for paths that need no network: help, argument errors,
//! config errors and the cache maintenance commands.

use std::process::Command;
use tempfile::TempDir;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fredwatch"))
        .args(args)
        .env_remove("FREDWATCH_API_BASE")
        .env_remove("FREDWATCH_LOG")
        .output()
        .expect("Failed to execute fredwatch")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fredwatch"), "Help should mention fredwatch");
    assert!(stdout.contains("fetch"), "Help should list the fetch command");
    assert!(stdout.contains("cache"), "Help should list the cache command");
}

#[test]
fn test_missing_subcommand_fails() {
    let output = run_cli(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_date_prints_error_and_exits() {
    let output = run_cli(&["fetch", "cpi", "--start", "not-a-date", "--no-persist"]);
    assert!(!output.status.success(), "Expected invalid date to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid date"),
        "Should print error message about the date: {}",
        stderr
    );
}

#[test]
fn test_invalid_frequency_override_fails() {
    let output = run_cli(&["cache", "stats", "--no-persist", "--frequency", "gdp=hourly"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid frequency"), "{}", stderr);
}

#[test]
fn test_missing_config_file_fails() {
    let output = run_cli(&[
        "cache",
        "stats",
        "--no-persist",
        "--config",
        "/nonexistent/fredwatch.json",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config file not found"), "{}", stderr);
}

#[test]
fn test_watch_zero_interval_is_rejected() {
    let output = run_cli(&["watch", "cpi", "--interval", "0", "--no-persist"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--interval"), "{}", stderr);
}

#[test]
fn test_zero_refresh_interval_in_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, r#"{"refresh_interval_secs": 0}"#).unwrap();

    let output = run_cli(&[
        "cache",
        "stats",
        "--no-persist",
        "--config",
        path.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("refresh_interval_secs must be at least 1"), "{}", stderr);
}

#[test]
fn test_cache_stats_in_memory() {
    let output = run_cli(&["cache", "stats", "--no-persist"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Entries:  0 (0 valid, 0 expired)"), "{}", stdout);
}

#[test]
fn test_cache_clear_and_cleanup_with_cache_dir() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_str().unwrap();

    let output = run_cli(&["cache", "clear", "--cache-dir", dir]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Cache cleared"));

    let output = run_cli(&["cache", "cleanup", "--cache-dir", dir]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Removed 0 expired entries"));
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use fredwatch::cli::{parse_date_arg, CacheAction, Cli, Command};

    #[test]
    fn test_cli_parse_health() {
        let cli = Cli::parse_from(["fredwatch", "health"]);
        assert!(matches!(cli.command, Command::Health));
        assert!(!cli.no_persist);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_cache_stats() {
        let cli = Cli::parse_from(["fredwatch", "cache", "stats"]);
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheAction::Stats
            }
        ));
    }

    #[test]
    fn test_cli_parse_watch_interval() {
        let cli = Cli::parse_from(["fredwatch", "watch", "cpi", "--interval", "120"]);
        match cli.command {
            Command::Watch(args) => {
                assert_eq!(args.series, vec!["cpi"]);
                assert_eq!(args.interval, Some(120));
            }
            other => panic!("expected watch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_date_arg_invalid_returns_error() {
        assert!(parse_date_arg("2024-13-01").is_err());
    }
}
