//! Diagnostic logging setup
//!
//! Logs go to stderr so stdout stays clean for reports and `--json` output.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive
pub const LOG_ENV: &str = "FREDWATCH_LOG";

const DEFAULT_DIRECTIVE: &str = "fredwatch=warn";
const VERBOSE_DIRECTIVE: &str = "fredwatch=debug";

/// Picks the filter: `--verbose` wins, then `FREDWATCH_LOG`, then warnings only
pub fn build_filter(verbose: bool, env_directive: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_DIRECTIVE);
    }
    env_directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the global subscriber; a second call is a no-op
pub fn init(verbose: bool) {
    let env_directive = std::env::var(LOG_ENV).ok();
    let filter = build_filter(verbose, env_directive.as_deref());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
