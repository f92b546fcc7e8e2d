//! CLI argument definitions for sunscan.
//!
//! Every connection/retry knob has an environment-variable fallback so the
//! binary drops into the same deployment wrapper the scraper always ran
//! under; flags win over the environment.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `metadata` | Scrape token metadata for contracts seen in `transfers` |
//! | `balances` | Scrape `balanceOf` for every `(account, contract)` pair |
//! | `sql` | Query the local DuckDB warehouse |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use sunscan_core::config::{ScraperConfig, DEFAULT_CONCURRENCY, DEFAULT_NODE_URL};
use sunscan_core::RetryPolicy;

/// TRON token metadata and balance scraper backed by a DuckDB warehouse.
#[derive(Debug, Parser)]
#[command(
    name = "sunscan",
    version,
    about = "TRON token metadata and balance scraper"
)]
pub struct Cli {
    /// TRON JSON-RPC endpoint.
    #[arg(long, global = true, env = "NODE_URL", default_value = DEFAULT_NODE_URL)]
    pub node_url: String,

    /// Warehouse database file (defaults to ~/.sunscan/warehouse.duckdb).
    #[arg(long, global = true, env = "SUNSCAN_DB")]
    pub db_path: Option<PathBuf>,

    /// Maximum attempts per contract call.
    #[arg(long, global = true, env = "MAX_RETRIES", default_value_t = 3)]
    pub retries: u32,

    /// Initial backoff delay in milliseconds.
    #[arg(long, global = true, env = "BASE_DELAY_MS", default_value_t = 400)]
    pub base_delay_ms: u64,

    /// Per-attempt request timeout in milliseconds.
    #[arg(long, global = true, env = "TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// Lower jitter factor bound.
    #[arg(long, global = true, env = "JITTER_MIN", default_value_t = 0.7)]
    pub jitter_min: f64,

    /// Upper jitter factor bound.
    #[arg(long, global = true, env = "JITTER_MAX", default_value_t = 1.3)]
    pub jitter_max: f64,

    /// Cap on any single backoff delay in milliseconds.
    #[arg(long, global = true, env = "MAX_DELAY_MS", default_value_t = 30_000)]
    pub max_delay_ms: u64,

    /// Balance-scan worker pool size (1 = strictly sequential).
    #[arg(long, global = true, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Collapse the connection/retry flags into the core configuration
    /// value the scanner is built from. This is the single resolution
    /// point for all scraper knobs; components never read the environment
    /// themselves.
    pub fn scraper_config(&self) -> ScraperConfig {
        ScraperConfig {
            node_url: self.node_url.clone(),
            retry: RetryPolicy {
                retries: self.retries,
                base_delay_ms: self.base_delay_ms,
                timeout_ms: self.timeout_ms,
                jitter_min: self.jitter_min,
                jitter_max: self.jitter_max,
                max_delay_ms: self.max_delay_ms,
            },
            concurrency: self.concurrency,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch decimals/symbol/name for every contract not yet materialized.
    Metadata,
    /// Fetch balanceOf for every (account, contract) pair from transfers.
    Balances,
    /// Run an ad-hoc SQL query against the warehouse.
    Sql(SqlArgs),
}

#[derive(Debug, Args)]
pub struct SqlArgs {
    /// The SQL query to execute.
    pub query: String,

    /// Maximum number of rows to return.
    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    /// Query timeout in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,

    /// Allow write statements (read-only by default).
    #[arg(long, default_value_t = false)]
    pub write: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_the_scraper_config() {
        let cli = Cli::try_parse_from([
            "sunscan",
            "--retries",
            "5",
            "--base-delay-ms",
            "100",
            "--concurrency",
            "4",
            "metadata",
        ])
        .expect("valid arguments");

        let config = cli.scraper_config();
        assert_eq!(config.retry.retries, 5);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn defaults_follow_the_core_configuration() {
        let cli = Cli::try_parse_from(["sunscan", "balances"]).expect("valid arguments");
        let config = cli.scraper_config();
        assert_eq!(config.retry, sunscan_core::RetryPolicy::default());
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }
}
