//! Scraper configuration.
//!
//! The CLI resolves flags and environment variables once into a
//! [`ScraperConfig`]; components take it (or pieces of it) explicitly.
//! There are no process-global clients or lazily-read env vars elsewhere.

use crate::retry::RetryPolicy;

/// Default public TRON JSON-RPC endpoint.
pub const DEFAULT_NODE_URL: &str = "https://tron-evm-rpc.publicnode.com";

/// Default balance-scan worker pool size.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Runtime configuration for the scraper core.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    pub node_url: String,
    pub retry: RetryPolicy,
    pub concurrency: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            node_url: String::from(DEFAULT_NODE_URL),
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ScraperConfig::default();
        assert_eq!(config.node_url, DEFAULT_NODE_URL);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
