//! Federation configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FederationConfig {
    /// Reduce whatever shards answered when others fail or time out
    #[serde(default = "default_allow_partial")]
    pub allow_partial_results: bool,

    /// How long to wait for shard partials
    #[serde(default = "default_shard_timeout")]
    pub shard_timeout_ms: u64,

    /// Minimum number of successful shards required
    #[serde(default = "default_min_shards")]
    pub min_successful_shards: usize,

    /// Maximum concurrent shard requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_shards: usize,

    /// Extra attempts for a shard failing with a retryable error
    #[serde(default = "default_retries")]
    pub shard_retries: u32,
}

fn default_allow_partial() -> bool {
    true
}

fn default_shard_timeout() -> u64 {
    5000
}

fn default_min_shards() -> usize {
    1
}

fn default_max_concurrent() -> usize {
    10
}

fn default_retries() -> u32 {
    1
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            allow_partial_results: default_allow_partial(),
            shard_timeout_ms: default_shard_timeout(),
            min_successful_shards: default_min_shards(),
            max_concurrent_shards: default_max_concurrent(),
            shard_retries: default_retries(),
        }
    }
}

impl FederationConfig {
    pub fn shard_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_timeout_ms)
    }
}
