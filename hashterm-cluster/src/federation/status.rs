use serde::{Deserialize, Serialize};

/// Status of shard execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardStatus {
    /// Total number of shards queried
    pub total: u32,
    /// Number of successful shards
    pub successful: u32,
    /// Number of failed shards
    pub failed: u32,
    /// Details of failures
    pub failures: Vec<ShardFailure>,
}

impl ShardStatus {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            successful: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.successful += 1;
    }

    pub fn record_failure(&mut self, failure: ShardFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Check if at least min_shards succeeded
    pub fn has_minimum(&self, min_shards: usize) -> bool {
        self.successful as usize >= min_shards
    }

    pub fn timed_out(&self) -> usize {
        self.failures.iter().filter(|f| f.is_timeout).count()
    }
}

/// Details of a shard failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard_id: String,
    pub reason: String,
    /// Whether this was a timeout
    pub is_timeout: bool,
    /// Whether the last error was worth retrying
    #[serde(default)]
    pub retryable: bool,
    /// Attempts made before giving up
    pub attempts: u32,
}
