//! Federation error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while running a facet across shards
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ClusterError {
    #[error("Shard {shard_id} failed: {reason}")]
    Shard {
        shard_id: String,
        reason: String,
        retryable: bool,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("All {0} shard(s) failed")]
    AllShardsFailed(usize),

    #[error("Insufficient shards: {successful} successful, {required} required")]
    InsufficientShards { successful: usize, required: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Facet error: {0}")]
    Facet(String),
}

impl ClusterError {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            ClusterError::Shard { .. } => "shard",
            ClusterError::Timeout(_) => "timeout",
            ClusterError::AllShardsFailed(_) => "all_shards_failed",
            ClusterError::InsufficientShards { .. } => "insufficient_shards",
            ClusterError::InvalidRequest(_) => "invalid_request",
            ClusterError::Facet(_) => "facet",
        }
    }

    /// Worth asking the same shard again
    pub fn is_retryable(&self) -> bool {
        match self {
            ClusterError::Shard { retryable, .. } => *retryable,
            ClusterError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Wrap an engine error raised while a shard served a request.
    pub fn from_shard(shard_id: &str, err: hashterm::Error) -> Self {
        match err {
            hashterm::Error::InvalidRequest(_)
            | hashterm::Error::UnknownScript(_)
            | hashterm::Error::UnsupportedFieldType { .. } => {
                ClusterError::InvalidRequest(err.to_string())
            }
            other => ClusterError::Shard {
                shard_id: shard_id.to_string(),
                retryable: other.is_retryable(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<hashterm::Error> for ClusterError {
    fn from(err: hashterm::Error) -> Self {
        match err {
            hashterm::Error::InvalidRequest(_)
            | hashterm::Error::UnknownScript(_)
            | hashterm::Error::UnsupportedFieldType { .. } => {
                ClusterError::InvalidRequest(err.to_string())
            }
            other => ClusterError::Facet(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
