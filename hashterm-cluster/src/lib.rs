//! hashterm cluster - hashed-terms facets over many shards
//!
//! # Architecture
//!
//! - **Shard**: `FacetShard` runs the collector half of a facet and resolves
//!   display strings from its own documents; `LocalShard` wraps an in-process
//!   shard context
//! - **Federation**: bounded scatter/gather with a deadline, retries for
//!   retryable shard errors and partial results when shards fail

pub mod config;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod shard;

pub use config::FederationConfig;
pub use error::{ClusterError, Result};
pub use federation::{FacetFederation, FederatedFacet, ShardFailure, ShardStatus};
pub use shard::{FacetShard, LocalShard};
