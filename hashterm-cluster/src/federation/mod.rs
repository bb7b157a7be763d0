//! Scatter/gather execution of hashed-terms facets
//!
//! ```text
//! Request → [Shard 1, Shard 2, ...] → Reducer → Resolve via owners → Response
//!                    ↓
//!        Parallel collection, bounded and timed out
//!                    ↓
//!        Partial results on failure
//! ```

mod status;

pub use status::{ShardFailure, ShardStatus};

use crate::config::FederationConfig;
use crate::error::{ClusterError, Result};
use crate::metrics;
use crate::shard::FacetShard;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hashterm::config::FacetConfig;
use hashterm::facet::{
    FacetRequest, FacetResponse, HashedTermsReducer, ParsedFacetRequest, Reducer,
    ShardFacetResult, TermOwner, TermResolver,
};
use hashterm::TermHash;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Federated facet results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedFacet {
    pub response: FacetResponse,
    pub shard_status: ShardStatus,
    /// Whether some shards contributed nothing
    pub is_partial: bool,
    pub latency_ms: u64,
}

/// Federated facet executor
pub struct FacetFederation {
    shards: Vec<Arc<dyn FacetShard>>,
    config: FederationConfig,
    facet_config: FacetConfig,
    semaphore: Arc<Semaphore>,
}

impl FacetFederation {
    pub fn new(shards: Vec<Arc<dyn FacetShard>>, config: FederationConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_shards.max(1)));
        Self {
            shards,
            config,
            facet_config: FacetConfig::default(),
            semaphore,
        }
    }

    pub fn with_facet_config(mut self, facet_config: FacetConfig) -> Self {
        self.facet_config = facet_config;
        self
    }

    pub fn shards(&self) -> &[Arc<dyn FacetShard>] {
        &self.shards
    }

    /// Run `request` on every shard, reduce what came back and resolve the
    /// selected hashes through their owning shards.
    pub async fn facet(&self, request: &FacetRequest) -> Result<FederatedFacet> {
        let start = Instant::now();
        let result = self.execute(request, start).await;
        if let Err(e) = &result {
            metrics::record_federation_error(&request.field, e.error_type());
        }
        result
    }

    async fn execute(&self, request: &FacetRequest, start: Instant) -> Result<FederatedFacet> {
        let parsed = request.parse(&self.facet_config)?;

        if self.shards.is_empty() {
            let reduced = HashedTermsReducer::new(parsed, 0).reduce();
            return Ok(FederatedFacet {
                response: reduced.into_response(),
                shard_status: ShardStatus::new(0),
                is_partial: false,
                latency_ms: start.elapsed().as_millis() as u64,
            });
        }

        let (partials, shard_status) = self.scatter_gather(&parsed).await?;
        self.check_status(&shard_status)?;

        let mut reducer = HashedTermsReducer::new(parsed.clone(), self.shards.len());
        for partial in partials {
            reducer.push(partial);
        }
        let reduced = reducer.reduce();

        let resolver = ShardResolver {
            shards: self
                .shards
                .iter()
                .map(|shard| (shard.shard_id().to_string(), Arc::clone(shard)))
                .collect(),
            field: parsed.field.clone(),
            script: parsed.output_script.clone(),
            semaphore: Arc::clone(&self.semaphore),
        };
        let response = reduced
            .resolve_within(
                Some(&resolver as &dyn TermResolver),
                self.config.max_concurrent_shards,
                Some(self.config.shard_timeout()),
            )
            .await?;

        let elapsed = start.elapsed();
        let is_partial = !shard_status.all_succeeded();
        if is_partial {
            warn!(
                "Federated facet '{}' returned partial results: {}/{} shards failed",
                parsed.field, shard_status.failed, shard_status.total
            );
        }
        metrics::record_federated_facet(
            &parsed.field,
            elapsed,
            self.shards.len(),
            shard_status.failed as usize,
        );

        Ok(FederatedFacet {
            response,
            shard_status,
            is_partial,
            latency_ms: elapsed.as_millis() as u64,
        })
    }

    fn check_status(&self, status: &ShardStatus) -> Result<()> {
        if status.successful == 0 {
            return Err(ClusterError::AllShardsFailed(status.total as usize));
        }
        if !self.config.allow_partial_results && !status.all_succeeded() {
            if status.timed_out() > 0 {
                return Err(ClusterError::Timeout(format!(
                    "{} shard(s) did not answer within {}ms",
                    status.timed_out(),
                    self.config.shard_timeout_ms
                )));
            }
            if let Some(failure) = status.failures.first() {
                return Err(ClusterError::Shard {
                    shard_id: failure.shard_id.clone(),
                    reason: failure.reason.clone(),
                    retryable: failure.retryable,
                });
            }
        }
        if !status.has_minimum(self.config.min_successful_shards) {
            return Err(ClusterError::InsufficientShards {
                successful: status.successful as usize,
                required: self.config.min_successful_shards,
            });
        }
        Ok(())
    }

    /// Scatter the request to every shard and gather partials until all
    /// answered or the deadline passed. Partials come back in shard order.
    async fn scatter_gather(
        &self,
        request: &ParsedFacetRequest,
    ) -> Result<(Vec<ShardFacetResult>, ShardStatus)> {
        let mut status = ShardStatus::new(self.shards.len() as u32);
        let retries = self.config.shard_retries;

        let mut pending: FuturesUnordered<_> = self
            .shards
            .iter()
            .enumerate()
            .map(|(idx, shard)| {
                let shard = Arc::clone(shard);
                let semaphore = Arc::clone(&self.semaphore);
                let request = request.clone();

                async move {
                    let _permit = semaphore.acquire().await.ok();

                    let start = Instant::now();
                    let (result, attempts) =
                        collect_with_retry(shard.as_ref(), &request, retries).await;
                    metrics::record_shard_duration(shard.shard_id(), start.elapsed());
                    (idx, result, attempts)
                }
            })
            .collect();

        let mut partials: Vec<Option<ShardFacetResult>> = vec![None; self.shards.len()];
        let mut answered = vec![false; self.shards.len()];
        let deadline = tokio::time::sleep(self.config.shard_timeout());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = pending.next() => {
                    let Some((idx, result, attempts)) = next else {
                        break;
                    };
                    answered[idx] = true;
                    let shard_id = self.shards[idx].shard_id();

                    match result {
                        Ok(partial) => {
                            debug!(
                                "Shard {} returned {} candidates ({} matched, {} missing)",
                                shard_id,
                                partial.entries.len(),
                                partial.matched_count,
                                partial.missing_count
                            );
                            status.record_success();
                            partials[idx] = Some(partial);
                        }
                        Err(ClusterError::InvalidRequest(msg)) => {
                            return Err(ClusterError::InvalidRequest(msg));
                        }
                        Err(e) => {
                            warn!(
                        "Shard {} failed after {} attempt(s): {}",
                        shard_id, attempts, e
                    );
                            metrics::record_shard_failure(shard_id, e.error_type());
                            status.record_failure(ShardFailure {
                                shard_id: shard_id.to_string(),
                                reason: e.to_string(),
                                is_timeout: matches!(e, ClusterError::Timeout(_)),
                                retryable: e.is_retryable(),
                                attempts,
                            });
                        }
                    }
                }
                _ = &mut deadline => {
                    for (idx, _) in answered.iter().enumerate().filter(|(_, done)| !**done) {
                        let shard_id = self.shards[idx].shard_id();
                        warn!(
                            "Shard {} did not answer within {}ms",
                            shard_id, self.config.shard_timeout_ms
                        );
                        metrics::record_shard_failure(shard_id, "timeout");
                        status.record_failure(ShardFailure {
                            shard_id: shard_id.to_string(),
                            reason: format!(
                                "no answer within {}ms",
                                self.config.shard_timeout_ms
                            ),
                            is_timeout: true,
                            retryable: true,
                            attempts: 1,
                        });
                    }
                    break;
                }
            }
        }

        Ok((partials.into_iter().flatten().collect(), status))
    }
}

async fn collect_with_retry(
    shard: &dyn FacetShard,
    request: &ParsedFacetRequest,
    retries: u32,
) -> (Result<ShardFacetResult>, u32) {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match shard.collect(request).await {
            Err(e) if e.is_retryable() && attempts <= retries => {
                debug!(
                    "Shard {} attempt {} failed, retrying: {}",
                    shard.shard_id(),
                    attempts,
                    e
                );
                metrics::record_shard_retry(shard.shard_id());
            }
            result => return (result, attempts),
        }
    }
}

/// Resolves selected hashes by asking the shard that owns each one. Calls
/// share the federation's shard permits; the reducer bounds the phase with
/// the shard timeout.
struct ShardResolver {
    shards: HashMap<String, Arc<dyn FacetShard>>,
    field: String,
    script: Option<String>,
    semaphore: Arc<Semaphore>,
}

#[async_trait]
impl TermResolver for ShardResolver {
    async fn resolve(&self, owner: &TermOwner, hash: TermHash) -> hashterm::Result<Option<String>> {
        let Some(shard) = self.shards.get(&owner.shard_id) else {
            return Err(hashterm::Error::Storage(format!(
                "unknown shard '{}'",
                owner.shard_id
            )));
        };

        let _permit = self.semaphore.acquire().await.ok();
        match shard
            .resolve(owner, &self.field, hash, self.script.as_deref())
            .await
        {
            Ok(term) => Ok(term),
            Err(ClusterError::InvalidRequest(msg)) => Err(hashterm::Error::InvalidRequest(msg)),
            Err(e) => Err(hashterm::Error::Storage(e.to_string())),
        }
    }
}
