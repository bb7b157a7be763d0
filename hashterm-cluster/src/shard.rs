//! Shards as seen by the coordinator

use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use hashterm::facet::{
    MatchSet, ParsedFacetRequest, ScriptRegistry, ShardContext, ShardFacetResult, TermOwner,
};
use hashterm::TermHash;
use std::sync::Arc;

/// One shard able to run the collector half of a facet and to name a hash
/// from one of its documents.
#[async_trait]
pub trait FacetShard: Send + Sync {
    fn shard_id(&self) -> &str;

    async fn collect(&self, request: &ParsedFacetRequest) -> Result<ShardFacetResult>;

    /// Display string for `hash` from the owner document, rendered by the
    /// named output script when one is given.
    async fn resolve(
        &self,
        owner: &TermOwner,
        field: &str,
        hash: TermHash,
        script: Option<&str>,
    ) -> Result<Option<String>>;
}

/// Shard living in this process.
pub struct LocalShard {
    context: Arc<ShardContext>,
    matches: MatchSet,
    scripts: ScriptRegistry,
}

impl LocalShard {
    /// Facet over every live document, rendering with `scripts`.
    pub fn new(context: Arc<ShardContext>, scripts: ScriptRegistry) -> Self {
        Self {
            context,
            matches: MatchSet::All,
            scripts,
        }
    }

    pub fn with_matches(mut self, matches: MatchSet) -> Self {
        self.matches = matches;
        self
    }

    pub fn context(&self) -> &Arc<ShardContext> {
        &self.context
    }
}

#[async_trait]
impl FacetShard for LocalShard {
    fn shard_id(&self) -> &str {
        self.context.shard_id()
    }

    async fn collect(&self, request: &ParsedFacetRequest) -> Result<ShardFacetResult> {
        request
            .validate_script(&self.scripts)
            .map_err(|e| ClusterError::from_shard(self.shard_id(), e))?;
        self.context
            .collect(request, self.matches.clone())
            .await
            .map_err(|e| ClusterError::from_shard(self.shard_id(), e))
    }

    async fn resolve(
        &self,
        owner: &TermOwner,
        field: &str,
        hash: TermHash,
        script: Option<&str>,
    ) -> Result<Option<String>> {
        let script = match script {
            Some(name) => Some(self.scripts.get(name).ok_or_else(|| {
                ClusterError::InvalidRequest(format!("Unknown output script: {}", name))
            })?),
            None => None,
        };
        self.context
            .resolve(owner.address, field, hash, script)
            .await
            .map_err(|e| ClusterError::from_shard(self.shard_id(), e))
    }
}
