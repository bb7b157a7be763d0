use super::collector::HashedTermsCollector;
use super::request::ParsedFacetRequest;
use super::resolve::resolve_in_segment;
use super::script::OutputScript;
use super::types::ShardFacetResult;
use super::Collector;
use crate::field::{FieldStoreCache, FieldValueStore};
use crate::hash::TermHash;
use crate::source::{DocAddress, DocId, SegmentSource};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Documents a query matched within one shard.
#[derive(Debug, Clone)]
pub enum MatchSet {
    /// Every live document of every segment
    All,
    /// Matched ids per segment, indexed by segment ordinal
    PerSegment(Vec<Vec<DocId>>),
}

impl MatchSet {
    fn docs_for<'a>(
        &'a self,
        ord: usize,
        segment: &'a dyn SegmentSource,
    ) -> Box<dyn Iterator<Item = DocId> + 'a> {
        match self {
            MatchSet::All => {
                Box::new((0..segment.max_doc()).filter(move |doc| segment.is_alive(*doc)))
            }
            MatchSet::PerSegment(per_segment) => match per_segment.get(ord) {
                Some(docs) => Box::new(docs.iter().copied()),
                None => Box::new(std::iter::empty()),
            },
        }
    }
}

/// The segments of one shard and the store cache they share.
pub struct ShardContext {
    shard_id: String,
    segments: Vec<Arc<dyn SegmentSource>>,
    cache: Arc<FieldStoreCache>,
}

impl ShardContext {
    pub fn new(
        shard_id: impl Into<String>,
        segments: Vec<Arc<dyn SegmentSource>>,
        cache: Arc<FieldStoreCache>,
    ) -> Self {
        Self {
            shard_id: shard_id.into(),
            segments,
            cache,
        }
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    pub fn segments(&self) -> &[Arc<dyn SegmentSource>] {
        &self.segments
    }

    pub fn cache(&self) -> &Arc<FieldStoreCache> {
        &self.cache
    }

    /// Build (or reuse) the field's stores, then count the matched documents.
    pub async fn collect(
        &self,
        request: &ParsedFacetRequest,
        matches: MatchSet,
    ) -> Result<ShardFacetResult> {
        let start = Instant::now();

        let mut stores: Vec<Arc<FieldValueStore>> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let store = self
                .cache
                .get_or_build(Arc::clone(segment), &request.field)
                .await?;
            stores.push(store);
        }

        let shard_id = self.shard_id.clone();
        let segments = self.segments.clone();
        let request = request.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut collector = HashedTermsCollector::new(shard_id, &request);
            for (ord, (segment, store)) in segments.iter().zip(stores).enumerate() {
                collector.set_segment(ord as u32, store);
                for doc in matches.docs_for(ord, segment.as_ref()) {
                    collector.collect(doc);
                }
            }
            collector.finalize()
        })
        .await
        .map_err(|e| Error::Storage(format!("facet collection task failed: {}", e)))?;

        crate::metrics::record_collect(&result.field, result.matched_count, start.elapsed());
        if result.collisions > 0 {
            warn!(
                "Field '{}' on shard {} has {} hash collision(s); counts may merge distinct terms",
                result.field, result.shard_id, result.collisions
            );
        }
        debug!(
            "Collected facet '{}' on shard {}: {} matched, {} candidates in {:?}",
            result.field,
            result.shard_id,
            result.matched_count,
            result.entries.len(),
            start.elapsed()
        );
        Ok(result)
    }

    /// Display string for `hash` from the document at `address`. Stored
    /// values are read on the blocking pool.
    pub async fn resolve(
        &self,
        address: DocAddress,
        field: &str,
        hash: TermHash,
        script: Option<Arc<dyn OutputScript>>,
    ) -> Result<Option<String>> {
        let Some(segment) = self.segments.get(address.segment as usize) else {
            debug!(
                "Shard {} has no segment {}; term {} stays unresolved",
                self.shard_id, address.segment, hash
            );
            return Ok(None);
        };

        let segment = Arc::clone(segment);
        let shard_id = self.shard_id.clone();
        let field = field.to_string();
        tokio::task::spawn_blocking(move || {
            resolve_in_segment(
                segment.as_ref(),
                &shard_id,
                address,
                &field,
                hash,
                script.as_deref(),
            )
        })
        .await
        .map_err(|e| Error::Storage(format!("term resolution task failed: {}", e)))?
    }
}
