use super::request::ParsedFacetRequest;
use super::resolve::TermResolver;
use super::types::{rank, FacetEntry, FacetResponse, ShardFacetResult, TermEntry, TermOwner};
use super::Reducer;
use crate::hash::TermHash;
use crate::Result;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Coordinator side of a hashed-terms facet.
///
/// Partials are pushed as shards answer; nothing is merged until
/// [`Reducer::reduce`] consumes the reducer, which the caller may do with a
/// subset of shards when its timeout policy allows.
pub struct HashedTermsReducer {
    request: ParsedFacetRequest,
    expected_shards: usize,
    partials: Vec<ShardFacetResult>,
}

impl HashedTermsReducer {
    pub fn new(request: ParsedFacetRequest, expected_shards: usize) -> Self {
        Self {
            request,
            expected_shards,
            partials: Vec::with_capacity(expected_shards),
        }
    }

    pub fn received(&self) -> usize {
        self.partials.len()
    }

    pub fn pending_shards(&self) -> usize {
        self.expected_shards.saturating_sub(self.partials.len())
    }

    pub fn is_complete(&self) -> bool {
        self.pending_shards() == 0
    }
}

/// A merged term and the document that can name it.
#[derive(Debug, Clone)]
pub struct SelectedTerm {
    pub entry: FacetEntry,
    pub owner: Option<TermOwner>,
}

/// Merged, filtered and ranked result still lacking display strings.
#[derive(Debug, Clone)]
pub struct ReducedFacet {
    pub field: String,
    pub terms: Vec<SelectedTerm>,
    pub missing_count: u64,
    pub total_count: u64,
    pub other_count: u64,
    pub shards: usize,
}

impl Reducer for HashedTermsReducer {
    type Partial = ShardFacetResult;
    type Output = ReducedFacet;

    fn push(&mut self, partial: ShardFacetResult) {
        if partial.field != self.request.field {
            warn!(
                "Shard {} answered for field '{}' while reducing '{}'; ignoring",
                partial.shard_id, partial.field, self.request.field
            );
            return;
        }
        self.partials.push(partial);
    }

    fn reduce(self) -> ReducedFacet {
        let start = Instant::now();
        let shards = self.partials.len();
        let mut merged: HashMap<TermHash, (u64, Option<TermOwner>)> = HashMap::new();
        let mut missing_count = 0;
        let mut total_count = 0;

        for partial in self.partials {
            missing_count += partial.missing_count;
            total_count += partial.matched_count;
            for entry in partial.entries {
                let slot = merged.entry(entry.term_hash).or_insert((0, None));
                slot.0 += entry.count;
                if slot.1.is_none() {
                    slot.1 = Some(TermOwner {
                        shard_id: partial.shard_id.clone(),
                        address: entry.owner,
                    });
                }
            }
        }

        let mut ranked: Vec<(TermHash, u64, Option<TermOwner>)> = merged
            .into_iter()
            .filter(|(hash, _)| !self.request.is_excluded(*hash))
            .map(|(hash, (count, owner))| (hash, count, owner))
            .collect();
        ranked.sort_unstable_by(|a, b| rank(a.1, a.0, b.1, b.0));

        let other_count = ranked.iter().skip(self.request.size).map(|t| t.1).sum();
        ranked.truncate(self.request.size);

        let terms = ranked
            .into_iter()
            .map(|(term_hash, count, owner)| SelectedTerm {
                entry: FacetEntry {
                    term_hash,
                    count,
                    term: None,
                },
                owner,
            })
            .collect::<Vec<_>>();

        crate::metrics::record_reduce(&self.request.field, shards, start.elapsed());
        debug!(
            "Reduced facet '{}' from {} shard(s): {} entries, missing={}",
            self.request.field,
            shards,
            terms.len(),
            missing_count
        );

        ReducedFacet {
            field: self.request.field,
            terms,
            missing_count,
            total_count,
            other_count,
            shards,
        }
    }
}

/// In-flight lookups when the caller sets no bound.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 16;

impl ReducedFacet {
    /// Attach display strings. Without a resolver, or when the owner can no
    /// longer produce the value, the decimal hash is shown.
    pub async fn resolve(self, resolver: Option<&dyn TermResolver>) -> Result<FacetResponse> {
        self.resolve_within(resolver, DEFAULT_RESOLVE_CONCURRENCY, None).await
    }

    /// Like [`ReducedFacet::resolve`], with at most `concurrency` lookups in
    /// flight. Terms still unresolved when `deadline` passes keep their hash.
    pub async fn resolve_within(
        mut self,
        resolver: Option<&dyn TermResolver>,
        concurrency: usize,
        deadline: Option<Duration>,
    ) -> Result<FacetResponse> {
        let Some(resolver) = resolver else {
            return Ok(self.into_response());
        };

        let start = Instant::now();
        let lookups: Vec<(usize, TermOwner, TermHash)> = self
            .terms
            .iter()
            .enumerate()
            .filter_map(|(idx, t)| t.owner.clone().map(|owner| (idx, owner, t.entry.term_hash)))
            .collect();
        let requested = lookups.len();

        let mut pending = stream::iter(lookups)
            .map(|(idx, owner, hash)| async move {
                let result = resolver.resolve(&owner, hash).await;
                (idx, owner, hash, result)
            })
            .buffer_unordered(concurrency.max(1));

        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut answered = 0;
        loop {
            tokio::select! {
                next = pending.next() => {
                    let Some((idx, owner, hash, result)) = next else {
                        break;
                    };
                    answered += 1;
                    match result {
                        Ok(term) => self.terms[idx].entry.term = term,
                        Err(e) if e.is_retryable() => {
                            warn!(
                                "Could not resolve term {} on shard {}: {}",
                                hash, owner.shard_id, e
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }
                _ = &mut expired => {
                    warn!(
                        "Resolving facet '{}' passed its deadline; {} of {} term(s) kept as hashes",
                        self.field,
                        requested - answered,
                        requested
                    );
                    break;
                }
            }
        }

        debug!(
            "Resolved {}/{} term(s) of facet '{}' in {:?}",
            answered,
            requested,
            self.field,
            start.elapsed()
        );
        Ok(self.into_response())
    }

    /// Entries as they stand: resolved terms, decimal hashes otherwise.
    pub fn into_response(self) -> FacetResponse {
        FacetResponse {
            field: self.field,
            entries: self
                .terms
                .into_iter()
                .map(|t| TermEntry {
                    term: t
                        .entry
                        .term
                        .unwrap_or_else(|| t.entry.term_hash.to_string()),
                    count: t.entry.count,
                })
                .collect(),
            missing_count: self.missing_count,
            total_count: self.total_count,
            other_count: self.other_count,
        }
    }
}
