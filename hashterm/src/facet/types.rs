use crate::hash::TermHash;
use crate::source::DocAddress;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One shard-local candidate. `owner` is the first matched document seen
/// carrying the hash; it lets the coordinator ask for a display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    pub term_hash: TermHash,
    pub count: u64,
    pub owner: DocAddress,
}

/// Finalized output of one shard's collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardFacetResult {
    pub shard_id: String,
    pub field: String,
    /// Ranked, at most `fetch_size` long
    pub entries: Vec<ShardEntry>,
    pub missing_count: u64,
    pub matched_count: u64,
    pub collisions: u64,
}

/// Which shard document backs a merged entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermOwner {
    pub shard_id: String,
    pub address: DocAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetEntry {
    pub term_hash: TermHash,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetResponse {
    pub field: String,
    pub entries: Vec<TermEntry>,
    pub missing_count: u64,
    /// Matched documents over every shard that answered
    pub total_count: u64,
    /// Summed counts of merged candidates that did not make the cut
    pub other_count: u64,
}

/// Count descending, then hash ascending.
pub(crate) fn rank(a_count: u64, a_hash: TermHash, b_count: u64, b_hash: TermHash) -> Ordering {
    b_count.cmp(&a_count).then(a_hash.cmp(&b_hash))
}
