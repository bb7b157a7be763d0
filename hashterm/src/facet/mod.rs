//! Hashed-terms facet: count the most frequent values of a string field.
//!
//! Each shard runs a [`HashedTermsCollector`] over its matched documents and
//! ships a ranked list of `(hash, count, owner)` candidates, `fetch_size`
//! long. The coordinator pushes those partials into a
//! [`HashedTermsReducer`], which sums counts per hash, drops excluded
//! hashes, ranks and cuts to `size`. Only the surviving hashes are turned
//! back into strings, by asking the owning document through a
//! [`TermResolver`].

mod collector;
mod reducer;
mod request;
mod resolve;
mod script;
mod shard;
mod types;

pub use collector::HashedTermsCollector;
pub use reducer::{HashedTermsReducer, ReducedFacet, SelectedTerm};
pub use request::{FacetRequest, ParsedFacetRequest};
pub use resolve::{resolve_in_segment, LocalTermResolver, TermResolver};
pub use script::{DocumentContext, OutputScript, ScriptRegistry};
pub use shard::{MatchSet, ShardContext};
pub use types::{FacetEntry, FacetResponse, ShardEntry, ShardFacetResult, TermEntry, TermOwner};

use crate::field::FieldValueStore;
use crate::source::DocId;
use std::sync::Arc;

/// Shard-local half of an aggregation.
pub trait Collector {
    type Fruit;

    /// Switch to the next segment. Documents passed to
    /// [`collect`](Collector::collect) are local to it.
    fn set_segment(&mut self, segment_ord: u32, store: Arc<FieldValueStore>);

    fn collect(&mut self, doc: DocId);

    fn finalize(self) -> Self::Fruit;
}

/// Coordinator half of an aggregation.
pub trait Reducer {
    type Partial;
    type Output;

    fn push(&mut self, partial: Self::Partial);

    fn reduce(self) -> Self::Output;
}
