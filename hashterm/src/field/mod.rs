//! Hashed per-segment field values.
//!
//! A store keeps a field's values as 32-bit hashes: one sorted array of the
//! distinct hashes in the segment plus, per document, ordinals into it.

mod builder;
mod cache;
mod collision;
mod multi;
mod single;

pub use cache::{FieldStoreCache, StoreCacheStats, StoreKey};
pub use collision::CollisionTracker;
pub use multi::MultiValueStore;
pub use single::SingleValueStore;

use crate::hash::TermHash;
use crate::source::{DocId, SegmentSource};
use crate::{Error, Result};

/// Position of a hash within [`FieldValueStore::values`].
pub type Ordinal = i32;

/// Ordinal reported for documents without a value.
pub const MISSING_ORDINAL: Ordinal = -1;

/// Receives the hashes stored for a document.
pub trait ValueVisitor {
    fn on_value(&mut self, doc: DocId, hash: TermHash);
    fn on_missing(&mut self, doc: DocId);
}

/// Receives the ordinals stored for a document, or [`MISSING_ORDINAL`] once.
pub trait OrdinalVisitor {
    fn on_ordinal(&mut self, doc: DocId, ordinal: Ordinal);
}

impl<F: FnMut(DocId, Ordinal)> OrdinalVisitor for F {
    fn on_ordinal(&mut self, doc: DocId, ordinal: Ordinal) {
        self(doc, ordinal)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoreMeta {
    pub field_name: String,
    pub segment_id: String,
    pub collisions: u64,
}

#[derive(Debug)]
pub enum FieldValueStore {
    Single(SingleValueStore),
    Multi(MultiValueStore),
}

impl FieldValueStore {
    /// Scan every document of `source` once and hash `field`.
    pub fn build(source: &dyn SegmentSource, field: &str) -> Result<FieldValueStore> {
        builder::build(source, field)
    }

    fn meta(&self) -> &StoreMeta {
        match self {
            FieldValueStore::Single(s) => &s.meta,
            FieldValueStore::Multi(m) => &m.meta,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.meta().field_name
    }

    pub fn segment_id(&self) -> &str {
        &self.meta().segment_id
    }

    pub fn multi_valued(&self) -> bool {
        matches!(self, FieldValueStore::Multi(_))
    }

    /// Distinct hashes of the segment, strictly ascending.
    pub fn values(&self) -> &[TermHash] {
        match self {
            FieldValueStore::Single(s) => &s.values,
            FieldValueStore::Multi(m) => &m.values,
        }
    }

    pub fn ordinal_of(&self, hash: TermHash) -> Option<Ordinal> {
        self.values()
            .binary_search(&hash)
            .ok()
            .map(|ord| ord as Ordinal)
    }

    pub fn has_value(&self, doc: DocId) -> bool {
        match self {
            FieldValueStore::Single(s) => s.has_value(doc),
            FieldValueStore::Multi(m) => m.has_value(doc),
        }
    }

    /// The document's only hash. Multi-valued stores refuse.
    pub fn hash_value(&self, doc: DocId) -> Result<TermHash> {
        match self {
            FieldValueStore::Single(s) => s.hash_value(doc),
            FieldValueStore::Multi(_) => Err(Error::UnsupportedOperation(format!(
                "hash_value on multi-valued field '{}'",
                self.field_name()
            ))),
        }
    }

    pub fn for_each_value_in_doc<V: ValueVisitor + ?Sized>(&self, doc: DocId, visitor: &mut V) {
        match self {
            FieldValueStore::Single(s) => s.for_each_value_in_doc(doc, visitor),
            FieldValueStore::Multi(m) => m.for_each_value_in_doc(doc, visitor),
        }
    }

    pub fn for_each_ordinal_in_doc<V: OrdinalVisitor + ?Sized>(&self, doc: DocId, visitor: &mut V) {
        match self {
            FieldValueStore::Single(s) => s.for_each_ordinal_in_doc(doc, visitor),
            FieldValueStore::Multi(m) => m.for_each_ordinal_in_doc(doc, visitor),
        }
    }

    /// Distinct normalized strings that shared a hash with an earlier one.
    pub fn collisions(&self) -> u64 {
        self.meta().collisions
    }

    pub fn num_docs(&self) -> usize {
        match self {
            FieldValueStore::Single(s) => s.num_docs(),
            FieldValueStore::Multi(m) => m.num_docs(),
        }
    }

    pub fn memory_usage_bytes(&self) -> usize {
        match self {
            FieldValueStore::Single(s) => s.memory_usage_bytes(),
            FieldValueStore::Multi(m) => m.memory_usage_bytes(),
        }
    }
}
