use super::{OrdinalVisitor, Ordinal, StoreMeta, ValueVisitor, MISSING_ORDINAL};
use crate::hash::TermHash;
use crate::source::DocId;
use crate::{Error, Result};

/// At most one hash per document.
#[derive(Debug)]
pub struct SingleValueStore {
    pub(super) meta: StoreMeta,
    pub(super) values: Vec<TermHash>,
    pub(super) ordinals: Vec<Ordinal>,
}

impl SingleValueStore {
    fn ordinal(&self, doc: DocId) -> Ordinal {
        self.ordinals
            .get(doc as usize)
            .copied()
            .unwrap_or(MISSING_ORDINAL)
    }

    pub fn has_value(&self, doc: DocId) -> bool {
        self.ordinal(doc) != MISSING_ORDINAL
    }

    pub fn hash_value(&self, doc: DocId) -> Result<TermHash> {
        match self.ordinal(doc) {
            MISSING_ORDINAL => Err(Error::ValueAbsent { doc }),
            ord => Ok(self.values[ord as usize]),
        }
    }

    pub fn for_each_value_in_doc<V: ValueVisitor + ?Sized>(&self, doc: DocId, visitor: &mut V) {
        match self.ordinal(doc) {
            MISSING_ORDINAL => visitor.on_missing(doc),
            ord => visitor.on_value(doc, self.values[ord as usize]),
        }
    }

    pub fn for_each_ordinal_in_doc<V: OrdinalVisitor + ?Sized>(&self, doc: DocId, visitor: &mut V) {
        visitor.on_ordinal(doc, self.ordinal(doc));
    }

    pub fn num_docs(&self) -> usize {
        self.ordinals.len()
    }

    pub fn memory_usage_bytes(&self) -> usize {
        (self.values.capacity() + self.ordinals.capacity()) * std::mem::size_of::<i32>()
    }
}
