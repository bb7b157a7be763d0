use super::{OrdinalVisitor, Ordinal, StoreMeta, ValueVisitor, MISSING_ORDINAL};
use crate::hash::TermHash;
use crate::source::DocId;

/// Any number of hashes per document, laid out as offsets into one flat
/// ordinal column. Each document's run is ascending and duplicate-free.
#[derive(Debug)]
pub struct MultiValueStore {
    pub(super) meta: StoreMeta,
    pub(super) values: Vec<TermHash>,
    pub(super) offsets: Vec<u32>,
    pub(super) ordinals: Vec<u32>,
}

impl MultiValueStore {
    fn doc_ordinals(&self, doc: DocId) -> &[u32] {
        let doc = doc as usize;
        if doc + 1 >= self.offsets.len() {
            return &[];
        }
        &self.ordinals[self.offsets[doc] as usize..self.offsets[doc + 1] as usize]
    }

    pub fn has_value(&self, doc: DocId) -> bool {
        !self.doc_ordinals(doc).is_empty()
    }

    pub fn for_each_value_in_doc<V: ValueVisitor + ?Sized>(&self, doc: DocId, visitor: &mut V) {
        let ordinals = self.doc_ordinals(doc);
        if ordinals.is_empty() {
            visitor.on_missing(doc);
            return;
        }
        for &ord in ordinals {
            visitor.on_value(doc, self.values[ord as usize]);
        }
    }

    pub fn for_each_ordinal_in_doc<V: OrdinalVisitor + ?Sized>(&self, doc: DocId, visitor: &mut V) {
        let ordinals = self.doc_ordinals(doc);
        if ordinals.is_empty() {
            visitor.on_ordinal(doc, MISSING_ORDINAL);
            return;
        }
        for &ord in ordinals {
            visitor.on_ordinal(doc, ord as Ordinal);
        }
    }

    pub fn num_docs(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn memory_usage_bytes(&self) -> usize {
        self.values.capacity() * std::mem::size_of::<TermHash>()
            + (self.offsets.capacity() + self.ordinals.capacity()) * std::mem::size_of::<u32>()
    }
}
