//! Tantivy segment adapter
//!
//! Reads raw values from stored string fields, so the field must be declared
//! `STORED` (and is typically `STRING`, i.e. not tokenized).

use super::{DocId, FieldKind, SegmentSource};
use crate::Result;
use tantivy::schema::{FieldType, OwnedValue};
use tantivy::{Searcher, SegmentReader, TantivyDocument};

pub struct TantivySegment {
    id: String,
    searcher: Searcher,
    segment_ord: u32,
    reader: SegmentReader,
}

impl TantivySegment {
    /// One source per segment of the searcher, in segment-ordinal order.
    pub fn from_searcher(searcher: &Searcher) -> Vec<TantivySegment> {
        searcher
            .segment_readers()
            .iter()
            .enumerate()
            .map(|(ord, reader)| TantivySegment {
                id: reader.segment_id().uuid_string(),
                searcher: searcher.clone(),
                segment_ord: ord as u32,
                reader: reader.clone(),
            })
            .collect()
    }
}

impl SegmentSource for TantivySegment {
    fn segment_id(&self) -> &str {
        &self.id
    }

    fn max_doc(&self) -> DocId {
        self.reader.max_doc()
    }

    fn field_kind(&self, field: &str) -> Result<Option<FieldKind>> {
        let schema = self.searcher.schema();
        let Ok(handle) = schema.get_field(field) else {
            return Ok(None);
        };

        let entry = schema.get_field_entry(handle);
        let kind = match entry.field_type() {
            FieldType::Str(_) if entry.is_stored() => FieldKind::Str,
            FieldType::Str(_) => FieldKind::Other("unstored string".to_string()),
            other => FieldKind::Other(format!("{:?}", other.value_type()).to_lowercase()),
        };
        Ok(Some(kind))
    }

    fn field_values(&self, doc: DocId, field: &str) -> Result<Vec<String>> {
        if doc >= self.max_doc() || !self.is_alive(doc) {
            return Ok(Vec::new());
        }
        let Ok(handle) = self.searcher.schema().get_field(field) else {
            return Ok(Vec::new());
        };

        let address = tantivy::DocAddress::new(self.segment_ord, doc);
        let stored: TantivyDocument = self.searcher.doc(address)?;

        Ok(stored
            .get_all(handle)
            .filter_map(|value| match value {
                OwnedValue::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect())
    }

    fn is_alive(&self, doc: DocId) -> bool {
        self.reader
            .alive_bitset()
            .map_or(true, |bitset| bitset.is_alive(doc))
    }
}
