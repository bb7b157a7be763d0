//! Storage collaborator seam.
//!
//! Stores are built from, and display strings resolved against, anything
//! that can enumerate a segment's documents and hand back raw field values.

mod memory;
#[cfg(feature = "tantivy-adapter")]
mod tantivy_segment;

pub use memory::{Document, MemorySegment};
#[cfg(feature = "tantivy-adapter")]
pub use tantivy_segment::TantivySegment;

use crate::Result;
use serde::{Deserialize, Serialize};

/// Segment-local document id.
pub type DocId = u32;

/// Address of a document within a shard: segment ordinal plus local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocAddress {
    pub segment: u32,
    pub doc: DocId,
}

impl DocAddress {
    pub fn new(segment: u32, doc: DocId) -> Self {
        Self { segment, doc }
    }
}

/// Declared type of a field within a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Other(String),
}

impl FieldKind {
    pub fn name(&self) -> &str {
        match self {
            FieldKind::Str => "string",
            FieldKind::Other(name) => name,
        }
    }
}

/// Iteration capability over one immutable segment.
pub trait SegmentSource: Send + Sync {
    /// Stable identifier; cache entries are keyed by it.
    fn segment_id(&self) -> &str;

    /// Exclusive upper bound of document ids.
    fn max_doc(&self) -> DocId;

    /// `None` when the segment has never seen the field.
    fn field_kind(&self, field: &str) -> Result<Option<FieldKind>>;

    /// Raw values of `field` for `doc`, empty when absent or deleted.
    fn field_values(&self, doc: DocId, field: &str) -> Result<Vec<String>>;

    /// Deleted documents are skipped when a whole segment is collected.
    fn is_alive(&self, _doc: DocId) -> bool {
        true
    }
}
