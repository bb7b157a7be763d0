use super::{
    CollisionTracker, FieldValueStore, MultiValueStore, Ordinal, SingleValueStore, StoreMeta,
    MISSING_ORDINAL,
};
use crate::hash::{hash_normalized, normalize, TermHash};
use crate::source::{FieldKind, SegmentSource};
use crate::{Error, Result};
use std::time::Instant;
use tracing::{debug, warn};

pub(super) fn build(source: &dyn SegmentSource, field: &str) -> Result<FieldValueStore> {
    let start = Instant::now();

    match source.field_kind(field)? {
        None | Some(FieldKind::Str) => {}
        Some(other) => {
            return Err(Error::UnsupportedFieldType {
                field: field.to_string(),
                found: other.name().to_string(),
            })
        }
    }

    let max_doc = source.max_doc();
    let mut tracker = CollisionTracker::new();
    let mut offsets: Vec<u32> = Vec::with_capacity(max_doc as usize + 1);
    let mut doc_hashes: Vec<TermHash> = Vec::new();
    let mut multi_valued = false;
    offsets.push(0);

    let mut scratch: Vec<TermHash> = Vec::new();
    for doc in 0..max_doc {
        scratch.clear();
        for raw in source.field_values(doc, field)? {
            let normalized = normalize(&raw);
            let hash = hash_normalized(&normalized);
            tracker.observe(hash, &normalized);
            scratch.push(hash);
        }
        scratch.sort_unstable();
        scratch.dedup();
        multi_valued |= scratch.len() > 1;
        doc_hashes.extend_from_slice(&scratch);
        offsets.push(doc_hashes.len() as u32);
    }

    let mut values = doc_hashes.clone();
    values.sort_unstable();
    values.dedup();
    values.shrink_to_fit();

    // Per-doc runs are sorted by hash, so their ordinals come out ascending too.
    let ordinals: Vec<u32> = doc_hashes
        .iter()
        .map(|hash| values.partition_point(|v| v < hash) as u32)
        .collect();

    let meta = StoreMeta {
        field_name: field.to_string(),
        segment_id: source.segment_id().to_string(),
        collisions: tracker.finish(),
    };

    let store = if multi_valued {
        FieldValueStore::Multi(MultiValueStore {
            meta,
            values,
            offsets,
            ordinals,
        })
    } else {
        let per_doc = offsets
            .windows(2)
            .map(|w| {
                if w[0] == w[1] {
                    MISSING_ORDINAL
                } else {
                    ordinals[w[0] as usize] as Ordinal
                }
            })
            .collect();
        FieldValueStore::Single(SingleValueStore {
            meta,
            values,
            ordinals: per_doc,
        })
    };

    let elapsed = start.elapsed();
    crate::metrics::record_store_build(field, store.multi_valued(), elapsed);

    debug!(
        "Built hashed store for field '{}' on segment {}: {} docs, {} distinct hashes, \
         {} bytes, multi_valued={} in {:?}",
        field,
        store.segment_id(),
        store.num_docs(),
        store.values().len(),
        store.memory_usage_bytes(),
        store.multi_valued(),
        elapsed
    );

    if store.collisions() > 0 {
        crate::metrics::record_collisions(field, store.collisions());
        warn!(
            "Field '{}' on segment {} has {} hash collision(s); \
             counts for colliding terms are merged",
            field,
            store.segment_id(),
            store.collisions()
        );
    }

    Ok(store)
}
