use super::request::ParsedFacetRequest;
use super::types::{rank, ShardEntry, ShardFacetResult};
use super::Collector;
use crate::field::{FieldValueStore, ValueVisitor};
use crate::hash::TermHash;
use crate::source::{DocAddress, DocId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// hash -> (count, first owner) over the current shard.
struct Tally {
    segment_ord: u32,
    excluded: HashSet<TermHash>,
    counts: HashMap<TermHash, (u64, DocAddress)>,
    missing: u64,
}

impl ValueVisitor for Tally {
    fn on_value(&mut self, doc: DocId, hash: TermHash) {
        if self.excluded.contains(&hash) {
            return;
        }
        let owner = DocAddress::new(self.segment_ord, doc);
        self.counts.entry(hash).or_insert((0, owner)).0 += 1;
    }

    fn on_missing(&mut self, _doc: DocId) {
        self.missing += 1;
    }
}

/// Per-shard hashed-terms collector.
///
/// Keeps `fetch_size` candidates rather than `size`: a term ranked low here
/// may still be globally high once every shard is merged.
pub struct HashedTermsCollector {
    shard_id: String,
    field: String,
    fetch_size: usize,
    store: Option<Arc<FieldValueStore>>,
    tally: Tally,
    matched: u64,
    collisions: u64,
}

impl HashedTermsCollector {
    pub fn new(shard_id: impl Into<String>, request: &ParsedFacetRequest) -> Self {
        Self {
            shard_id: shard_id.into(),
            field: request.field.clone(),
            fetch_size: request.fetch_size,
            store: None,
            tally: Tally {
                segment_ord: 0,
                excluded: request.excluded.clone(),
                counts: HashMap::new(),
                missing: 0,
            },
            matched: 0,
            collisions: 0,
        }
    }

    pub fn distinct_terms(&self) -> usize {
        self.tally.counts.len()
    }
}

impl Collector for HashedTermsCollector {
    type Fruit = ShardFacetResult;

    fn set_segment(&mut self, segment_ord: u32, store: Arc<FieldValueStore>) {
        self.collisions += store.collisions();
        self.tally.segment_ord = segment_ord;
        self.store = Some(store);
    }

    fn collect(&mut self, doc: DocId) {
        self.matched += 1;
        match &self.store {
            Some(store) => store.for_each_value_in_doc(doc, &mut self.tally),
            None => self.tally.on_missing(doc),
        }
    }

    fn finalize(self) -> ShardFacetResult {
        let mut entries: Vec<ShardEntry> = self
            .tally
            .counts
            .into_iter()
            .map(|(term_hash, (count, owner))| ShardEntry {
                term_hash,
                count,
                owner,
            })
            .collect();

        let by_rank =
            |a: &ShardEntry, b: &ShardEntry| rank(a.count, a.term_hash, b.count, b.term_hash);
        if entries.len() > self.fetch_size {
            entries.select_nth_unstable_by(self.fetch_size, by_rank);
            entries.truncate(self.fetch_size);
        }
        entries.sort_unstable_by(by_rank);

        ShardFacetResult {
            shard_id: self.shard_id,
            field: self.field,
            entries,
            missing_count: self.tally.missing,
            matched_count: self.matched,
            collisions: self.collisions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FacetConfig;
    use crate::facet::FacetRequest;
    use crate::hash::hash_term;
    use crate::source::{Document, MemorySegment};
    use serde_json::{json, Value};

    fn store(id: &str, values: Vec<Value>) -> Arc<FieldValueStore> {
        let docs = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| Document::new(i.to_string()).with_field("tag", v))
            .collect();
        let segment = MemorySegment::from_docs(id, docs);
        Arc::new(FieldValueStore::build(&segment, "tag").unwrap())
    }

    fn parsed(request: FacetRequest) -> ParsedFacetRequest {
        request.parse(&FacetConfig::default()).unwrap()
    }

    #[test]
    fn test_counts_and_missing() {
        let store = store(
            "seg-0",
            vec![json!("a"), json!("A"), json!(["a", "b"]), json!(null), json!([])],
        );
        let request = parsed(FacetRequest::new("tag", 10));
        let mut collector = HashedTermsCollector::new("shard-0", &request);
        collector.set_segment(0, store);
        for doc in 0..5 {
            collector.collect(doc);
        }
        assert_eq!(collector.distinct_terms(), 2);

        let result = collector.finalize();
        assert_eq!(result.matched_count, 5);
        assert_eq!(result.missing_count, 2);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[0].term_hash, hash_term("a"));
        assert_eq!(result.entries[0].count, 3);
        assert_eq!(result.entries[0].owner, DocAddress::new(0, 0));
        assert_eq!(result.entries[1].count, 1);
        assert_eq!(result.entries[1].owner, DocAddress::new(0, 2));
    }

    #[test]
    fn test_truncates_to_fetch_size_not_size() {
        let values = (1..=20)
            .flat_map(|k| std::iter::repeat(json!(format!("t{}", k))).take(k))
            .collect();
        let request = parsed(FacetRequest::new("tag", 2).with_fetch_size(5));
        let mut collector = HashedTermsCollector::new("shard-0", &request);
        let store = store("seg-0", values);
        let docs = store.num_docs() as DocId;
        collector.set_segment(0, store);
        for doc in 0..docs {
            collector.collect(doc);
        }

        let result = collector.finalize();
        let counts: Vec<u64> = result.entries.iter().map(|e| e.count).collect();
        assert_eq!(counts, vec![20, 19, 18, 17, 16]);
    }

    #[test]
    fn test_ties_broken_by_ascending_hash() {
        let request = parsed(FacetRequest::new("tag", 10));
        let mut collector = HashedTermsCollector::new("shard-0", &request);
        collector.set_segment(0, store("seg-0", vec![json!("x"), json!("c"), json!("m")]));
        for doc in 0..3 {
            collector.collect(doc);
        }

        let hashes: Vec<TermHash> = collector
            .finalize()
            .entries
            .iter()
            .map(|e| e.term_hash)
            .collect();
        let mut sorted = hashes.clone();
        sorted.sort_unstable();
        assert_eq!(hashes, sorted);
    }

    #[test]
    fn test_excluded_terms_dropped_before_truncation() {
        let request = parsed(FacetRequest::new("tag", 1).with_exclude(["BIG"]));
        let mut collector = HashedTermsCollector::new("shard-0", &request);
        collector.set_segment(
            0,
            store("seg-0", vec![json!("big"), json!("big"), json!("small")]),
        );
        for doc in 0..3 {
            collector.collect(doc);
        }

        let result = collector.finalize();
        assert_eq!(result.missing_count, 0);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].term_hash, hash_term("small"));
    }

    #[test]
    fn test_spans_segments() {
        let request = parsed(FacetRequest::new("tag", 10));
        let mut collector = HashedTermsCollector::new("shard-0", &request);

        collector.set_segment(0, store("seg-0", vec![json!("a"), json!("b")]));
        collector.collect(0);
        collector.collect(1);
        collector.set_segment(1, store("seg-1", vec![json!("b"), json!("c")]));
        collector.collect(0);
        collector.collect(1);

        let result = collector.finalize();
        assert_eq!(result.matched_count, 4);
        assert_eq!(result.entries[0].term_hash, hash_term("b"));
        assert_eq!(result.entries[0].count, 2);
        assert_eq!(result.entries[0].owner, DocAddress::new(0, 1));

        let c = result
            .entries
            .iter()
            .find(|e| e.term_hash == hash_term("c"))
            .unwrap();
        assert_eq!(c.owner, DocAddress::new(1, 1));
    }
}
