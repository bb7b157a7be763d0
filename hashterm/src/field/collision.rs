use crate::hash::TermHash;
use std::collections::{HashMap, HashSet};

/// Counts distinct normalized strings landing on an already occupied hash.
///
/// Only lives for the duration of a store build; the finished store keeps
/// nothing but the count.
#[derive(Debug, Default)]
pub struct CollisionTracker {
    first_seen: HashMap<TermHash, String>,
    counted: HashSet<String>,
    collisions: u64,
}

impl CollisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `normalized` hashing to `hash`.
    pub fn observe(&mut self, hash: TermHash, normalized: &str) {
        match self.first_seen.get(&hash) {
            None => {
                self.first_seen.insert(hash, normalized.to_string());
            }
            Some(first) if first == normalized => {}
            Some(_) => {
                // A string hashes to exactly one bucket, so one set covers all buckets.
                if self.counted.insert(normalized.to_string()) {
                    self.collisions += 1;
                }
            }
        }
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn finish(self) -> u64 {
        self.collisions
    }
}
