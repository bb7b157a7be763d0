//! Case-insensitive string hashing.
//!
//! Codes must agree between shards and across restarts, so the hash has no
//! seed: lower-case the value, then run a base-31 polynomial over its UTF-16
//! code units with wrapping 32-bit arithmetic.

/// 32-bit code identifying a normalized string. Distinct strings may share one.
pub type TermHash = i32;

const HASH_BASE: i32 = 31;

/// Lower-cased form every value is hashed (and displayed) in.
pub fn normalize(value: &str) -> String {
    value.to_lowercase()
}

/// Hash a raw value. `hash_term(a) == hash_term(b)` whenever
/// `a.to_lowercase() == b.to_lowercase()`.
pub fn hash_term(value: &str) -> TermHash {
    hash_normalized(&normalize(value))
}

/// Hash a value that is already lower-cased.
pub fn hash_normalized(normalized: &str) -> TermHash {
    normalized
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(HASH_BASE).wrapping_add(unit as i32))
}
