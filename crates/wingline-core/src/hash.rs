//! Content-hash stage identity.
//!
//! Every stage's identity is a 16-hex-char BLAKE2b-64 fingerprint of the
//! upstream computation that produces its output. See `spec.md` §3 for
//! the exact composition rules; this module only provides the primitive
//! (`StageHash`) and the handful of ways one gets produced.

use std::fmt;
use std::io::Read;
use std::path::Path;

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;

use crate::record::Record;
use crate::WinglineError;

/// Width, in bytes, of a stage hash (64 bits -> 16 hex chars).
pub const HASH_LEN: usize = 8;

/// A 16-hex-char BLAKE2b-64 stable fingerprint of a stage's upstream
/// computation. `None` anywhere in a pipeline (carried as `Option<StageHash>`
/// by callers) means "non-deterministic upstream — caching disabled here."
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHash([u8; HASH_LEN]);

impl StageHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Blake2bVar::new(HASH_LEN).expect("HASH_LEN is a valid blake2b-var size");
        hasher.update(bytes);
        let mut out = [0u8; HASH_LEN];
        hasher
            .finalize_variable(&mut out)
            .expect("output buffer is exactly HASH_LEN bytes");
        StageHash(out)
    }

    /// `hash(parent_hash ∥ hash(code))`, the composition rule for every
    /// non-tap stage (`spec.md` §3, "Stage identity").
    pub fn combine(parent: &StageHash, code: &StageHash) -> StageHash {
        let mut buf = Vec::with_capacity(HASH_LEN * 2);
        buf.extend_from_slice(&parent.0);
        buf.extend_from_slice(&code.0);
        StageHash::from_bytes(&buf)
    }

    /// The two hex chars used as the cache directory's fan-out prefix.
    pub fn prefix(&self) -> String {
        format!("{:02x}", self.0[0])
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl fmt::Display for StageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageHash({self})")
    }
}

const FILE_CHUNK: usize = 4096;

/// Streaming BLAKE2b-64 over a file's raw bytes, 4 KiB at a time
/// (`spec.md` §4.3, "File tap").
pub fn hash_file(path: &Path) -> Result<StageHash, WinglineError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Blake2bVar::new(HASH_LEN).expect("HASH_LEN is a valid blake2b-var size");
    let mut buf = [0u8; FILE_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let mut out = [0u8; HASH_LEN];
    hasher
        .finalize_variable(&mut out)
        .expect("output buffer is exactly HASH_LEN bytes");
    Ok(StageHash(out))
}

/// A stable hash of an in-memory ordered sequence of records, stable
/// across runs for equal sequences (`spec.md` §4.3, "Sequence tap").
///
/// Each record is serialized to a canonical (sorted-key) JSON
/// representation and hashed with a length-prefixed delimiter between
/// records so that `[{"a":1},{"b":2}]` and `[{"a":1,"b":2}]`-ish
/// concatenation ambiguities can't collide.
pub fn hash_sequence<'a>(records: impl Iterator<Item = &'a Record>) -> StageHash {
    let mut hasher = Blake2bVar::new(HASH_LEN).expect("HASH_LEN is a valid blake2b-var size");
    for record in records {
        let canonical = canonical_json(record);
        hasher.update(&(canonical.len() as u64).to_le_bytes());
        hasher.update(canonical.as_bytes());
    }
    let mut out = [0u8; HASH_LEN];
    hasher
        .finalize_variable(&mut out)
        .expect("output buffer is exactly HASH_LEN bytes");
    StageHash(out)
}

fn canonical_json(record: &Record) -> String {
    // `Record`'s own `Serialize` impl preserves insertion order; sort keys
    // here so hash stability doesn't depend on construction order.
    let mut sorted = serde_json::Map::new();
    for key in record.sorted_keys() {
        let value = record.get(key).expect("key came from this record");
        sorted.insert(
            key.clone(),
            serde_json::to_value(value).expect("Value always serializes to JSON"),
        );
    }
    serde_json::Value::Object(sorted).to_string()
}

/// Hash of a stage-identity string (the explicit substitute for hashing a
/// serialized closure; see `spec.md` §9 and `SPEC_FULL.md` §4.7).
pub fn hash_stage_id(stage_id: &str) -> StageHash {
    StageHash::from_bytes(stage_id.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_16_hex_chars() {
        let h = StageHash::from_bytes(b"hello");
        assert_eq!(h.to_string().len(), 16);
        assert!(h.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn combine_is_deterministic_and_order_sensitive() {
        let a = StageHash::from_bytes(b"a");
        let b = StageHash::from_bytes(b"b");
        assert_eq!(
            StageHash::combine(&a, &b).to_string(),
            StageHash::combine(&a, &b).to_string()
        );
        assert_ne!(
            StageHash::combine(&a, &b).to_string(),
            StageHash::combine(&b, &a).to_string()
        );
    }

    #[test]
    fn hash_sequence_is_stable_for_equal_sequences_regardless_of_key_order() {
        use crate::record::Value;

        let mut r1 = Record::new();
        r1.insert("a", Value::Int(1));
        r1.insert("b", Value::Int(2));

        let mut r2 = Record::new();
        r2.insert("b", Value::Int(2));
        r2.insert("a", Value::Int(1));

        let h1 = hash_sequence([r1].iter());
        let h2 = hash_sequence([r2].iter());
        assert_eq!(h1.to_string(), h2.to_string());
    }
}
