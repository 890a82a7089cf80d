//! Stable digests of computation results.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 over the JSON encoding of `value`, hex encoded.
///
/// Engines are deterministic, so recomputing a result from the same inputs
/// reproduces the digest exactly. Struct fields serialize in declaration
/// order and maps used in results are `BTreeMap`s.
pub fn result_digest<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_is_stable() {
        let value = json!({"a": 1, "b": [1, 2, 3]});
        let first = result_digest(&value).unwrap();
        let second = result_digest(&value).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_digest_changes_with_content() {
        let a = result_digest(&json!({"total": 100})).unwrap();
        let b = result_digest(&json!({"total": 101})).unwrap();
        assert_ne!(a, b);
    }
}
