//! JSON Canonicalization Scheme (RFC 8785) wrapper.
//!
//! Deterministic JSON serialization shared by mandate signing and intent
//! hashing. Uses `serde_jcs`, which guarantees lexicographic key ordering,
//! no insignificant whitespace, and IEEE 754 number normalization (1.0 -> 1).

use anyhow::{Context, Result};
use serde::Serialize;

/// Serialize a value to JCS canonical JSON bytes.
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_jcs::to_vec(value).context("failed to serialize canonical json")
}

/// Serialize a value to a JCS canonical JSON string.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    serde_jcs::to_string(value).context("failed to serialize canonical json string")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_ordering() {
        let input = json!({"z": 3, "b": 2, "a": 1, "m": 4});
        assert_eq!(to_string(&input).unwrap(), r#"{"a":1,"b":2,"m":4,"z":3}"#);
    }

    #[test]
    fn nested_ordering() {
        let input = json!({"outer": {"z": 1, "a": 2}, "first": true});
        assert_eq!(
            to_string(&input).unwrap(),
            r#"{"first":true,"outer":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn no_whitespace() {
        let input = json!({"key": "value", "array": [1, 2, 3]});
        let canonical = to_string(&input).unwrap();
        assert!(!canonical.contains(' '));
        assert!(!canonical.contains('\n'));
    }

    #[test]
    fn array_order_preserved() {
        let input = json!({"array": [3, 1, 2]});
        assert_eq!(to_string(&input).unwrap(), r#"{"array":[3,1,2]}"#);
    }

    #[test]
    fn determinism_across_construction_order() {
        let input1 = json!({"a": 1, "b": 2});
        let input2 = json!({"b": 2, "a": 1});
        assert_eq!(to_vec(&input1).unwrap(), to_vec(&input2).unwrap());
    }
}
