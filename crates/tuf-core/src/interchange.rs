//! Data interchange formats. TUF metadata must be signed over a canonical byte representation so
//! that signatures remain stable across equivalent serializations.

use serde::de::DeserializeOwned;
use serde::ser::Serialize;
use std::fmt::Debug;

use crate::Result;

/// A data interchange format (e.g. canonical JSON) used to serialize and canonicalize metadata
/// before it is signed or verified.
pub trait DataInterchange: Debug + PartialEq + Clone + Send + Sync {
    /// The type of the raw, not-yet-canonicalized serialized data.
    type RawData: Debug + Clone + PartialEq + Send + Sync;

    /// The filename extension used for metadata serialized with this interchange (spec §6
    /// `{tufRole}.json` path segments).
    fn extension() -> &'static str;

    /// Serialize the given value into this interchange's raw representation.
    fn serialize<T: Serialize>(value: &T) -> Result<Self::RawData>;

    /// Deserialize a value from this interchange's raw representation.
    fn deserialize<T: DeserializeOwned>(raw: &Self::RawData) -> Result<T>;

    /// Produce the canonical byte representation used for hashing and signing. Two semantically
    /// equal values MUST canonicalize to the same bytes regardless of key/field ordering in the
    /// original serialization (spec §3: "A SignedMetadata is a byte-exact artifact").
    fn canonicalize(raw: &Self::RawData) -> Result<Vec<u8>>;
}

/// Canonical JSON, following the same key-ordering/whitespace rules TUF reference
/// implementations use (sorted object keys, no insignificant whitespace).
#[derive(Debug, Clone, PartialEq)]
pub struct Json;

impl DataInterchange for Json {
    type RawData = serde_json::Value;

    fn extension() -> &'static str {
        "json"
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Self::RawData> {
        Ok(serde_json::to_value(value)?)
    }

    fn deserialize<T: DeserializeOwned>(raw: &Self::RawData) -> Result<T> {
        Ok(serde_json::from_value(raw.clone())?)
    }

    fn canonicalize(raw: &Self::RawData) -> Result<Vec<u8>> {
        canonicalize_json(raw)
    }
}

/// Serialize a [`serde_json::Value`] with object keys sorted lexicographically and no
/// insignificant whitespace, matching the JSON canonicalization scheme TUF implementations use
/// for computing signatures over metadata.
fn canonicalize_json(value: &serde_json::Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    Ok(out)
}

fn write_canonical(value: &serde_json::Value, out: &mut Vec<u8>) {
    use serde_json::Value;

    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => {
            out.extend_from_slice(serde_json::to_string(s).unwrap().as_bytes());
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(serde_json::to_string(key).unwrap().as_bytes());
                out.push(b':');
                write_canonical(&map[*key], out);
            }
            out.push(b'}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalization_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonicalize_json(&a).unwrap(), canonicalize_json(&b).unwrap());
    }

    #[test]
    fn canonicalization_has_no_whitespace() {
        let v = json!({"a": [1, 2, 3]});
        let bytes = canonicalize_json(&v).unwrap();
        assert_eq!(bytes, br#"{"a":[1,2,3]}"#.to_vec());
    }
}
