//! Strict JSON-object decoding.
//!
//! Serde's derived struct visitors also accept JSON arrays; reporter configs
//! and reports must be objects, so both go through [`from_object`].

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode `bytes` into `T`, rejecting anything but a JSON object.
pub fn from_object<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    let value: Value = serde_json::from_slice(bytes)?;
    if !value.is_object() {
        return Err(serde_json::Error::custom("expected a JSON object"));
    }
    serde_json::from_value(value)
}

/// Field deserializer that reads an explicit `null` as the zero value.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn accepts_object() {
        let m: HashMap<String, u32> = from_object(br#"{"a":1}"#).unwrap();
        assert_eq!(m["a"], 1);
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Counter {
        #[serde(deserialize_with = "null_as_default")]
        count: u32,
    }

    #[test]
    fn null_field_is_zero_value() {
        let p: Counter = from_object(br#"{"count":null}"#).unwrap();
        assert_eq!(p.count, 0);
        let p: Counter = from_object(br#"{"count":7}"#).unwrap();
        assert_eq!(p.count, 7);
        assert!(from_object::<Counter>(br#"{"count":"seven"}"#).is_err());
    }

    #[test]
    fn rejects_non_object() {
        for input in [&b"[]"[..], b"42", b"\"file\"", b"null", b"{"] {
            assert!(from_object::<HashMap<String, u32>>(input).is_err());
        }
    }
}
