//! MessagePack codec for type-tagged payloads.
//!
//! Payload bytes inside a [`Value`](super::Value) are MessagePack. Structs are
//! always encoded with `to_vec_named` so fields travel as maps, keeping the
//! bytes stable across field reordering and readable by non-Rust peers.
//!
//! # Example
//!
//! ```
//! use plugwire::wire::PayloadCodec;
//!
//! let encoded = PayloadCodec::encode(&"hello").unwrap();
//! let decoded: String = PayloadCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

use crate::error::Result;

/// MessagePack codec for payload bytes.
///
/// Marker struct with static methods; codec selection happens at compile time.
pub struct PayloadCodec;

impl PayloadCodec {
    /// Encode a value to MessagePack bytes.
    ///
    /// Uses `to_vec_named` so structs serialize as maps, not arrays.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MessagePack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Descriptor {
        resource_id: String,
        name: String,
    }

    #[test]
    fn test_encode_decode_struct() {
        let original = Descriptor {
            resource_id: "m-1234".to_string(),
            name: "default".to_string(),
        };

        let encoded = PayloadCodec::encode(&original).unwrap();
        let decoded: Descriptor = PayloadCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_struct_encodes_as_map() {
        let d = Descriptor {
            resource_id: "m-1".to_string(),
            name: "x".to_string(),
        };
        let encoded = PayloadCodec::encode(&d).unwrap();

        // fixmap marker, not fixarray
        assert_eq!(encoded[0] & 0xF0, 0x80, "expected map format");
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Descriptor> = PayloadCodec::decode(b"not valid msgpack");
        assert!(result.is_err());
    }

    #[test]
    fn test_none_encodes_as_nil() {
        let val: Option<i64> = None;
        let encoded = PayloadCodec::encode(&val).unwrap();
        assert_eq!(encoded, vec![0xc0]);
    }
}
