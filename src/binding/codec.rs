//! Value codecs used by typed bindings.

use crate::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Maps values to bytes and back.
///
/// Equal values must encode to identical bytes: bindings compare stored
/// bytes to decide whether their cached value is still current.
pub trait Codec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON via serde_json.
///
/// Values containing `HashMap`s serialize in iteration order; use ordered
/// maps for values whose encoding must be stable.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::Deserialization(e.to_string()))
    }
}

/// MessagePack via rmp-serde, with struct fields encoded by name.
#[derive(Clone, Copy, Debug, Default)]
pub struct MsgPackCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for MsgPackCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Player {
        name: String,
        score: u32,
    }

    #[test]
    fn test_json_codec() {
        let player = Player {
            name: "ada".into(),
            score: 7,
        };
        let bytes = Codec::<Player>::encode(&JsonCodec, &player).unwrap();
        assert_eq!(bytes, br#"{"name":"ada","score":7}"#);
        assert_eq!(Codec::<Player>::decode(&JsonCodec, &bytes).unwrap(), player);
    }

    #[test]
    fn test_msgpack_codec_is_deterministic() {
        let player = Player {
            name: "ada".into(),
            score: 7,
        };
        let a = Codec::<Player>::encode(&MsgPackCodec, &player).unwrap();
        let b = Codec::<Player>::encode(&MsgPackCodec, &player.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(Codec::<Player>::decode(&MsgPackCodec, &a).unwrap(), player);
    }

    #[test]
    fn test_json_decode_error() {
        let result = Codec::<u32>::decode(&JsonCodec, b"not a number");
        assert!(matches!(result, Err(SyncError::Deserialization(_))));
    }

    #[test]
    fn test_json_encode_error() {
        let mut map = HashMap::new();
        map.insert((1u8, 2u8), 3u8);
        let result = Codec::<HashMap<(u8, u8), u8>>::encode(&JsonCodec, &map);
        assert!(matches!(result, Err(SyncError::Serialization(_))));
    }
}
