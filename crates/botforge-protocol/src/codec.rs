//! Codec trait and the JSON implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts values to bytes and back.
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] over compact JSON (`serde_json`).
///
/// ```rust
/// use botforge_protocol::{Codec, JsonCodec, TextPacket};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"TextType":1,"SourceName":"Steve","Message":"hi"}"#;
/// let pkt: TextPacket = codec.decode(bytes).unwrap();
/// assert_eq!(pkt.source_name, "Steve");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TextPacket;

    #[test]
    fn test_decode_invalid_bytes_is_decode_error() {
        let result: Result<TextPacket, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_uses_wire_field_names() {
        let pkt = TextPacket {
            text_type: 1,
            source_name: "Alex".into(),
            message: "hello".into(),
            parameters: vec![],
        };
        let bytes = JsonCodec.encode(&pkt).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["TextType"], 1);
        assert_eq!(json["SourceName"], "Alex");
    }
}
