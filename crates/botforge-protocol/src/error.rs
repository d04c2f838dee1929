//! Error types for the protocol layer.

/// Errors from decoding packets or encoding values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Bytes or a packet body didn't match the expected shape.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A known packet whose body doesn't match its record.
    #[error("malformed packet {id}: {source}")]
    MalformedPacket {
        id: i32,
        #[source]
        source: serde_json::Error,
    },
}
