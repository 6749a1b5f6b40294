//! Error types for the protocol layer.
//!
//! Each crate in Scrawl defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into (or out of) a typed
//! action or event; it never describes a game rule violation.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into a text frame).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning a text frame into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown `type` tag, missing
    /// `room_id`, or a field of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but its content is not acceptable, e.g. an empty
    /// room code or a stroke with a non-finite coordinate.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
