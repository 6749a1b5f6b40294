//! Codec trait and the JSON implementation.
//!
//! Browser clients speak JSON over WebSocket text frames, so a codec here
//! converts between Rust types and `String`s rather than raw bytes.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to text frames and decode them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the frame is malformed,
    /// incomplete, or doesn't match the expected type.
    fn decode<T: DeserializeOwned>(&self, frame: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use scrawl_protocol::{ClientAction, Codec, JsonCodec, RoomCode};
///
/// let codec = JsonCodec;
/// let action: ClientAction = codec
///     .decode(r#"{"type":"start_game","room_id":"ABC123"}"#)
///     .unwrap();
/// assert_eq!(action.room_id(), &RoomCode::from("ABC123"));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, frame: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientAction, ServerEvent};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<ClientAction, _> = JsonCodec.decode("not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_produces_tagged_json() {
        let frame = JsonCodec.encode(&ServerEvent::ClearCanvas).unwrap();
        assert_eq!(frame, r#"{"type":"clear_canvas"}"#);
    }
}
