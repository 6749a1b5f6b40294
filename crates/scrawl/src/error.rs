//! Unified error type for the Scrawl server.

use scrawl_protocol::ProtocolError;
use scrawl_room::RoomError;
use scrawl_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each layer's variant lets `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ScrawlError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: ScrawlError = TransportError::BindFailed(io).into();
        assert!(matches!(err, ScrawlError::Transport(_)));
        assert!(err.to_string().contains("port taken"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: ScrawlError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, ScrawlError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: ScrawlError = RoomError::NotFound(scrawl_protocol::RoomCode::from("X")).into();
        assert!(matches!(err, ScrawlError::Room(_)));
        assert_eq!(err.to_string(), "room X not found");
    }

    #[test]
    fn test_config_error_message() {
        let err = ScrawlError::Config("PORT: not a number".into());
        assert_eq!(err.to_string(), "invalid configuration: PORT: not a number");
    }
}
