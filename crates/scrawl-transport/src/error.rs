/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a connection (TCP accept or WebSocket handshake) failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A binary frame did not contain UTF-8 text. The connection is still
    /// usable.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
}

impl TransportError {
    /// Whether the connection can keep being used after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidUtf8)
    }
}
