//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// How long a new connection may take to send its request line before it
/// is handed to the WebSocket handshake unchecked.
const HEALTH_PEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the request head read from a health check client.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

fn io_error(kind: std::io::ErrorKind, e: tungstenite::Error) -> std::io::Error {
    std::io::Error::new(kind, e)
}

/// A plain HTTP `GET` answered on the WebSocket port.
struct HealthCheck {
    path: String,
    body: Arc<dyn Fn() -> String + Send + Sync>,
}

impl HealthCheck {
    /// Peeks at the request line without consuming it, so a connection
    /// that turns out to be a WebSocket upgrade is left untouched.
    async fn matches(&self, stream: &TcpStream) -> bool {
        let prefix = format!("GET {} ", self.path);
        let mut buf = vec![0u8; prefix.len()];
        match tokio::time::timeout(HEALTH_PEEK_TIMEOUT, stream.peek(&mut buf)).await {
            Ok(Ok(n)) => buf[..n] == *prefix.as_bytes(),
            _ => false,
        }
    }
}

/// Reads the request head, then writes a `200` JSON response and closes.
async fn respond_health(mut stream: TcpStream, body: String) -> std::io::Result<()> {
    let mut head = Vec::with_capacity(512);
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Optionally answers a plain HTTP health check on the same port; see
/// [`with_health_check`](Self::with_health_check).
pub struct WebSocketTransport {
    listener: TcpListener,
    health: Option<HealthCheck>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        Ok(Self::from_listener(listener))
    }

    /// Wraps an already-bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "WebSocket transport listening");
        }
        Self {
            listener,
            health: None,
        }
    }

    /// Answers `GET <path>` with `200 OK` and the JSON produced by `body`.
    ///
    /// Health requests are served on their own task and never surface
    /// from [`accept`](Transport::accept). Any other request proceeds to
    /// the WebSocket handshake.
    pub fn with_health_check(
        mut self,
        path: impl Into<String>,
        body: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.health = Some(HealthCheck {
            path: path.into(),
            body: Arc::new(body),
        });
        self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = loop {
            let (stream, addr) = self
                .listener
                .accept()
                .await
                .map_err(TransportError::AcceptFailed)?;

            let Some(health) = &self.health else {
                break (stream, addr);
            };
            if !health.matches(&stream).await {
                break (stream, addr);
            }

            let body = (health.body)();
            tokio::spawn(async move {
                if let Err(e) = respond_health(stream, body).await {
                    tracing::debug!(%addr, error = %e, "health check response failed");
                }
            });
            tracing::trace!(%addr, "served health check");
        };

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| TransportError::AcceptFailed(io_error(std::io::ErrorKind::ConnectionRefused, e)))?;

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer: addr,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener.local_addr().map_err(TransportError::BindFailed)
    }
}

/// A single WebSocket connection.
///
/// The socket is split so a writer task and a reader task never contend
/// for the same lock.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, text: &str) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => {
                    return String::from_utf8(data.to_vec())
                        .map(Some)
                        .map_err(|_| TransportError::InvalidUtf8);
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // ping/pong/raw frames; tungstenite answers pings itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io_error(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(io_error(std::io::ErrorKind::BrokenPipe, e)))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}
