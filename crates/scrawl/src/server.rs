//! `ScrawlServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room registry.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use scrawl_protocol::{Codec, JsonCodec, PlayerId};
use scrawl_room::{RoomConfig, RoomRegistry, WordProvider};
use scrawl_transport::{Transport, WebSocketTransport};

use crate::ScrawlError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;

/// Path answered with a plain HTTP health report.
pub const HEALTH_PATH: &str = "/health";

/// The JSON body served at [`HEALTH_PATH`].
fn health_report() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    serde_json::json!({
        "status": "ok",
        "timestamp": timestamp,
        "service": "scrawl",
    })
    .to_string()
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<W: WordProvider, C: Codec> {
    pub(crate) registry: RoomRegistry<W>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
    /// Envelope timestamps are milliseconds since this instant.
    pub(crate) started: Instant,
    next_player_id: AtomicU64,
}

impl<W: WordProvider, C: Codec> ServerState<W, C> {
    /// Hands out connection-scoped player ids, starting at 1.
    pub(crate) fn next_player_id(&self) -> PlayerId {
        PlayerId(self.next_player_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Builder for configuring and starting a Scrawl server.
///
/// # Example
///
/// ```rust,ignore
/// use scrawl::prelude::*;
///
/// let server = ScrawlServer::builder()
///     .bind("0.0.0.0:3001")
///     .room_config(RoomConfig { max_rounds: 3, ..RoomConfig::default() })
///     .build(WordList::builtin())
///     .await?;
/// server.run().await
/// ```
pub struct ScrawlServerBuilder {
    config: ServerConfig,
}

impl ScrawlServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting with `config`.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the settings every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Sets the idle connection timeout. `None` disables it.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server around `words`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<W: WordProvider>(
        self,
        words: W,
    ) -> Result<ScrawlServer<W, JsonCodec>, ScrawlError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_health_check(HEALTH_PATH, health_report);

        let state = Arc::new(ServerState {
            registry: RoomRegistry::new(self.config.room, words),
            codec: JsonCodec,
            idle_timeout: self.config.idle_timeout,
            started: Instant::now(),
            next_player_id: AtomicU64::new(1),
        });

        Ok(ScrawlServer { transport, state })
    }
}

impl Default for ScrawlServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Scrawl server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ScrawlServer<W: WordProvider, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<W, C>>,
}

impl ScrawlServer<scrawl_room::WordList, JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ScrawlServerBuilder {
        ScrawlServerBuilder::new()
    }
}

impl<W, C> ScrawlServer<W, C>
where
    W: WordProvider,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ScrawlError> {
        Ok(self.transport.local_addr()?)
    }

    /// Number of rooms currently alive.
    pub fn room_count(&self) -> usize {
        self.state.registry.room_count()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ScrawlError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted connection gets its own handler task. Connections
    /// already running are left to finish on their own.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ScrawlError> {
        tracing::info!("Scrawl server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_report_fields() {
        let report: serde_json::Value = serde_json::from_str(&health_report()).unwrap();
        assert_eq!(report["status"], "ok");
        assert_eq!(report["service"], "scrawl");
        assert!(report["timestamp"].as_u64().unwrap() > 0);
    }
}
