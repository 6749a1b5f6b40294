//! # Scrawl
//!
//! Server for a multiplayer draw-and-guess game played over WebSockets.
//!
//! Players join rooms by code. Each round one player picks a word and
//! draws it while everyone else races to guess it from the chat. The
//! server is authoritative: it owns the room state machine, the timers,
//! the scores and who draws next.
//!
//! A plain HTTP `GET /health` on the same port reports liveness.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scrawl::prelude::*;
//!
//! # async fn start() -> Result<(), ScrawlError> {
//! let server = ScrawlServer::builder()
//!     .bind("0.0.0.0:3001")
//!     .build(WordList::builtin())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use error::ScrawlError;
pub use server::{HEALTH_PATH, ScrawlServer, ScrawlServerBuilder};

/// Convenient re-exports for running a server.
pub mod prelude {
    pub use crate::{HEALTH_PATH, ScrawlError, ScrawlServer, ScrawlServerBuilder, ServerConfig};
    pub use scrawl_protocol::{
        ClientAction, Envelope, GameState, PROTOCOL_VERSION, PlayerId, RoomCode, ServerEvent,
        WordEntry,
    };
    pub use scrawl_room::{RoomConfig, RoomError, WordList, WordProvider};
}
