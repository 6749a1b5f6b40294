//! Rooms for Scrawl: the registry, the per-room actor and the turn engine.
//!
//! Each room runs as an isolated Tokio task (actor model) owning a
//! [`Room`] session and its deadline countdown.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms on first join, routes players, destroys empty rooms
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Room`]: the synchronous session state machine
//! - [`WordProvider`]: where words and hints come from ([`WordList`] built in)
//! - [`RoomConfig`]: round lengths, player limits, hint schedule

mod config;
mod error;
mod registry;
mod room;
mod session;
pub mod words;

pub use config::RoomConfig;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{PlayerSender, RoomHandle, RoomInfo};
pub use scrawl_protocol::GameState;
pub use session::{GuessOutcome, LeaveOutcome, Outbox, Player, Room, RoomAction, SYSTEM_NICKNAME};
pub use words::{WordList, WordProvider};
