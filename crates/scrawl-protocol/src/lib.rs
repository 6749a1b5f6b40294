//! Wire protocol for Scrawl.
//!
//! This crate defines the "language" clients and the server speak:
//!
//! - **Types** ([`ClientAction`], [`ServerEvent`], [`Envelope`],
//!   [`RoomSnapshot`], ...): the messages that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from text frames.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (ClientAction / Envelope) → Room engine
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChatKind, ClientAction, Envelope, GameState, MAX_ROOM_CODE_LEN, PROTOCOL_VERSION, Phase,
    PlayerId, PlayerView, Recipient, RoomCode, RoomSnapshot, RoundEndReason, ScoreEntry,
    ServerEvent, Stroke, WordEntry, count_letters,
};
