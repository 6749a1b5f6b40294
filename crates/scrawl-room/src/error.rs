//! Error types for the room layer.

use scrawl_protocol::{GameState, PlayerId, ProtocolError, RoomCode};

/// Errors that can occur during room operations.
///
/// Every variant is a local rejection: the action is dropped, room state
/// is untouched, and only the requester hears about it.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room has no free player slots.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The player is already in this room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The player is already in a different room.
    #[error("player {0} is already in room {1}")]
    InOtherRoom(PlayerId, RoomCode),

    /// The player is not in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The player is not in any room.
    #[error("player {0} is not in any room")]
    NoRoom(PlayerId),

    /// Only the room owner may do this.
    #[error("only the room owner can {0}")]
    NotOwner(&'static str),

    /// Only the current drawer may do this.
    #[error("only the drawer can {0}")]
    NotDrawer(&'static str),

    /// The drawer typed the secret word into chat.
    #[error("the drawer cannot reveal the word")]
    DrawerCannotGuess,

    /// The action is not valid in the room's current state.
    #[error("cannot {action} while the room is {state}")]
    InvalidState {
        action: &'static str,
        state: GameState,
    },

    /// Too few players to start a game.
    #[error("need at least {need} players to start, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    /// Some non-owner players have not readied up.
    #[error("waiting for players to get ready: {}", .0.join(", "))]
    PlayersNotReady(Vec<String>),

    /// The action's payload is missing or malformed.
    #[error("invalid request: {0}")]
    InvalidPayload(String),

    /// The payload failed protocol-level validation.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The room's actor has stopped or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// HTTP-style status carried in the private `error` event.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidPayload(_) | Self::Protocol(_) => 400,
            Self::NotOwner(_) | Self::NotDrawer(_) | Self::DrawerCannotGuess => 403,
            Self::NotFound(_) | Self::NotInRoom(..) | Self::NoRoom(_) => 404,
            Self::RoomFull(_)
            | Self::AlreadyInRoom(..)
            | Self::InOtherRoom(..)
            | Self::InvalidState { .. }
            | Self::NotEnoughPlayers { .. }
            | Self::PlayersNotReady(_) => 409,
            Self::Unavailable(_) => 503,
        }
    }
}
