//! Core protocol types for Scrawl's wire format.
//!
//! Every type here travels "on the wire": inbound [`ClientAction`]s are
//! decoded from client frames, outbound [`ServerEvent`]s are wrapped in an
//! [`Envelope`] and encoded for delivery. The tag names (`join_room`,
//! `round_end`, ...) are the event names browser clients subscribe to.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

/// Protocol version announced in [`ServerEvent::Welcome`].
pub const PROTOCOL_VERSION: u32 = 1;

/// Longest accepted room code, in characters.
pub const MAX_ROOM_CODE_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A connection-scoped player identity.
///
/// Assigned by the gateway when a connection is accepted and stable for the
/// connection's lifetime. Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// An opaque room code chosen by clients (e.g. `"K3X9QZ"`).
///
/// Codes are compared exactly; [`RoomCode::validated`] trims surrounding
/// whitespace and rejects empty or oversized codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a trimmed copy, or an error if the code is empty or longer
    /// than [`MAX_ROOM_CODE_LEN`] characters.
    pub fn validated(&self) -> Result<Self, ProtocolError> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidMessage("room code is empty".into()));
        }
        if trimmed.chars().count() > MAX_ROOM_CODE_LEN {
            return Err(ProtocolError::InvalidMessage(format!(
                "room code longer than {MAX_ROOM_CODE_LEN} characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event.
///
/// The room engine returns `(Recipient, ServerEvent)` pairs; the room actor
/// resolves them against the current member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every player in the room.
    All,
    /// One specific player (private events such as `word_selection`).
    Player(PlayerId),
    /// Everyone except the given player (stroke relay).
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

/// The room session state.
///
/// ```text
///            start_game              select_word / timeout
/// WAITING ──────────────→ SELECTING ───────────────────→ DRAWING
///                           ↑   │ drawer left                │ all_guessed / timeout /
///                           │   ↓                            ↓ drawer left
///                 next_round└── ROUND_END ←──────────────────┘
///                               │ next_round (last round)
///                               ↓
///                            GAME_END ──start_game (rematch)──→ SELECTING
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Waiting,
    Selecting,
    Drawing,
    RoundEnd,
    GameEnd,
}

impl GameState {
    /// Returns `true` while a round is being played (a word is being
    /// chosen or drawn).
    pub fn is_mid_round(&self) -> bool {
        matches!(self, Self::Selecting | Self::Drawing)
    }

    /// Returns `true` if `start_game` may be issued from this state.
    pub fn can_start_game(&self) -> bool {
        matches!(self, Self::Waiting | Self::GameEnd)
    }

    /// Returns `true` if transitioning to `target` is a legal edge of the
    /// state table.
    pub fn can_transition_to(self, target: Self) -> bool {
        use GameState::*;
        matches!(
            (self, target),
            (Waiting, Selecting)
                | (Selecting, Drawing)
                | (Selecting, RoundEnd)
                | (Drawing, RoundEnd)
                | (RoundEnd, Selecting)
                | (RoundEnd, GameEnd)
                | (GameEnd, Selecting)
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Selecting => write!(f, "SELECTING"),
            Self::Drawing => write!(f, "DRAWING"),
            Self::RoundEnd => write!(f, "ROUND_END"),
            Self::GameEnd => write!(f, "GAME_END"),
        }
    }
}

/// The phase a running countdown belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Selecting,
    Drawing,
}

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    AllGuessed,
    Timeout,
    DrawerDisconnected,
}

impl fmt::Display for RoundEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllGuessed => write!(f, "all_guessed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DrawerDisconnected => write!(f, "drawer_disconnected"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload records
// ---------------------------------------------------------------------------

/// A secret word and its progressive hint text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub hint: String,
}

impl WordEntry {
    pub fn new(word: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            hint: hint.into(),
        }
    }

    /// Letters in the word, as announced to guessers.
    pub fn letter_count(&self) -> usize {
        count_letters(&self.word)
    }
}

/// Counts the letters of a word. Whitespace between the parts of a
/// multi-word entry is not a letter.
pub fn count_letters(word: &str) -> usize {
    word.chars().filter(|c| !c.is_whitespace()).count()
}

/// One line segment of a drawing. Opaque to the engine beyond validation;
/// relayed as-is to the other room members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    pub color: String,
    pub line_width: f64,
}

impl Stroke {
    /// Upper bound on `line_width`.
    pub const MAX_LINE_WIDTH: f64 = 100.0;
    /// Upper bound on the length of `color`.
    pub const MAX_COLOR_LEN: usize = 32;

    /// Rejects strokes that no canvas could render.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let coords = [self.start_x, self.start_y, self.end_x, self.end_y];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(ProtocolError::InvalidMessage(
                "stroke coordinates must be finite".into(),
            ));
        }
        if !(self.line_width > 0.0 && self.line_width <= Self::MAX_LINE_WIDTH) {
            return Err(ProtocolError::InvalidMessage(format!(
                "line width must be in (0, {}]",
                Self::MAX_LINE_WIDTH
            )));
        }
        if self.color.is_empty() || self.color.len() > Self::MAX_COLOR_LEN {
            return Err(ProtocolError::InvalidMessage("invalid stroke color".into()));
        }
        Ok(())
    }
}

/// Public view of a player, as shown in rosters and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    pub is_drawer: bool,
    pub is_owner: bool,
    pub is_ready: bool,
    pub guessed_correctly: bool,
    pub score: u32,
}

/// One row of a scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub nickname: String,
    pub score: u32,
}

/// Distinguishes player chat from engine-generated lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Chat,
    System,
}

/// A full, per-recipient view of a room.
///
/// `word` and `word_options` are only populated in the drawer's copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomCode,
    pub state: GameState,
    pub players: Vec<PlayerView>,
    pub owner_id: Option<PlayerId>,
    pub current_drawer_index: Option<usize>,
    pub drawer_id: Option<PlayerId>,
    pub word: Option<String>,
    pub word_length: Option<usize>,
    pub current_hint: Option<String>,
    pub hints_released: u8,
    pub remaining_secs: Option<u64>,
    /// Full length of the running countdown, in seconds.
    pub time_limit_secs: Option<u64>,
    /// Unix epoch milliseconds at which the active countdown expires.
    pub deadline_ms: Option<u64>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub scores: Vec<ScoreEntry>,
    pub ready: Vec<PlayerId>,
    pub word_options: Vec<WordEntry>,
    /// The word revealed by the most recent `round_end`.
    pub last_word: Option<String>,
}

// ---------------------------------------------------------------------------
// Inbound actions
// ---------------------------------------------------------------------------

/// Actions a client can send. Every action is addressed to a room.
///
/// Internally tagged: `{"type": "select_word", "room_id": "K3X9", "word_index": 1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAction {
    JoinRoom { room_id: RoomCode, nickname: String },
    PlayerReady { room_id: RoomCode, is_ready: bool },
    StartGame { room_id: RoomCode },
    SelectWord { room_id: RoomCode, word_index: usize },
    RefreshWords { room_id: RoomCode },
    DrawLine {
        room_id: RoomCode,
        #[serde(flatten)]
        stroke: Stroke,
    },
    ClearCanvas { room_id: RoomCode },
    SendMessage { room_id: RoomCode, message: String },
    NextRound { room_id: RoomCode },
    LeaveRoom { room_id: RoomCode },
}

impl ClientAction {
    /// The room this action is addressed to.
    pub fn room_id(&self) -> &RoomCode {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::PlayerReady { room_id, .. }
            | Self::StartGame { room_id }
            | Self::SelectWord { room_id, .. }
            | Self::RefreshWords { room_id }
            | Self::DrawLine { room_id, .. }
            | Self::ClearCanvas { room_id }
            | Self::SendMessage { room_id, .. }
            | Self::NextRound { room_id }
            | Self::LeaveRoom { room_id } => room_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First event on every connection.
    Welcome {
        player_id: PlayerId,
        protocol_version: u32,
    },

    /// Tells a player their role after joining or a drawer change.
    RoleAssigned {
        player_id: PlayerId,
        is_drawer: bool,
        is_owner: bool,
    },

    UserJoined {
        users: Vec<PlayerView>,
        message: String,
    },

    UserLeft {
        users: Vec<PlayerView>,
        message: String,
    },

    GameStateUpdate { snapshot: Box<RoomSnapshot> },

    TimerUpdate { phase: Phase, remaining_secs: u64 },

    /// Private to the drawer: the candidate words for this round.
    WordSelection {
        options: Vec<WordEntry>,
        time_limit_secs: u64,
    },

    /// Public: a word was locked in. Carries hint #0 and the word length.
    WordSelected {
        drawer_id: PlayerId,
        hint: String,
        word_length: usize,
        time_limit_secs: u64,
    },

    UpdateHint { index: u8, hint: String },

    DrawLine {
        player_id: PlayerId,
        #[serde(flatten)]
        stroke: Stroke,
    },

    ClearCanvas,

    ReceiveMessage {
        player_id: Option<PlayerId>,
        nickname: String,
        message: String,
        kind: ChatKind,
        /// Unix epoch milliseconds.
        timestamp: u64,
    },

    ScoreUpdate {
        player_id: PlayerId,
        points: u32,
        scores: Vec<ScoreEntry>,
    },

    RoundEnd {
        reason: RoundEndReason,
        word: Option<WordEntry>,
        scores: Vec<ScoreEntry>,
        next_drawer_index: Option<usize>,
        round: u32,
    },

    GameEnd {
        winners: Vec<ScoreEntry>,
        top_score: u32,
        scores: Vec<ScoreEntry>,
    },

    /// Private rejection notice. `code` follows HTTP conventions
    /// (400 malformed, 403 not allowed, 404 unknown, 409 wrong state).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outbound frame wrapper.
///
/// `seq` increases per connection so clients can detect gaps; `timestamp`
/// is milliseconds since the server started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub timestamp: u64,
    pub event: ServerEvent,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client matches on exact tag and field names, so these
    //! tests pin the JSON shapes.

    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_room_code_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomCode::from("K3X9QZ")).unwrap();
        assert_eq!(json, "\"K3X9QZ\"");
    }

    #[test]
    fn test_room_code_validated_trims() {
        let code = RoomCode::from("  ABC  ").validated().unwrap();
        assert_eq!(code.as_str(), "ABC");
    }

    #[test]
    fn test_room_code_validated_rejects_empty_and_long() {
        assert!(RoomCode::from("   ").validated().is_err());
        let long = "x".repeat(MAX_ROOM_CODE_LEN + 1);
        assert!(RoomCode::from(long).validated().is_err());
    }

    #[test]
    fn test_game_state_serializes_screaming() {
        let json = serde_json::to_string(&GameState::RoundEnd).unwrap();
        assert_eq!(json, "\"ROUND_END\"");
        assert_eq!(GameState::GameEnd.to_string(), "GAME_END");
    }

    #[test]
    fn test_game_state_transition_table() {
        use GameState::*;
        assert!(Waiting.can_transition_to(Selecting));
        assert!(Selecting.can_transition_to(Drawing));
        assert!(Selecting.can_transition_to(RoundEnd));
        assert!(Drawing.can_transition_to(RoundEnd));
        assert!(RoundEnd.can_transition_to(Selecting));
        assert!(RoundEnd.can_transition_to(GameEnd));
        assert!(GameEnd.can_transition_to(Selecting));

        assert!(!Waiting.can_transition_to(Drawing));
        assert!(!Drawing.can_transition_to(Selecting));
        assert!(!RoundEnd.can_transition_to(Drawing));
        assert!(!GameEnd.can_transition_to(Waiting));
    }

    #[test]
    fn test_game_state_mid_round() {
        assert!(GameState::Selecting.is_mid_round());
        assert!(GameState::Drawing.is_mid_round());
        assert!(!GameState::Waiting.is_mid_round());
        assert!(!GameState::RoundEnd.is_mid_round());
    }

    #[test]
    fn test_round_end_reason_snake_case() {
        let json = serde_json::to_string(&RoundEndReason::DrawerDisconnected).unwrap();
        assert_eq!(json, "\"drawer_disconnected\"");
    }

    #[test]
    fn test_join_room_action_json_format() {
        let json = r#"{"type":"join_room","room_id":"ROOM1","nickname":"ann"}"#;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            ClientAction::JoinRoom {
                room_id: RoomCode::from("ROOM1"),
                nickname: "ann".into(),
            }
        );
    }

    #[test]
    fn test_draw_line_action_is_flat() {
        let json = r##"{
            "type": "draw_line",
            "room_id": "R",
            "start_x": 1.0, "start_y": 2.0, "end_x": 3.0, "end_y": 4.5,
            "color": "#ff0000", "line_width": 3
        }"##;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        match action {
            ClientAction::DrawLine { room_id, stroke } => {
                assert_eq!(room_id.as_str(), "R");
                assert_eq!(stroke.end_y, 4.5);
                assert_eq!(stroke.line_width, 3.0);
            }
            other => panic!("expected DrawLine, got {other:?}"),
        }
    }

    #[test]
    fn test_action_without_room_id_is_rejected() {
        let result: Result<ClientAction, _> = serde_json::from_str(r#"{"type":"start_game"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        let result: Result<ClientAction, _> =
            serde_json::from_str(r#"{"type":"fly_to_moon","room_id":"R"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_room_id_accessor() {
        let action = ClientAction::NextRound {
            room_id: RoomCode::from("Z"),
        };
        assert_eq!(action.room_id().as_str(), "Z");
    }

    #[test]
    fn test_stroke_validate() {
        let mut stroke = Stroke {
            start_x: 0.0,
            start_y: 0.0,
            end_x: 10.0,
            end_y: 10.0,
            color: "#000".into(),
            line_width: 4.0,
        };
        assert!(stroke.validate().is_ok());

        stroke.end_x = f64::NAN;
        assert!(stroke.validate().is_err());

        stroke.end_x = 1.0;
        stroke.line_width = 0.0;
        assert!(stroke.validate().is_err());

        stroke.line_width = 2.0;
        stroke.color = String::new();
        assert!(stroke.validate().is_err());
    }

    #[test]
    fn test_round_end_event_json_format() {
        let event = ServerEvent::RoundEnd {
            reason: RoundEndReason::AllGuessed,
            word: Some(WordEntry::new("apple", "5 letters · fruit · red or green")),
            scores: vec![],
            next_drawer_index: Some(2),
            round: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "round_end");
        assert_eq!(json["reason"], "all_guessed");
        assert_eq!(json["word"]["word"], "apple");
        assert_eq!(json["next_drawer_index"], 2);
    }

    #[test]
    fn test_error_event_json_format() {
        let event = ServerEvent::Error {
            code: 403,
            message: "only the owner can start the game".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], 403);
    }

    #[test]
    fn test_envelope_wraps_event() {
        let envelope = Envelope {
            seq: 3,
            timestamp: 1500,
            event: ServerEvent::TimerUpdate {
                phase: Phase::Drawing,
                remaining_secs: 42,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["seq"], 3);
        assert_eq!(json["event"]["type"], "timer_update");
        assert_eq!(json["event"]["phase"], "drawing");
        assert_eq!(json["event"]["remaining_secs"], 42);
    }

    #[test]
    fn test_word_entry_letter_count() {
        assert_eq!(WordEntry::new("苹果", "").letter_count(), 2);
        assert_eq!(WordEntry::new("kite", "").letter_count(), 4);
        assert_eq!(WordEntry::new("ice cream", "").letter_count(), 8);
    }
}
