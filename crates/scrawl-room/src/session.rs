//! The room session: a synchronous state machine for one room.
//!
//! [`Room`] owns the player list, the turn state and the room's deadline
//! countdown. Every operation either rejects the request with a
//! [`RoomError`] and leaves the room untouched, or applies it and returns
//! the events to deliver as `(Recipient, ServerEvent)` pairs. Nothing here
//! performs I/O; the room actor in [`crate::room`] serializes calls and
//! delivers the returned events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::seq::IndexedRandom;
use scrawl_protocol::{
    ChatKind, GameState, Phase, PlayerId, PlayerView, Recipient, RoomCode, RoomSnapshot,
    RoundEndReason, ScoreEntry, ServerEvent, Stroke, WordEntry,
};
use scrawl_timer::{Countdown, CountdownConfig, CountdownEvent, ceil_secs};

use crate::words::HINT_LEVELS;
use crate::{RoomConfig, RoomError, WordProvider};

/// Events produced by one room operation, in delivery order.
pub type Outbox = Vec<(Recipient, ServerEvent)>;

/// Nickname used for system chat lines.
pub const SYSTEM_NICKNAME: &str = "system";

/// A player action routed to a room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    SetReady(bool),
    StartGame,
    SelectWord(usize),
    RefreshWords,
    DrawLine(Stroke),
    ClearCanvas,
    SendMessage(String),
    NextRound,
}

impl RoomAction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetReady(_) => "player_ready",
            Self::StartGame => "start_game",
            Self::SelectWord(_) => "select_word",
            Self::RefreshWords => "refresh_words",
            Self::DrawLine(_) => "draw_line",
            Self::ClearCanvas => "clear_canvas",
            Self::SendMessage(_) => "send_message",
            Self::NextRound => "next_round",
        }
    }
}

/// What is left of a room after a player leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Players remain; the count is included.
    Remaining(usize),
    /// The last player left. The room must be destroyed.
    Empty,
}

/// What a chat line turned out to be when checked against the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    /// Not a correct guess; the line is ordinary chat.
    NotAGuess,
    /// A correct guess. `first` is true for the round's first solver.
    Correct { first: bool },
    /// The player had already guessed this round.
    AlreadyGuessed,
    /// The drawer typed the word.
    DrawerRevealed,
}

/// A member of a room.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub is_drawer: bool,
    pub is_owner: bool,
    pub is_ready: bool,
    pub guessed_correctly: bool,
    pub score: u32,
}

impl Player {
    fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            nickname: self.nickname.clone(),
            is_drawer: self.is_drawer,
            is_owner: self.is_owner,
            is_ready: self.is_ready,
            guessed_correctly: self.guessed_correctly,
            score: self.score,
        }
    }

    fn score_entry(&self) -> ScoreEntry {
        ScoreEntry {
            player_id: self.id,
            nickname: self.nickname.clone(),
            score: self.score,
        }
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One room's session state.
///
/// Invariants held between operations:
///
/// - At most one player has `is_drawer` set, and in `SELECTING` and
///   `DRAWING` exactly one does.
/// - `current_word` is set only in `DRAWING`.
/// - At most one countdown runs, and only in `SELECTING` or `DRAWING`.
/// - Only the first correct guesser of a round scores.
pub struct Room<W> {
    code: RoomCode,
    config: RoomConfig,
    words: Arc<W>,
    players: Vec<Player>,
    state: GameState,
    owner_id: Option<PlayerId>,
    current_drawer_index: usize,
    current_word: Option<WordEntry>,
    word_options: Vec<WordEntry>,
    hints_released: u8,
    current_round: u32,
    scores: HashMap<PlayerId, u32>,
    round_has_first_guess: bool,
    last_word: Option<WordEntry>,
    last_reported_secs: Option<u64>,
    pub(crate) countdown: Countdown<Phase>,
}

impl<W: WordProvider> Room<W> {
    /// Creates an empty room in `WAITING`.
    pub fn new(code: RoomCode, config: RoomConfig, words: Arc<W>) -> Self {
        let countdown = Countdown::new(CountdownConfig::with_tick_interval(config.tick_interval));
        Self {
            code,
            config,
            words,
            players: Vec::new(),
            state: GameState::Waiting,
            owner_id: None,
            current_drawer_index: 0,
            current_word: None,
            word_options: Vec::new(),
            hints_released: 0,
            current_round: 0,
            scores: HashMap::new(),
            round_has_first_guess: false,
            last_word: None,
            last_reported_secs: None,
            countdown,
        }
    }

    // -- accessors -------------------------------------------------------

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    /// Members in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn owner_id(&self) -> Option<PlayerId> {
        self.owner_id
    }

    /// The player currently flagged as drawer.
    pub fn drawer_id(&self) -> Option<PlayerId> {
        self.players.iter().find(|p| p.is_drawer).map(|p| p.id)
    }

    pub fn current_drawer_index(&self) -> usize {
        self.current_drawer_index
    }

    /// The locked-in word. Only set while drawing.
    pub fn current_word(&self) -> Option<&WordEntry> {
        self.current_word.as_ref()
    }

    pub fn word_options(&self) -> &[WordEntry] {
        &self.word_options
    }

    pub fn hints_released(&self) -> u8 {
        self.hints_released
    }

    /// Zero-based round counter.
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn score_of(&self, id: PlayerId) -> Option<u32> {
        self.scores.get(&id).copied()
    }

    /// The room's deadline countdown.
    pub fn countdown(&self) -> &Countdown<Phase> {
        &self.countdown
    }

    /// Waits for the next tick or expiry of the room's countdown. Pends
    /// forever while no countdown runs.
    pub async fn next_deadline_event(&mut self) -> CountdownEvent<Phase> {
        self.countdown.wait().await
    }

    // -- dispatch ----------------------------------------------------------

    /// Applies `action` on behalf of `sender`.
    pub fn handle(&mut self, sender: PlayerId, action: RoomAction) -> Result<Outbox, RoomError> {
        self.require_member(sender)?;
        match action {
            RoomAction::SetReady(ready) => self.set_ready(sender, ready),
            RoomAction::StartGame => self.start_game(sender),
            RoomAction::SelectWord(index) => self.select_word(sender, index),
            RoomAction::RefreshWords => self.refresh_words(sender),
            RoomAction::DrawLine(stroke) => self.draw_line(sender, stroke),
            RoomAction::ClearCanvas => self.clear_canvas(sender),
            RoomAction::SendMessage(text) => self.send_message(sender, &text),
            RoomAction::NextRound => self.next_round(sender),
        }
    }

    // -- membership --------------------------------------------------------

    /// Adds a player. The first player becomes owner and provisional
    /// drawer. Joining mid-game is allowed; the newcomer starts at 0
    /// points and guesses from the next word on.
    pub fn join(&mut self, player_id: PlayerId, nickname: &str) -> Result<Outbox, RoomError> {
        let nickname = validate_nickname(&self.config, nickname)?;
        if self.index_of(player_id).is_some() {
            return Err(RoomError::AlreadyInRoom(player_id, self.code.clone()));
        }
        if self.players.len() >= self.config.max_players {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        let first = self.players.is_empty();
        self.players.push(Player {
            id: player_id,
            nickname: nickname.to_string(),
            is_drawer: first,
            is_owner: first,
            is_ready: false,
            guessed_correctly: false,
            score: 0,
        });
        self.scores.insert(player_id, 0);
        if first {
            self.owner_id = Some(player_id);
            self.current_drawer_index = 0;
        }

        tracing::info!(
            room_id = %self.code,
            %player_id,
            nickname,
            players = self.players.len(),
            "player joined"
        );

        let mut out = vec![
            (
                Recipient::All,
                ServerEvent::UserJoined {
                    users: self.roster(),
                    message: format!("{nickname} joined the room"),
                },
            ),
            (
                Recipient::Player(player_id),
                ServerEvent::RoleAssigned {
                    player_id,
                    is_drawer: first,
                    is_owner: first,
                },
            ),
        ];
        self.push_snapshots(&mut out);
        Ok(out)
    }

    /// Removes a player, repairing drawer, owner and round state.
    ///
    /// A departing drawer ends an in-progress round with
    /// `drawer_disconnected`; the drawer role then moves to whoever now
    /// occupies the (clamped) drawer index. A departing owner hands
    /// ownership to the first remaining player.
    pub fn leave(&mut self, player_id: PlayerId) -> Result<(LeaveOutcome, Outbox), RoomError> {
        let index = self
            .index_of(player_id)
            .ok_or_else(|| RoomError::NotInRoom(player_id, self.code.clone()))?;

        let removed = self.players.remove(index);
        self.scores.remove(&player_id);
        if index < self.current_drawer_index {
            self.current_drawer_index -= 1;
        }

        tracing::info!(
            room_id = %self.code,
            %player_id,
            players = self.players.len(),
            was_drawer = removed.is_drawer,
            was_owner = removed.is_owner,
            "player left"
        );

        if self.players.is_empty() {
            self.countdown.cancel();
            self.owner_id = None;
            tracing::info!(room_id = %self.code, "room is empty");
            return Ok((LeaveOutcome::Empty, Vec::new()));
        }

        let mut out = Vec::new();

        if removed.is_owner {
            let heir = &mut self.players[0];
            heir.is_owner = true;
            self.owner_id = Some(heir.id);
            tracing::info!(room_id = %self.code, owner = %heir.id, "ownership transferred");
        }

        if removed.is_drawer {
            if self.state.is_mid_round() {
                out.extend(self.end_round(RoundEndReason::DrawerDisconnected));
            }
            if self.state != GameState::GameEnd {
                let index = self.current_drawer_index.min(self.players.len() - 1);
                self.set_drawer(index);
                let heir = &self.players[index];
                tracing::info!(room_id = %self.code, drawer = %heir.id, "drawer reassigned");
                out.push((
                    Recipient::Player(heir.id),
                    ServerEvent::RoleAssigned {
                        player_id: heir.id,
                        is_drawer: true,
                        is_owner: heir.is_owner,
                    },
                ));
            }
        } else if self.state == GameState::Drawing && self.all_guessers_correct() {
            out.extend(self.end_round(RoundEndReason::AllGuessed));
        }

        out.push((
            Recipient::All,
            ServerEvent::UserLeft {
                users: self.roster(),
                message: format!("{} left the room", removed.nickname),
            },
        ));
        self.push_snapshots(&mut out);
        Ok((LeaveOutcome::Remaining(self.players.len()), out))
    }

    /// Sets a player's ready flag. Only meaningful before a game starts.
    pub fn set_ready(&mut self, player_id: PlayerId, ready: bool) -> Result<Outbox, RoomError> {
        self.require_member(player_id)?;
        if !self.state.can_start_game() {
            return Err(RoomError::InvalidState {
                action: "change ready state",
                state: self.state,
            });
        }
        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            player.is_ready = ready;
        }
        tracing::debug!(room_id = %self.code, %player_id, ready, "ready state changed");

        let mut out = Vec::new();
        self.push_snapshots(&mut out);
        Ok(out)
    }

    // -- turn engine -------------------------------------------------------

    /// Starts a game (or a rematch from `GAME_END`).
    ///
    /// Requires the owner, enough players, and every non-owner ready.
    /// Scores and the round counter are reset, then the first
    /// round begins.
    pub fn start_game(&mut self, player_id: PlayerId) -> Result<Outbox, RoomError> {
        self.require_owner(player_id, "start the game")?;
        if !self.state.can_start_game() {
            return Err(RoomError::InvalidState {
                action: "start the game",
                state: self.state,
            });
        }
        if self.players.len() < self.config.min_players {
            return Err(RoomError::NotEnoughPlayers {
                have: self.players.len(),
                need: self.config.min_players,
            });
        }
        let not_ready: Vec<String> = self
            .players
            .iter()
            .filter(|p| !p.is_owner && !p.is_ready)
            .map(|p| p.nickname.clone())
            .collect();
        if !not_ready.is_empty() {
            return Err(RoomError::PlayersNotReady(not_ready));
        }

        for player in &mut self.players {
            player.score = 0;
            player.guessed_correctly = false;
            self.scores.insert(player.id, 0);
        }
        self.current_round = 0;
        self.current_drawer_index = 0;
        self.last_word = None;

        tracing::info!(
            room_id = %self.code,
            players = self.players.len(),
            max_rounds = self.config.max_rounds,
            "game started"
        );
        Ok(self.start_new_round())
    }

    /// Rotates the drawer, offers fresh words and enters `SELECTING`.
    ///
    /// The drawer index advances before the first round as well, so
    /// round one is drawn by the second player in join order.
    pub fn start_new_round(&mut self) -> Outbox {
        let mut out = Vec::new();
        if self.players.is_empty() {
            return out;
        }

        let previous = self.drawer_id();
        let index = (self.current_drawer_index + 1) % self.players.len();
        self.set_drawer(index);
        let drawer = self.players[index].id;

        for player in &mut self.players {
            player.guessed_correctly = false;
        }
        self.current_word = None;
        self.hints_released = 0;
        self.round_has_first_guess = false;
        self.word_options = self.words.pick_random_words(self.config.word_choices);
        if self.word_options.is_empty() {
            tracing::warn!(room_id = %self.code, "word provider returned no words");
        }

        self.transition(GameState::Selecting);
        self.start_countdown(Phase::Selecting, self.config.selection_time);

        tracing::info!(
            room_id = %self.code,
            round = self.current_round,
            %drawer,
            "round started"
        );

        if previous != Some(drawer) {
            if let Some(prev) = previous.and_then(|id| self.player(id)) {
                out.push((
                    Recipient::Player(prev.id),
                    ServerEvent::RoleAssigned {
                        player_id: prev.id,
                        is_drawer: false,
                        is_owner: prev.is_owner,
                    },
                ));
            }
        }
        out.push((
            Recipient::Player(drawer),
            ServerEvent::RoleAssigned {
                player_id: drawer,
                is_drawer: true,
                is_owner: self.owner_id == Some(drawer),
            },
        ));
        out.push((
            Recipient::Player(drawer),
            ServerEvent::WordSelection {
                options: self.word_options.clone(),
                time_limit_secs: self.config.selection_time.as_secs(),
            },
        ));
        out.push((
            Recipient::All,
            system_line(format!(
                "Round {} of {}: {} is choosing a word",
                self.current_round + 1,
                self.config.max_rounds,
                self.players[index].nickname
            )),
        ));
        self.push_snapshots(&mut out);
        out
    }

    /// Locks in one of the offered words and starts the drawing phase.
    pub fn select_word(&mut self, player_id: PlayerId, index: usize) -> Result<Outbox, RoomError> {
        self.require_state(GameState::Selecting, "select a word")?;
        self.require_drawer(player_id, "select a word")?;
        let entry = self.word_options.get(index).cloned().ok_or_else(|| {
            RoomError::InvalidPayload(format!(
                "word index {index} out of range (0..{})",
                self.word_options.len()
            ))
        })?;
        Ok(self.lock_word(entry))
    }

    /// Replaces the offered words and restarts the selection countdown.
    pub fn refresh_words(&mut self, player_id: PlayerId) -> Result<Outbox, RoomError> {
        self.require_state(GameState::Selecting, "refresh words")?;
        self.require_drawer(player_id, "refresh words")?;

        self.word_options = self.words.pick_random_words(self.config.word_choices);
        self.start_countdown(Phase::Selecting, self.config.selection_time);
        tracing::debug!(room_id = %self.code, "word options refreshed");

        let mut out = vec![(
            Recipient::Player(player_id),
            ServerEvent::WordSelection {
                options: self.word_options.clone(),
                time_limit_secs: self.config.selection_time.as_secs(),
            },
        )];
        self.push_snapshots(&mut out);
        Ok(out)
    }

    /// Relays a stroke to everyone but the drawer.
    pub fn draw_line(&mut self, player_id: PlayerId, stroke: Stroke) -> Result<Outbox, RoomError> {
        self.require_state(GameState::Drawing, "draw")?;
        self.require_drawer(player_id, "draw")?;
        stroke.validate()?;
        Ok(vec![(
            Recipient::AllExcept(player_id),
            ServerEvent::DrawLine { player_id, stroke },
        )])
    }

    pub fn clear_canvas(&mut self, player_id: PlayerId) -> Result<Outbox, RoomError> {
        self.require_state(GameState::Drawing, "clear the canvas")?;
        self.require_drawer(player_id, "clear the canvas")?;
        Ok(vec![(Recipient::All, ServerEvent::ClearCanvas)])
    }

    /// Handles a chat line: either a guess or ordinary chat.
    ///
    /// Correct guesses are never echoed. The drawer typing the word is
    /// rejected without reaching anyone.
    pub fn send_message(&mut self, player_id: PlayerId, text: &str) -> Result<Outbox, RoomError> {
        let nickname = self
            .player(player_id)
            .map(|p| p.nickname.clone())
            .ok_or_else(|| RoomError::NotInRoom(player_id, self.code.clone()))?;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RoomError::InvalidPayload("message is empty".into()));
        }
        if trimmed.chars().count() > self.config.max_message_len {
            return Err(RoomError::InvalidPayload(format!(
                "message longer than {} characters",
                self.config.max_message_len
            )));
        }

        let (outcome, mut out) = self.record_guess(player_id, text);
        match outcome {
            GuessOutcome::NotAGuess => out.push((
                Recipient::All,
                ServerEvent::ReceiveMessage {
                    player_id: Some(player_id),
                    nickname,
                    message: text.to_string(),
                    kind: ChatKind::Chat,
                    timestamp: unix_millis(),
                },
            )),
            GuessOutcome::DrawerRevealed => return Err(RoomError::DrawerCannotGuess),
            GuessOutcome::Correct { .. } | GuessOutcome::AlreadyGuessed => {}
        }
        Ok(out)
    }

    /// Checks `text` against the current word on behalf of `guesser`.
    ///
    /// Matching ignores surrounding whitespace and letter case. Only the
    /// round's first correct guesser scores; once every ready non-drawer
    /// has guessed, the round ends with `all_guessed`.
    pub fn record_guess(&mut self, guesser: PlayerId, text: &str) -> (GuessOutcome, Outbox) {
        if self.state != GameState::Drawing {
            return (GuessOutcome::NotAGuess, Vec::new());
        }
        let Some(word) = &self.current_word else {
            return (GuessOutcome::NotAGuess, Vec::new());
        };
        if !matches_word(text, &word.word) {
            return (GuessOutcome::NotAGuess, Vec::new());
        }
        let Some(index) = self.index_of(guesser) else {
            return (GuessOutcome::NotAGuess, Vec::new());
        };

        let player = &self.players[index];
        if player.is_drawer {
            tracing::debug!(room_id = %self.code, %guesser, "drawer typed the word");
            return (GuessOutcome::DrawerRevealed, Vec::new());
        }
        if player.guessed_correctly {
            return (
                GuessOutcome::AlreadyGuessed,
                vec![(
                    Recipient::Player(guesser),
                    system_line("You already guessed the word".to_string()),
                )],
            );
        }

        let first = !self.round_has_first_guess;
        self.round_has_first_guess = true;
        let points = if first { self.config.first_guess_points } else { 0 };

        let player = &mut self.players[index];
        player.guessed_correctly = true;
        player.score += points;
        let nickname = player.nickname.clone();
        self.scores.insert(guesser, player.score);

        tracing::info!(room_id = %self.code, %guesser, first, points, "correct guess");

        let mut out = vec![
            (
                Recipient::All,
                system_line(format!("{nickname} guessed the word!")),
            ),
            (
                Recipient::All,
                ServerEvent::ScoreUpdate {
                    player_id: guesser,
                    points,
                    scores: self.scoreboard(),
                },
            ),
        ];
        if self.all_guessers_correct() {
            out.extend(self.end_round(RoundEndReason::AllGuessed));
        }
        (GuessOutcome::Correct { first }, out)
    }

    /// Advances past `ROUND_END`: either the next round or the game end.
    pub fn next_round(&mut self, player_id: PlayerId) -> Result<Outbox, RoomError> {
        self.require_owner(player_id, "advance the round")?;
        self.require_state(GameState::RoundEnd, "advance the round")?;

        self.current_round += 1;
        if self.current_round >= self.config.max_rounds {
            Ok(self.finish_game())
        } else {
            Ok(self.start_new_round())
        }
    }

    /// Ends the round in progress and reveals the word.
    ///
    /// A no-op outside `SELECTING` and `DRAWING`, so racing end
    /// conditions (last guess vs. deadline) end a round only once.
    pub fn end_round(&mut self, reason: RoundEndReason) -> Outbox {
        if !self.state.is_mid_round() {
            tracing::debug!(room_id = %self.code, %reason, state = %self.state, "end_round ignored");
            return Vec::new();
        }

        self.countdown.cancel();
        self.last_reported_secs = None;
        for player in &mut self.players {
            player.guessed_correctly = false;
        }
        self.hints_released = 0;
        self.word_options.clear();
        let revealed = self.current_word.take();
        self.last_word = revealed.clone();

        let n = self.players.len();
        let next_drawer_index = (n > 0).then(|| (self.current_drawer_index.min(n - 1) + 1) % n);

        self.transition(GameState::RoundEnd);
        tracing::info!(
            room_id = %self.code,
            round = self.current_round,
            %reason,
            word = revealed.as_ref().map(|w| w.word.as_str()).unwrap_or("-"),
            "round ended"
        );

        let mut out = vec![(
            Recipient::All,
            ServerEvent::RoundEnd {
                reason,
                word: revealed,
                scores: self.scoreboard(),
                next_drawer_index,
                round: self.current_round,
            },
        )];
        self.push_snapshots(&mut out);
        out
    }

    /// Highest-scoring players among current members, with the top score.
    /// Ties produce several winners.
    pub fn compute_winner(&self) -> (Vec<ScoreEntry>, u32) {
        let top = self.players.iter().map(|p| p.score).max().unwrap_or(0);
        let winners = self
            .players
            .iter()
            .filter(|p| p.score == top)
            .map(Player::score_entry)
            .collect();
        (winners, top)
    }

    /// Reacts to the room's countdown: timer updates and hint releases on
    /// ticks, auto-pick or round end on expiry.
    pub fn on_deadline(&mut self, event: CountdownEvent<Phase>) -> Outbox {
        let mut out = Vec::new();
        match event {
            CountdownEvent::Tick {
                phase,
                elapsed,
                total,
                ..
            } => {
                self.report_time(phase, event.remaining_secs(), &mut out);
                if phase == Phase::Drawing && self.state == GameState::Drawing {
                    self.release_due_hints(elapsed, total, &mut out);
                }
            }
            CountdownEvent::Expired { phase, .. } => match (phase, self.state) {
                (Phase::Selecting, GameState::Selecting) => {
                    self.report_time(phase, 0, &mut out);
                    match self.word_options.choose(&mut rand::rng()).cloned() {
                        Some(entry) => {
                            tracing::info!(room_id = %self.code, "selection timed out, auto-picking a word");
                            out.extend(self.lock_word(entry));
                        }
                        None => {
                            tracing::warn!(room_id = %self.code, "selection timed out with no words to pick");
                            out.extend(self.end_round(RoundEndReason::Timeout));
                        }
                    }
                }
                (Phase::Drawing, GameState::Drawing) => {
                    self.report_time(phase, 0, &mut out);
                    out.extend(self.end_round(RoundEndReason::Timeout));
                }
                (phase, state) => {
                    tracing::debug!(room_id = %self.code, ?phase, %state, "stale deadline ignored");
                }
            },
        }
        out
    }

    /// The room as seen by `viewer`. Only the drawer's snapshot carries
    /// the word and the word options.
    pub fn snapshot_for(&self, viewer: PlayerId) -> RoomSnapshot {
        let drawer_id = self.drawer_id();
        let is_drawer = drawer_id == Some(viewer);
        let remaining = self.countdown.remaining();

        RoomSnapshot {
            room_id: self.code.clone(),
            state: self.state,
            players: self.roster(),
            owner_id: self.owner_id,
            current_drawer_index: drawer_id.map(|_| self.current_drawer_index),
            drawer_id,
            word: self
                .current_word
                .as_ref()
                .filter(|_| is_drawer)
                .map(|w| w.word.clone()),
            word_length: self.current_word.as_ref().map(WordEntry::letter_count),
            current_hint: self.current_hint(),
            hints_released: self.hints_released,
            remaining_secs: remaining.map(ceil_secs),
            time_limit_secs: self.countdown.total().map(|t| t.as_secs()),
            deadline_ms: remaining.map(|r| unix_millis() + r.as_millis() as u64),
            current_round: self.current_round,
            max_rounds: self.config.max_rounds,
            scores: self.scoreboard(),
            ready: self
                .players
                .iter()
                .filter(|p| p.is_ready)
                .map(|p| p.id)
                .collect(),
            word_options: if is_drawer {
                self.word_options.clone()
            } else {
                Vec::new()
            },
            last_word: self.last_word.as_ref().map(|w| w.word.clone()),
        }
    }

    /// Stops the room's countdown. Called before the room is destroyed.
    pub fn shutdown(&mut self) {
        self.countdown.cancel();
    }

    // -- internals ---------------------------------------------------------

    fn finish_game(&mut self) -> Outbox {
        self.countdown.cancel();
        self.transition(GameState::GameEnd);

        for player in &mut self.players {
            player.is_drawer = false;
            player.is_ready = false;
            player.guessed_correctly = false;
        }
        self.current_word = None;
        self.word_options.clear();
        self.hints_released = 0;

        let (winners, top_score) = self.compute_winner();
        tracing::info!(
            room_id = %self.code,
            winners = winners.len(),
            top_score,
            "game ended"
        );

        let mut out = vec![(
            Recipient::All,
            ServerEvent::GameEnd {
                winners,
                top_score,
                scores: self.scoreboard(),
            },
        )];
        self.push_snapshots(&mut out);
        out
    }

    fn lock_word(&mut self, entry: WordEntry) -> Outbox {
        let drawer_id = self.drawer_id();
        let word_length = entry.letter_count();
        let hint = self.words.hint_at(&entry, 0);

        self.word_options.clear();
        self.current_word = Some(entry);
        self.hints_released = 1;
        self.transition(GameState::Drawing);
        self.start_countdown(Phase::Drawing, self.config.drawing_time);

        let mut out = Vec::new();
        if let Some(drawer_id) = drawer_id {
            out.push((
                Recipient::All,
                ServerEvent::WordSelected {
                    drawer_id,
                    hint,
                    word_length,
                    time_limit_secs: self.config.drawing_time.as_secs(),
                },
            ));
        }
        self.push_snapshots(&mut out);
        out
    }

    /// Releases every hint whose threshold the drawing phase has passed,
    /// in order.
    fn release_due_hints(&mut self, elapsed: Duration, total: Duration, out: &mut Outbox) {
        let progress = if total.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64() / total.as_secs_f64()
        };

        while self.hints_released > 0 && self.hints_released < HINT_LEVELS {
            let index = self.hints_released;
            let threshold = self.config.hint_schedule[index as usize - 1];
            if progress < threshold {
                break;
            }
            let Some(word) = &self.current_word else {
                break;
            };
            let hint = self.words.hint_at(word, index);
            self.hints_released = index + 1;
            tracing::debug!(room_id = %self.code, index, "hint released");
            out.push((Recipient::All, ServerEvent::UpdateHint { index, hint }));
        }
    }

    fn report_time(&mut self, phase: Phase, secs: u64, out: &mut Outbox) {
        if self.last_reported_secs == Some(secs) {
            return;
        }
        self.last_reported_secs = Some(secs);
        out.push((
            Recipient::All,
            ServerEvent::TimerUpdate {
                phase,
                remaining_secs: secs,
            },
        ));
    }

    fn start_countdown(&mut self, phase: Phase, duration: Duration) {
        self.last_reported_secs = None;
        self.countdown.start(phase, duration);
    }

    fn transition(&mut self, to: GameState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal transition {} -> {}",
            self.state,
            to
        );
        tracing::debug!(room_id = %self.code, from = %self.state, %to, "state transition");
        self.state = to;
    }

    fn set_drawer(&mut self, index: usize) {
        for (i, player) in self.players.iter_mut().enumerate() {
            player.is_drawer = i == index;
        }
        self.current_drawer_index = index;
    }

    fn current_hint(&self) -> Option<String> {
        let word = self.current_word.as_ref()?;
        let index = self.hints_released.checked_sub(1)?;
        Some(self.words.hint_at(word, index))
    }

    /// True once every required guesser has guessed the word.
    ///
    /// Required guessers are the non-drawers who readied up. The owner is
    /// only implicitly ready and mid-game joiners never are, so they may
    /// still guess and score without holding the round open. A room with
    /// no ready guesser at all (two players, owner guessing) falls back to
    /// every non-drawer.
    fn all_guessers_correct(&self) -> bool {
        let has_ready_guesser = self.players.iter().any(|p| !p.is_drawer && p.is_ready);
        let mut guessers = self
            .players
            .iter()
            .filter(|p| !p.is_drawer && (p.is_ready || !has_ready_guesser))
            .peekable();
        guessers.peek().is_some() && guessers.all(|p| p.guessed_correctly)
    }

    fn roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::view).collect()
    }

    fn scoreboard(&self) -> Vec<ScoreEntry> {
        self.players.iter().map(Player::score_entry).collect()
    }

    fn push_snapshots(&self, out: &mut Outbox) {
        for player in &self.players {
            out.push((
                Recipient::Player(player.id),
                ServerEvent::GameStateUpdate {
                    snapshot: Box::new(self.snapshot_for(player.id)),
                },
            ));
        }
    }

    fn index_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    fn require_member(&self, id: PlayerId) -> Result<(), RoomError> {
        match self.index_of(id) {
            Some(_) => Ok(()),
            None => Err(RoomError::NotInRoom(id, self.code.clone())),
        }
    }

    fn require_owner(&self, id: PlayerId, action: &'static str) -> Result<(), RoomError> {
        self.require_member(id)?;
        if self.owner_id == Some(id) {
            Ok(())
        } else {
            Err(RoomError::NotOwner(action))
        }
    }

    fn require_drawer(&self, id: PlayerId, action: &'static str) -> Result<(), RoomError> {
        self.require_member(id)?;
        if self.drawer_id() == Some(id) {
            Ok(())
        } else {
            Err(RoomError::NotDrawer(action))
        }
    }

    fn require_state(&self, state: GameState, action: &'static str) -> Result<(), RoomError> {
        if self.state == state {
            Ok(())
        } else {
            Err(RoomError::InvalidState {
                action,
                state: self.state,
            })
        }
    }
}

/// Trims a nickname and checks it against the configured limits.
pub(crate) fn validate_nickname<'a>(
    config: &RoomConfig,
    nickname: &'a str,
) -> Result<&'a str, RoomError> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(RoomError::InvalidPayload("nickname is empty".into()));
    }
    if nickname.chars().count() > config.max_nickname_len {
        return Err(RoomError::InvalidPayload(format!(
            "nickname longer than {} characters",
            config.max_nickname_len
        )));
    }
    Ok(nickname)
}

fn matches_word(text: &str, word: &str) -> bool {
    text.trim().to_lowercase() == word.trim().to_lowercase()
}

fn system_line(message: String) -> ServerEvent {
    ServerEvent::ReceiveMessage {
        player_id: None,
        nickname: SYSTEM_NICKNAME.to_string(),
        message,
        kind: ChatKind::System,
        timestamp: unix_millis(),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WordList;

    fn room() -> Room<WordList> {
        let words = WordList::new(vec![
            WordEntry::new("apple", "5 letters · fruit · red or green"),
            WordEntry::new("cat", "3 letters · animal · says meow"),
            WordEntry::new("kite", "4 letters · toy · flies on a string"),
        ]);
        Room::new(RoomCode::from("ROOM1"), RoomConfig::default(), Arc::new(words))
    }

    #[test]
    fn test_matches_word_ignores_case_and_whitespace() {
        assert!(matches_word("  APPLE ", "apple"));
        assert!(!matches_word("apples", "apple"));
    }

    #[test]
    fn test_first_joiner_is_owner_and_provisional_drawer() {
        let mut r = room();
        r.join(PlayerId(1), "ann").unwrap();
        r.join(PlayerId(2), "bo").unwrap();
        assert_eq!(r.owner_id(), Some(PlayerId(1)));
        assert_eq!(r.drawer_id(), Some(PlayerId(1)));
        assert!(!r.player(PlayerId(2)).unwrap().is_drawer);
    }

    #[test]
    fn test_join_rejects_bad_nicknames() {
        let mut r = room();
        assert!(matches!(
            r.join(PlayerId(1), "   "),
            Err(RoomError::InvalidPayload(_))
        ));
        let long = "x".repeat(25);
        assert!(matches!(
            r.join(PlayerId(1), &long),
            Err(RoomError::InvalidPayload(_))
        ));
        assert!(r.is_empty());
    }

    #[test]
    fn test_join_twice_is_rejected() {
        let mut r = room();
        r.join(PlayerId(1), "ann").unwrap();
        assert!(matches!(
            r.join(PlayerId(1), "ann"),
            Err(RoomError::AlreadyInRoom(..))
        ));
    }

    #[test]
    fn test_room_full() {
        let mut r = Room::new(
            RoomCode::from("TINY"),
            RoomConfig {
                max_players: 2,
                ..RoomConfig::default()
            },
            Arc::new(WordList::builtin()),
        );
        r.join(PlayerId(1), "a").unwrap();
        r.join(PlayerId(2), "b").unwrap();
        assert!(matches!(r.join(PlayerId(3), "c"), Err(RoomError::RoomFull(_))));
    }

    #[test]
    fn test_all_guessers_correct_needs_a_guesser() {
        let mut r = room();
        r.join(PlayerId(1), "ann").unwrap();
        // Only the provisional drawer is present.
        assert!(!r.all_guessers_correct());
    }

    #[test]
    fn test_end_round_outside_round_is_noop() {
        let mut r = room();
        r.join(PlayerId(1), "ann").unwrap();
        assert!(r.end_round(RoundEndReason::Timeout).is_empty());
        assert_eq!(r.state(), GameState::Waiting);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(RoomAction::StartGame.name(), "start_game");
        assert_eq!(RoomAction::SendMessage("x".into()).name(), "send_message");
    }
}
