//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Minimum players required to start a game.
    pub min_players: usize,

    /// Maximum players allowed in the room.
    pub max_players: usize,

    /// Rounds per game. The game ends when the round counter reaches this.
    pub max_rounds: u32,

    /// How many candidate words the drawer is offered each round.
    pub word_choices: usize,

    /// How long the drawer has to pick a word before one is auto-picked.
    pub selection_time: Duration,

    /// Length of the drawing window.
    pub drawing_time: Duration,

    /// Fraction of the drawing window elapsed at which hint #1 and hint #2
    /// are released (hint #0 goes out with the word selection).
    pub hint_schedule: [f64; 2],

    /// How often the running countdown is polled for timer updates.
    pub tick_interval: Duration,

    /// Points awarded to the first correct guesser of a round.
    pub first_guess_points: u32,

    /// Longest accepted chat message, in characters.
    pub max_message_len: usize,

    /// Longest accepted nickname, in characters.
    pub max_nickname_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 12,
            max_rounds: 5,
            word_choices: 3,
            selection_time: Duration::from_secs(15),
            drawing_time: Duration::from_secs(80),
            hint_schedule: [0.5, 0.75],
            tick_interval: Duration::from_millis(250),
            first_guess_points: 1,
            max_message_len: 200,
            max_nickname_len: 24,
        }
    }
}

impl RoomConfig {
    /// Fixes out-of-range values so the config is safe to run with.
    ///
    /// - `min_players` is at least 2, `max_players` at least `min_players`.
    /// - `max_rounds` and `word_choices` are at least 1.
    /// - `hint_schedule` entries are clamped to `0.0..=1.0` and ordered.
    /// - Zero durations are replaced by one second.
    pub fn validated(mut self) -> Self {
        if self.min_players < 2 {
            warn!(min_players = self.min_players, "min_players below 2, raising");
            self.min_players = 2;
        }
        if self.max_players < self.min_players {
            warn!(
                max_players = self.max_players,
                min_players = self.min_players,
                "max_players below min_players, raising"
            );
            self.max_players = self.min_players;
        }
        self.max_rounds = self.max_rounds.max(1);
        self.word_choices = self.word_choices.max(1);
        if self.selection_time.is_zero() {
            self.selection_time = Duration::from_secs(1);
        }
        if self.drawing_time.is_zero() {
            self.drawing_time = Duration::from_secs(1);
        }

        let [first, second] = self.hint_schedule.map(|f| {
            if f.is_finite() { f.clamp(0.0, 1.0) } else { 1.0 }
        });
        self.hint_schedule = if first <= second {
            [first, second]
        } else {
            [second, first]
        };
        self
    }
}
