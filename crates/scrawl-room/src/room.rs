//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Commands arrive over a bounded mpsc channel and deadline events come
//! from the room's own countdown. Both are polled from a single
//! `tokio::select!` loop, so a player action and a timer expiry for the
//! same room never run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use scrawl_protocol::{GameState, PlayerId, Recipient, RoomCode, ServerEvent};
use tokio::sync::{mpsc, oneshot};

use crate::session::{LeaveOutcome, Outbox, Room, RoomAction};
use crate::{RoomConfig, RoomError, WordProvider};

/// Channel sender for delivering events to a player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a room actor through its channel.
///
/// Variants carrying a `oneshot::Sender` are request/reply: the caller
/// waits for the outcome on that channel.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        nickname: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<LeaveOutcome, RoomError>>,
    },

    /// A player action. Rejections go back to the player as an `error`
    /// event, not to the caller.
    Action {
        player_id: PlayerId,
        action: RoomAction,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// A summary of a room, without the per-player detail of a snapshot.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub state: GameState,
    pub player_count: usize,
    pub max_players: usize,
    pub owner_id: Option<PlayerId>,
    pub current_round: u32,
    pub max_rounds: u32,
}

/// Handle to a running room actor.
///
/// Cheap to clone. `instance` distinguishes successive actors created for
/// the same room code.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    instance: u64,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Whether the actor behind this handle has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Adds a player. Events for the player go to `sender`.
    pub async fn join(
        &self,
        player_id: PlayerId,
        nickname: String,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            player_id,
            nickname,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes a player. [`LeaveOutcome::Empty`] means the actor has
    /// stopped.
    pub async fn leave(&self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            player_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Delivers a player action (fire-and-forget).
    pub async fn act(&self, player_id: PlayerId, action: RoomAction) -> Result<(), RoomError> {
        self.send(RoomCommand::Action { player_id, action }).await
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Stops the actor. Its countdown is cancelled first.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor<W> {
    room: Room<W>,
    instance: u64,
    senders: HashMap<PlayerId, PlayerSender>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<W: WordProvider> RoomActor<W> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.code(), instance = self.instance, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::debug!(room_id = %self.room.code(), "all handles dropped");
                        break;
                    };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                event = self.room.next_deadline_event() => {
                    let out = self.room.on_deadline(event);
                    self.dispatch(out);
                }
            }
        }

        self.room.shutdown();
        tracing::info!(room_id = %self.room.code(), instance = self.instance, "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                player_id,
                nickname,
                sender,
                reply,
            } => {
                let result = self.room.join(player_id, &nickname).map(|out| {
                    self.senders.insert(player_id, sender);
                    out
                });
                match result {
                    Ok(out) => {
                        self.dispatch(out);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
                true
            }
            RoomCommand::Leave { player_id, reply } => match self.room.leave(player_id) {
                Ok((outcome, out)) => {
                    self.senders.remove(&player_id);
                    self.dispatch(out);
                    let _ = reply.send(Ok(outcome));
                    outcome != LeaveOutcome::Empty
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                    true
                }
            },
            RoomCommand::Action { player_id, action } => {
                let name = action.name();
                match self.room.handle(player_id, action) {
                    Ok(out) => self.dispatch(out),
                    Err(e) => {
                        tracing::debug!(
                            room_id = %self.room.code(),
                            %player_id,
                            action = name,
                            error = %e,
                            "action rejected"
                        );
                        self.send_to(
                            player_id,
                            ServerEvent::Error {
                                code: e.code(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
                true
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
                true
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room.code(), "room shutting down");
                false
            }
        }
    }

    /// Delivers events to their recipients in member order.
    fn dispatch(&self, out: Outbox) {
        for (recipient, event) in out {
            match recipient {
                Recipient::All => {
                    for player in self.room.players() {
                        self.send_to(player.id, event.clone());
                    }
                }
                Recipient::Player(pid) => self.send_to(pid, event),
                Recipient::AllExcept(excluded) => {
                    for player in self.room.players() {
                        if player.id != excluded {
                            self.send_to(player.id, event.clone());
                        }
                    }
                }
            }
        }
    }

    /// Silently drops the event if the player's connection is gone.
    fn send_to(&self, player_id: PlayerId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.room.code().clone(),
            state: self.room.state(),
            player_count: self.room.len(),
            max_players: self.room.config().max_players,
            owner_id: self.room.owner_id(),
            current_round: self.room.current_round(),
            max_rounds: self.room.config().max_rounds,
        }
    }
}

/// Spawns a room actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room<W: WordProvider>(
    code: RoomCode,
    instance: u64,
    config: RoomConfig,
    words: Arc<W>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        room: Room::new(code.clone(), config, words),
        instance,
        senders: HashMap::new(),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        code,
        instance,
        sender: tx,
    }
}
