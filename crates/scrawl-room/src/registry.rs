//! Room registry: creates rooms on first join, routes players to them and
//! destroys them when they empty.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use scrawl_protocol::{PlayerId, RoomCode};

use crate::room::spawn_room;
use crate::session::{LeaveOutcome, RoomAction, validate_nickname};
use crate::{PlayerSender, RoomConfig, RoomError, RoomHandle, RoomInfo, WordProvider};

/// Counter distinguishing successive actors for the same room code.
static NEXT_ROOM_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// How often a join retries after racing a room's teardown.
const JOIN_ATTEMPTS: usize = 3;

/// Process-wide map of live rooms, shared by every connection.
///
/// All methods take `&self`. Map guards are never held across an
/// `.await`; handles are cloned out first.
pub struct RoomRegistry<W: WordProvider> {
    /// Live rooms, keyed by room code.
    rooms: DashMap<RoomCode, RoomHandle>,

    /// The room each player is in. A player is in at most one room.
    player_rooms: DashMap<PlayerId, RoomCode>,

    config: RoomConfig,
    words: Arc<W>,
}

impl<W: WordProvider> RoomRegistry<W> {
    /// Creates an empty registry. Rooms use `config` and draw words from
    /// `words`.
    pub fn new(config: RoomConfig, words: W) -> Self {
        Self::with_shared_words(config, Arc::new(words))
    }

    pub fn with_shared_words(config: RoomConfig, words: Arc<W>) -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            config: config.validated(),
            words,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the live room for `code`, spawning one in `WAITING` if there
    /// is none (or only a stopped one).
    pub fn get_or_create(&self, code: &RoomCode) -> RoomHandle {
        match self.rooms.entry(code.clone()) {
            Entry::Occupied(existing) if !existing.get().is_closed() => existing.get().clone(),
            Entry::Occupied(mut stale) => {
                let handle = self.spawn(code);
                stale.insert(handle.clone());
                handle
            }
            Entry::Vacant(slot) => {
                let handle = self.spawn(code);
                slot.insert(handle.clone());
                handle
            }
        }
    }

    pub fn get(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms.get(code).map(|h| h.value().clone())
    }

    /// Puts a player into the room `code`, creating it if needed.
    ///
    /// Fails if the player is already in any room. A join that races the
    /// room's teardown retries against a fresh room.
    pub async fn join(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        nickname: &str,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let code = code.validated()?;
        // A rejected first joiner must not leave an empty room behind.
        validate_nickname(&self.config, nickname)?;
        if let Some(current) = self.player_room(player_id) {
            if current == code {
                return Err(RoomError::AlreadyInRoom(player_id, code));
            }
            return Err(RoomError::InOtherRoom(player_id, current));
        }

        for _ in 0..JOIN_ATTEMPTS {
            let handle = self.get_or_create(&code);
            match handle.join(player_id, nickname.to_string(), sender.clone()).await {
                Ok(()) => {
                    self.player_rooms.insert(player_id, code);
                    return Ok(());
                }
                Err(RoomError::Unavailable(_)) => {
                    tracing::debug!(room_id = %code, "room closed during join, retrying");
                    self.forget(&handle);
                }
                Err(e) => return Err(e),
            }
        }
        Err(RoomError::Unavailable(code))
    }

    /// Takes a player out of their room. The room is destroyed if that
    /// was its last player.
    pub async fn leave(&self, player_id: PlayerId) -> Result<LeaveOutcome, RoomError> {
        let code = self
            .player_room(player_id)
            .ok_or(RoomError::NoRoom(player_id))?;
        self.player_rooms.remove(&player_id);

        let handle = self.get(&code).ok_or(RoomError::NotFound(code))?;
        let result = handle.leave(player_id).await;
        match &result {
            Ok(LeaveOutcome::Empty) => {
                self.forget(&handle);
                tracing::info!(room_id = %handle.code(), "room destroyed");
            }
            Err(RoomError::Unavailable(_)) => self.forget(&handle),
            _ => {}
        }
        result
    }

    /// Routes a player action to the player's room.
    pub async fn dispatch(&self, player_id: PlayerId, action: RoomAction) -> Result<(), RoomError> {
        let code = self
            .player_room(player_id)
            .ok_or(RoomError::NoRoom(player_id))?;
        let handle = self.get(&code).ok_or(RoomError::NotFound(code))?;
        handle.act(player_id, action).await
    }

    /// Shuts a room down and forgets its members.
    pub async fn remove(&self, code: &RoomCode) -> Result<(), RoomError> {
        let (_, handle) = self
            .rooms
            .remove(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        self.player_rooms.retain(|_, room| room != code);
        // An actor that already stopped has nothing left to cancel.
        let _ = handle.shutdown().await;
        tracing::info!(room_id = %code, "room destroyed");
        Ok(())
    }

    pub async fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        let handle = self
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        handle.get_info().await
    }

    /// The room a player is currently in.
    pub fn player_room(&self, player_id: PlayerId) -> Option<RoomCode> {
        self.player_rooms.get(&player_id).map(|r| r.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    fn spawn(&self, code: &RoomCode) -> RoomHandle {
        let instance = NEXT_ROOM_INSTANCE.fetch_add(1, Ordering::Relaxed);
        let handle = spawn_room(
            code.clone(),
            instance,
            self.config.clone(),
            Arc::clone(&self.words),
            DEFAULT_CHANNEL_SIZE,
        );
        tracing::info!(room_id = %code, instance, "room created");
        handle
    }

    /// Drops the registry entry for `handle`'s actor, unless the code has
    /// already been taken over by a newer one.
    fn forget(&self, handle: &RoomHandle) {
        self.rooms
            .remove_if(handle.code(), |_, h| h.instance() == handle.instance());
    }
}
