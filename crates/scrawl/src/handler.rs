//! Per-connection handler: welcome, action routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Assign a `PlayerId` and send `Welcome`
//!   2. Spawn a writer that wraps outbound events in envelopes
//!   3. Loop: receive frames → decode → route to the room registry
//!   4. On exit, leave the room and drain the writer

use std::sync::Arc;
use std::time::Duration;

use scrawl_protocol::{
    ClientAction, Codec, Envelope, PROTOCOL_VERSION, PlayerId, RoomCode, ServerEvent,
};
use scrawl_room::{PlayerSender, RoomAction, RoomError, WordProvider};
use scrawl_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::ScrawlError;
use crate::server::ServerState;

/// Code sent before closing an idle connection.
const IDLE_TIMEOUT_CODE: u16 = 408;

/// How long the writer gets to flush after the reader stops.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Drop guard that takes a player out of their room if the handler exits
/// without doing so itself (e.g. on panic).
///
/// `Drop` is synchronous, so the leave runs on a fire-and-forget task.
struct MembershipGuard<W: WordProvider, C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<W, C>>,
    armed: bool,
}

impl<W: WordProvider, C: Codec> Drop for MembershipGuard<W, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let _ = state.registry.leave(player_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<W, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<W, C>>,
) -> Result<(), ScrawlError>
where
    W: WordProvider,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let player_id = state.next_player_id();
    tracing::info!(%conn_id, %player_id, peer = ?conn.peer_addr(), "player connected");

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), rx, Arc::clone(&state)));
    let writer_abort = writer.abort_handle();

    let _ = tx.send(ServerEvent::Welcome {
        player_id,
        protocol_version: PROTOCOL_VERSION,
    });

    let mut guard = MembershipGuard {
        player_id,
        state: Arc::clone(&state),
        armed: true,
    };

    loop {
        let received = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%player_id, "connection idle, closing");
                    send_error(&tx, IDLE_TIMEOUT_CODE, "idle timeout");
                    break;
                }
            },
            None => conn.recv().await,
        };

        let frame = match received {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) if e.is_recoverable() => {
                tracing::debug!(%player_id, error = %e, "unreadable frame");
                send_error(&tx, 400, &e.to_string());
                continue;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };

        let action: ClientAction = match state.codec.decode(&frame) {
            Ok(action) => action,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode action");
                send_error(&tx, 400, &e.to_string());
                continue;
            }
        };

        if let Err(e) = handle_action(&state, player_id, &tx, action).await {
            tracing::debug!(%player_id, error = %e, "action failed");
            send_error(&tx, e.code(), &e.to_string());
        }
    }

    // Leave here rather than in the guard so the room drops its copy of
    // the sender before the writer is drained.
    guard.armed = false;
    match state.registry.leave(player_id).await {
        Ok(_) | Err(RoomError::NoRoom(_)) => {}
        Err(e) => tracing::warn!(%player_id, error = %e, "leave on disconnect failed"),
    }

    drop(tx);
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        writer_abort.abort();
    }
    let _ = conn.close().await;
    tracing::info!(%conn_id, %player_id, "player disconnected");
    Ok(())
}

/// Routes one decoded action. Errors are reported to the player by the
/// caller.
async fn handle_action<W, C>(
    state: &ServerState<W, C>,
    player_id: PlayerId,
    tx: &PlayerSender,
    action: ClientAction,
) -> Result<(), RoomError>
where
    W: WordProvider,
    C: Codec,
{
    match action {
        ClientAction::JoinRoom { room_id, nickname } => {
            state
                .registry
                .join(&room_id, player_id, &nickname, tx.clone())
                .await
        }
        ClientAction::LeaveRoom { room_id } => {
            ensure_member(state, player_id, &room_id)?;
            state.registry.leave(player_id).await.map(|_| ())
        }
        other => {
            ensure_member(state, player_id, other.room_id())?;
            match room_action(other) {
                Some(action) => state.registry.dispatch(player_id, action).await,
                None => Ok(()),
            }
        }
    }
}

/// The action must address the room the player is in.
fn ensure_member<W, C>(
    state: &ServerState<W, C>,
    player_id: PlayerId,
    room_id: &RoomCode,
) -> Result<(), RoomError>
where
    W: WordProvider,
    C: Codec,
{
    let code = room_id.validated()?;
    match state.registry.player_room(player_id) {
        Some(current) if current == code => Ok(()),
        Some(_) => Err(RoomError::NotInRoom(player_id, code)),
        None => Err(RoomError::NoRoom(player_id)),
    }
}

/// Maps an in-room wire action onto the engine's action type. Join and
/// leave are handled by the registry and have no counterpart.
fn room_action(action: ClientAction) -> Option<RoomAction> {
    Some(match action {
        ClientAction::PlayerReady { is_ready, .. } => RoomAction::SetReady(is_ready),
        ClientAction::StartGame { .. } => RoomAction::StartGame,
        ClientAction::SelectWord { word_index, .. } => RoomAction::SelectWord(word_index),
        ClientAction::RefreshWords { .. } => RoomAction::RefreshWords,
        ClientAction::DrawLine { stroke, .. } => RoomAction::DrawLine(stroke),
        ClientAction::ClearCanvas { .. } => RoomAction::ClearCanvas,
        ClientAction::SendMessage { message, .. } => RoomAction::SendMessage(message),
        ClientAction::NextRound { .. } => RoomAction::NextRound,
        ClientAction::JoinRoom { .. } | ClientAction::LeaveRoom { .. } => return None,
    })
}

/// Drains outbound events for one player, stamping each with the next
/// sequence number.
async fn write_loop<W, C>(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState<W, C>>,
) where
    W: WordProvider,
    C: Codec,
{
    let mut seq: u64 = 1;
    while let Some(event) = rx.recv().await {
        let envelope = Envelope {
            seq: next_seq(&mut seq),
            timestamp: state.started.elapsed().as_millis() as u64,
            event,
        };
        let frame = match state.codec.encode(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// Queues an error event for the player.
fn send_error(tx: &PlayerSender, code: u16, message: &str) {
    let _ = tx.send(ServerEvent::Error {
        code,
        message: message.to_string(),
    });
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
