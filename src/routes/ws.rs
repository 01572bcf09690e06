//! WebSocket handler — per-connection envelope relay.
//!
//! DESIGN
//! ======
//! On upgrade, the connection joins its board's hub and enters a `select!`
//! loop:
//! - Inbound client envelopes → parse + dispatch by type tag
//! - Broadcast envelopes from board peers → forward to the socket
//!
//! Inbound handling is a pure function from text to reply envelopes
//! (`handle_text`), so dispatch behavior is testable without a live socket.
//! Malformed or unknown envelopes are logged and dropped; they never close
//! the connection.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → hub join → `board_sync` welcome with the full snapshot and
//!    the current viewer list
//! 2. Client envelopes → dispatch (`ping`, `typing_comment`, `sync_board`,
//!    `move_item`)
//! 3. Close → hub leave → `user_left` broadcast to peers

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::{Envelope, TypingPayload};
use crate::model::MoveRequest;
use crate::services::hub;
use crate::services::presence::PresenceUser;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

/// Identity fields. Authentication is an external collaborator; these are
/// trusted as-is by the sync core.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub user: Option<String>,
}

pub async fn handle_ws(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let user = PresenceUser {
        user_id: params.user_id.unwrap_or_else(Uuid::new_v4),
        name: params.user.unwrap_or_else(|| "anonymous".into()),
    };
    ws.on_upgrade(move |socket| run_ws(socket, state, board_id, user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, board_id: Uuid, user: PresenceUser) {
    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = hub::client_channel();

    let sync = match state.hub.join(board_id, conn_id, user.clone(), tx).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(%board_id, error = %e, "ws: join rejected");
            return;
        }
    };

    if send_envelope(&mut socket, &Envelope::board_sync(&sync))
        .await
        .is_err()
    {
        state.hub.leave(board_id, conn_id).await;
        return;
    }
    info!(%conn_id, %board_id, user = %user.name, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = handle_text(&state, board_id, conn_id, &user, &text).await;
                        let mut failed = false;
                        for reply in replies {
                            if send_envelope(&mut socket, &reply).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            pushed = rx.recv() => {
                let Some(envelope) = pushed else { break };
                if send_envelope(&mut socket, &envelope).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.leave(board_id, conn_id).await;
    info!(%conn_id, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Process one inbound text frame and return envelopes for the sender.
/// Broadcasts to peers go through the hub; only direct replies come back.
pub(crate) async fn handle_text(
    state: &AppState,
    board_id: Uuid,
    conn_id: Uuid,
    user: &PresenceUser,
    text: &str,
) -> Vec<Envelope> {
    let envelope = match Envelope::decode(text) {
        Ok(env) => env,
        Err(e) => {
            warn!(%conn_id, error = %e, "ws: malformed envelope dropped");
            return vec![];
        }
    };

    match envelope.kind.as_str() {
        "ping" => vec![Envelope::pong()],
        "typing_comment" => {
            let Ok(mut payload) = envelope.payload::<TypingPayload>() else {
                warn!(%conn_id, "ws: malformed typing payload dropped");
                return vec![];
            };
            // Stamp the authenticated identity over whatever the client sent.
            payload.user_id = Some(user.user_id);
            payload.user.clone_from(&user.name);
            state.hub.relay_typing(board_id, Some(conn_id), &payload).await;
            vec![]
        }
        "sync_board" => match state.hub.snapshot(board_id).await {
            Ok(sync) => vec![Envelope::board_sync(&sync)],
            Err(e) => {
                warn!(%conn_id, %board_id, error = %e, "ws: snapshot failed");
                vec![]
            }
        },
        "move_item" => {
            let Ok(req) = envelope.payload::<MoveRequest>() else {
                warn!(%conn_id, "ws: malformed move request dropped");
                return vec![];
            };
            match state.hub.submit_move(board_id, &user.name, &req).await {
                // The original reply was lost; hand the committed event back
                // to the requester alone.
                Ok(outcome) if outcome.replayed => vec![Envelope::item_moved(&outcome.event)],
                // The broadcast already reached this connection's channel.
                Ok(_) => vec![],
                Err(e) => {
                    info!(%conn_id, %board_id, error = %e, "ws: move rejected");
                    vec![Envelope::move_rejected(req.nonce, &e)]
                }
            }
        }
        other => {
            debug!(%conn_id, kind = other, "ws: unknown envelope kind dropped");
            vec![]
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> Result<(), ()> {
    let json = match serde_json::to_string(envelope) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize envelope");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
