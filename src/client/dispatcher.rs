//! Dispatcher — routes inbound envelopes by type tag.
//!
//! DESIGN
//! ======
//! One routing table, keyed on the envelope's `type`. Each arm parses its
//! payload, updates the relevant collaborator (mirror, heartbeat, drag
//! negotiator), and emits a [`UiEvent`] for the presentation layer. Unknown
//! kinds and malformed payloads are logged at debug and dropped; the
//! connection is never torn down for them.
//!
//! The dispatcher cannot talk to the network itself. When an arm discovers
//! the mirror is stale (sequence gap, refresh order) it returns
//! [`PostDispatch::RequestSync`] and the agent sends the `sync_board`.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::drag::{DragNegotiator, DragResolution};
use crate::client::heartbeat::HeartbeatMonitor;
use crate::client::mirror::{BoardMirror, MirrorApply};
use crate::envelope::{
    CommentPayload, Envelope, ItemCreatedPayload, PresencePayload, RejectionPayload, SyncPayload,
    TypingPayload,
};
use crate::model::MoveEvent;

// =============================================================================
// UI EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Reconnecting,
    Closing,
    Closed,
}

/// Everything the presentation layer can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Connection(ConnectionStatus),
    /// The mirror was replaced by a full snapshot; re-render everything.
    BoardReplaced,
    /// A canonical move was applied to the mirror.
    ItemMoved(MoveEvent),
    ItemCreated(ItemCreatedPayload),
    CommentAdded(CommentPayload),
    Presence {
        user: String,
        online: usize,
        joined: bool,
    },
    Typing(TypingPayload),
    /// A pending drop was accepted or rejected.
    DragResolved(DragResolution),
}

/// Action the agent must take after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostDispatch {
    None,
    /// The mirror is stale; request a fresh snapshot.
    RequestSync,
}

// =============================================================================
// DISPATCHER
// =============================================================================

pub struct Dispatcher {
    pub mirror: BoardMirror,
    /// Local view of who is on the board: seeded by each `board_sync`
    /// snapshot, kept current by join/leave envelopes.
    presence: HashMap<Uuid, String>,
    events: mpsc::UnboundedSender<UiEvent>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { mirror: BoardMirror::new(), presence: HashMap::new(), events }
    }

    /// Users currently on the board, name-sorted.
    #[must_use]
    pub fn online_users(&self) -> Vec<String> {
        let mut names: Vec<String> = self.presence.values().cloned().collect();
        names.sort();
        names
    }

    pub fn emit(&self, event: UiEvent) {
        let _ = self.events.send(event);
    }

    /// Route one envelope.
    pub fn dispatch(
        &mut self,
        envelope: &Envelope,
        heartbeat: &mut HeartbeatMonitor,
        drag: &mut DragNegotiator,
        now: Instant,
    ) -> PostDispatch {
        match envelope.kind.as_str() {
            "pong" => {
                heartbeat.on_pong(now);
                PostDispatch::None
            }
            "board_sync" => match envelope.payload::<SyncPayload>() {
                Ok(sync) => {
                    self.mirror.replace(sync.board, sync.seq);
                    // The snapshot lists everyone already on the board.
                    self.presence =
                        sync.users.into_iter().map(|u| (u.user_id, u.name)).collect();
                    self.emit(UiEvent::BoardReplaced);
                    PostDispatch::None
                }
                Err(e) => self.malformed("board_sync", &e),
            },
            "board_refresh" => {
                // Authoritative order to discard local state and reload.
                self.mirror.clear();
                PostDispatch::RequestSync
            }
            "item_moved" => match envelope.payload::<MoveEvent>() {
                Ok(event) => self.on_item_moved(&event, drag),
                Err(e) => self.malformed("item_moved", &e),
            },
            "move_rejected" => match envelope.payload::<RejectionPayload>() {
                Ok(rej) => {
                    if let Some(resolution) = drag.on_rejected(rej.nonce, &rej.error, &rej.message)
                    {
                        warn!(error = %rej.error, message = %rej.message, "move rejected");
                        self.emit(UiEvent::DragResolved(resolution));
                    }
                    PostDispatch::None
                }
                Err(e) => self.malformed("move_rejected", &e),
            },
            kind @ ("user_joined" | "user_left") => match envelope.payload::<PresencePayload>() {
                Ok(presence) => {
                    let joined = kind == "user_joined";
                    if joined {
                        self.presence.insert(presence.user_id, presence.user.clone());
                    } else {
                        self.presence.remove(&presence.user_id);
                    }
                    self.emit(UiEvent::Presence {
                        user: presence.user,
                        online: presence.online,
                        joined,
                    });
                    PostDispatch::None
                }
                Err(e) => self.malformed(kind, &e),
            },
            "user_typing" => match envelope.payload::<TypingPayload>() {
                Ok(typing) => {
                    self.emit(UiEvent::Typing(typing));
                    PostDispatch::None
                }
                Err(e) => self.malformed("user_typing", &e),
            },
            // The mirror cannot fabricate the new item from the notification
            // alone; surface it and pull a snapshot.
            "item_created" => match envelope.payload::<ItemCreatedPayload>() {
                Ok(created) => {
                    self.emit(UiEvent::ItemCreated(created));
                    PostDispatch::RequestSync
                }
                Err(e) => self.malformed("item_created", &e),
            },
            "comment_added" => match envelope.payload::<CommentPayload>() {
                Ok(comment) => {
                    self.emit(UiEvent::CommentAdded(comment));
                    PostDispatch::None
                }
                Err(e) => self.malformed("comment_added", &e),
            },
            other => {
                debug!(kind = other, "unknown envelope kind dropped");
                PostDispatch::None
            }
        }
    }

    fn on_item_moved(&mut self, event: &MoveEvent, drag: &mut DragNegotiator) -> PostDispatch {
        if let Some(resolution) = drag.on_canonical(event) {
            self.emit(UiEvent::DragResolved(resolution));
        }
        match self.mirror.apply_move(event) {
            MirrorApply::Applied => {
                self.emit(UiEvent::ItemMoved(event.clone()));
                PostDispatch::None
            }
            MirrorApply::Duplicate => PostDispatch::None,
            MirrorApply::Gap | MirrorApply::Detached => {
                debug!(seq = event.seq, last = self.mirror.last_seq(), "mirror out of sync");
                PostDispatch::RequestSync
            }
        }
    }

    fn malformed(&self, kind: &str, err: &serde_json::Error) -> PostDispatch {
        debug!(kind, error = %err, "malformed payload dropped");
        PostDispatch::None
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
