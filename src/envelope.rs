//! Envelope — the universal wire message for board synchronization.
//!
//! DESIGN
//! ======
//! Every push and request on the realtime wire is an Envelope:
//! `{ "type": <tag>, "message": <type-specific payload>, "timestamp": <ISO-8601> }`.
//! The payload stays a `serde_json::Value` so the transport layer routes on
//! the type tag alone and never has to understand payload shapes; typed
//! payload structs are parsed at the dispatch site via [`Envelope::payload`].
//!
//! Malformed payloads surface as `serde_json::Error` and are logged and
//! dropped by whoever is dispatching — they never terminate a connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::model::{Board, ItemKind, MoveEvent, MoveRequest};
use crate::services::presence::PresenceUser;

// =============================================================================
// ERROR TAGGING
// =============================================================================

/// Grepable wire tag for errors carried in `move_rejected` envelopes.
pub trait WireErrorKind: std::fmt::Display {
    fn wire_kind(&self) -> &'static str;
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// A single message on the realtime wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Type tag, e.g. `"item_moved"`. Dispatchers route on this alone.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default)]
    pub message: Value,
    /// ISO-8601 creation time, stamped at construction.
    #[serde(default)]
    pub timestamp: String,
}

/// Current time as an ISO-8601 (RFC 3339) string.
#[must_use]
pub fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

impl Envelope {
    /// Build an envelope with the current timestamp.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: Value) -> Self {
        Self { kind: kind.into(), message, timestamp: now_iso() }
    }

    /// Parse an envelope from wire text.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error for malformed text.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse the payload into a typed struct.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error when the payload does not
    /// match the expected shape.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.message.clone())
    }
}

// =============================================================================
// CONSTRUCTORS — one per wire kind
// =============================================================================

impl Envelope {
    /// Heartbeat probe. The envelope timestamp doubles as the probe time.
    #[must_use]
    pub fn ping() -> Self {
        Self::new("ping", Value::Object(serde_json::Map::new()))
    }

    /// Heartbeat reply.
    #[must_use]
    pub fn pong() -> Self {
        Self::new("pong", Value::Object(serde_json::Map::new()))
    }

    /// Client request to relocate an item.
    #[must_use]
    pub fn move_item(req: &MoveRequest) -> Self {
        Self::new("move_item", serde_json::to_value(req).unwrap_or_default())
    }

    /// Canonical move broadcast. The only record of "what happened" that
    /// clients are allowed to trust.
    #[must_use]
    pub fn item_moved(event: &MoveEvent) -> Self {
        Self::new("item_moved", serde_json::to_value(event).unwrap_or_default())
    }

    /// Rejection reply for one move request, addressed by nonce.
    #[must_use]
    pub fn move_rejected(nonce: Uuid, err: &(impl WireErrorKind + ?Sized)) -> Self {
        let payload = RejectionPayload {
            nonce,
            error: err.wire_kind().to_string(),
            message: err.to_string(),
        };
        Self::new("move_rejected", serde_json::to_value(&payload).unwrap_or_default())
    }

    /// Client request for a full board snapshot.
    #[must_use]
    pub fn sync_board() -> Self {
        Self::new("sync_board", Value::Object(serde_json::Map::new()))
    }

    /// Full snapshot reply: the authoritative board, its sequence number,
    /// and who is currently viewing it.
    #[must_use]
    pub fn board_sync(sync: &SyncPayload) -> Self {
        Self::new("board_sync", serde_json::to_value(sync).unwrap_or_default())
    }

    /// Instructs every viewer to discard local state and reload.
    #[must_use]
    pub fn board_refresh() -> Self {
        Self::new("board_refresh", Value::Object(serde_json::Map::new()))
    }

    #[must_use]
    pub fn user_joined(user: &PresenceUser, online: usize) -> Self {
        let payload = PresencePayload { user_id: user.user_id, user: user.name.clone(), online };
        Self::new("user_joined", serde_json::to_value(&payload).unwrap_or_default())
    }

    #[must_use]
    pub fn user_left(user: &PresenceUser, online: usize) -> Self {
        let payload = PresencePayload { user_id: user.user_id, user: user.name.clone(), online };
        Self::new("user_left", serde_json::to_value(&payload).unwrap_or_default())
    }

    /// Ephemeral typing hint relayed to board peers. Never persisted.
    #[must_use]
    pub fn user_typing(payload: &TypingPayload) -> Self {
        Self::new("user_typing", serde_json::to_value(payload).unwrap_or_default())
    }

    /// Client-side notification that a comment is being typed.
    #[must_use]
    pub fn typing_comment(payload: &TypingPayload) -> Self {
        Self::new("typing_comment", serde_json::to_value(payload).unwrap_or_default())
    }

    /// Notifies viewers that a new item exists. Viewers refresh to see it;
    /// the payload alone never fabricates local state.
    #[must_use]
    pub fn item_created(payload: &ItemCreatedPayload) -> Self {
        Self::new("item_created", serde_json::to_value(payload).unwrap_or_default())
    }

    #[must_use]
    pub fn comment_added(payload: &CommentPayload) -> Self {
        Self::new("comment_added", serde_json::to_value(payload).unwrap_or_default())
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Payload of `user_joined` / `user_left`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: Uuid,
    pub user: String,
    /// Distinct users online after this change, as counted by the hub.
    pub online: usize,
}

/// Payload of `typing_comment` (inbound) and `user_typing` (relayed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPayload {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub user: String,
    pub item_id: Uuid,
    pub item_type: ItemKind,
    #[serde(default = "default_true")]
    pub is_typing: bool,
}

fn default_true() -> bool {
    true
}

/// Payload of `board_sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub board: Board,
    pub seq: u64,
    /// Everyone on the board at snapshot time; seeds the client's presence
    /// set, which join/leave envelopes then keep current.
    #[serde(default)]
    pub users: Vec<PresenceUser>,
}

/// Payload of `move_rejected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionPayload {
    /// Nonce of the rejected request, for client-side correlation.
    pub nonce: Uuid,
    /// Wire error kind, e.g. `wip_limit_exceeded` or `stale_move`.
    pub error: String,
    pub message: String,
}

/// Payload of `item_created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCreatedPayload {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub title: String,
    pub column_id: Uuid,
    #[serde(default)]
    pub created_by: String,
}

/// Payload of `comment_added`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub author: String,
    pub text: String,
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
