//! Board hub — the authoritative per-board mutation sequencer.
//!
//! DESIGN
//! ======
//! One `LiveBoard` per board, hydrated from the store on first use and held
//! behind its own `tokio::sync::Mutex`. That mutex is the serialization
//! point: every move request for a board is validated, admitted, persisted,
//! applied, and sequenced while holding it, so the admission controller
//! never observes a racing insertion. Distinct boards share nothing and
//! proceed fully in parallel.
//!
//! Broadcast happens after commit, from an immutable event value, to every
//! subscribed connection including the requester — the requester's own
//! optimistic overlay is reconciled by the same canonical event everyone
//! else sees.
//!
//! ERROR HANDLING
//! ==============
//! A move the store fails to persist is never broadcast: the request errors
//! back to one client and the authoritative state stays untouched (the
//! in-memory board is only mutated after the write succeeds).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::admission::{self, Admission, RejectReason};
use crate::envelope::{
    CommentPayload, Envelope, ItemCreatedPayload, SyncPayload, TypingPayload, WireErrorKind,
};
use crate::model::{Board, MoveEvent, MoveRequest};
use crate::services::presence::{PresenceTracker, PresenceUser};
use crate::store::{BoardStore, StoreError};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("board not found: {0}")]
    BoardNotFound(Uuid),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BoardNotFound(id) => Self::BoardNotFound(id),
            other => Self::Store(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("item {0} is not in the claimed source column")]
    StaleMove(Uuid),
    #[error("column \"{column}\" is at its WIP limit ({limit})")]
    WipLimitExceeded { column: String, limit: u32 },
    #[error("unknown target column: {0}")]
    UnknownColumn(Uuid),
    #[error("board not found: {0}")]
    BoardNotFound(Uuid),
    #[error("could not persist move")]
    Storage(#[source] StoreError),
}

impl WireErrorKind for MoveError {
    fn wire_kind(&self) -> &'static str {
        match self {
            // A vanished item, source, target, or board all mean the client
            // acted on a stale view.
            Self::StaleMove(_) | Self::UnknownColumn(_) | Self::BoardNotFound(_) => "stale_move",
            Self::WipLimitExceeded { .. } => "wip_limit_exceeded",
            Self::Storage(_) => "storage_failure",
        }
    }
}

// =============================================================================
// LIVE BOARD
// =============================================================================

/// Capacity of each subscriber's outbound envelope channel.
const CLIENT_CHANNEL_CAPACITY: usize = 256;

/// Authoritative in-memory state for one board while anyone is using it.
struct LiveBoard {
    board: Board,
    /// Last committed canonical sequence number.
    seq: u64,
    /// Committed request nonces, for idempotent retry replay. Lives as long
    /// as the board stays resident.
    committed: HashMap<Uuid, MoveEvent>,
    /// Subscribed connections: conn id -> outbound envelope sender.
    clients: HashMap<Uuid, mpsc::Sender<Envelope>>,
    presence: PresenceTracker,
}

impl LiveBoard {
    fn new(board: Board, seq: u64) -> Self {
        Self {
            board,
            seq,
            committed: HashMap::new(),
            clients: HashMap::new(),
            presence: PresenceTracker::new(),
        }
    }

    /// Snapshot for `board_sync`, including the current viewer list.
    fn sync_payload(&self) -> SyncPayload {
        SyncPayload {
            board: self.board.clone(),
            seq: self.seq,
            users: self.presence.online_users(),
        }
    }

    /// Best-effort fan-out; a subscriber with a full channel is skipped.
    fn broadcast(&self, envelope: &Envelope, exclude: Option<Uuid>) {
        for (conn_id, tx) in &self.clients {
            if exclude == Some(*conn_id) {
                continue;
            }
            let _ = tx.try_send(envelope.clone());
        }
    }
}

/// Result of a submitted move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub event: MoveEvent,
    /// The nonce had already been committed; `event` is the stored replay.
    pub replayed: bool,
}

// =============================================================================
// HUB
// =============================================================================

pub struct BoardHub {
    boards: RwLock<HashMap<Uuid, Arc<Mutex<LiveBoard>>>>,
    store: Arc<dyn BoardStore>,
}

impl BoardHub {
    #[must_use]
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self { boards: RwLock::new(HashMap::new()), store }
    }

    /// Fetch the live handle for a board, hydrating from the store on miss.
    async fn live(&self, board_id: Uuid) -> Result<Arc<Mutex<LiveBoard>>, HubError> {
        if let Some(live) = self.boards.read().await.get(&board_id) {
            return Ok(live.clone());
        }

        // Load outside the write lock; apply only if still absent.
        let snapshot = self.store.load_board(board_id).await?;
        let mut boards = self.boards.write().await;
        let live = boards.entry(board_id).or_insert_with(|| {
            info!(%board_id, seq = snapshot.seq, "hydrated board from store");
            Arc::new(Mutex::new(LiveBoard::new(snapshot.board, snapshot.seq)))
        });
        Ok(live.clone())
    }

    /// Subscribe a connection to a board. Returns the snapshot the client
    /// should seed its mirror and presence set from; the joiner is already
    /// listed in it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError`] when the board cannot be loaded.
    pub async fn join(
        &self,
        board_id: Uuid,
        conn_id: Uuid,
        user: PresenceUser,
        tx: mpsc::Sender<Envelope>,
    ) -> Result<SyncPayload, HubError> {
        let live = self.live(board_id).await?;
        let mut lb = live.lock().await;

        lb.clients.insert(conn_id, tx);
        let first_session = lb.presence.join(conn_id, user.clone());
        let online = lb.presence.online_count();
        if first_session {
            lb.broadcast(&Envelope::user_joined(&user, online), Some(conn_id));
        }

        info!(%board_id, %conn_id, user = %user.name, online, "client joined board");
        Ok(lb.sync_payload())
    }

    /// Unsubscribe a connection. Broadcasts `user_left` when the user's last
    /// session is gone and evicts the board once nobody is connected
    /// (eviction is safe: every accepted move is already persisted).
    pub async fn leave(&self, board_id: Uuid, conn_id: Uuid) {
        let Some(live) = self.boards.read().await.get(&board_id).cloned() else {
            return;
        };
        let mut lb = live.lock().await;
        lb.clients.remove(&conn_id);
        if let Some(user) = lb.presence.leave(conn_id) {
            let online = lb.presence.online_count();
            lb.broadcast(&Envelope::user_left(&user, online), None);
        }
        let empty = lb.clients.is_empty();
        info!(%board_id, %conn_id, remaining = lb.clients.len(), "client left board");
        drop(lb);

        if empty {
            // Re-check under the write lock; a join may have landed meanwhile.
            let mut boards = self.boards.write().await;
            if let Some(live) = boards.get(&board_id) {
                if live.lock().await.clients.is_empty() {
                    boards.remove(&board_id);
                    info!(%board_id, "evicted board from memory");
                }
            }
        }
    }

    /// The serialization point: validate, admit, persist, apply, sequence,
    /// and broadcast one move — all under the board's mutex.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError`]; the authoritative state is unchanged on any
    /// error and nothing is broadcast.
    pub async fn submit_move(
        &self,
        board_id: Uuid,
        moved_by: &str,
        req: &MoveRequest,
    ) -> Result<MoveOutcome, MoveError> {
        let live = self.live(board_id).await.map_err(|e| match e {
            HubError::BoardNotFound(id) => MoveError::BoardNotFound(id),
            HubError::Store(err) => MoveError::Storage(err),
        })?;
        let mut lb = live.lock().await;

        // Idempotent retry: replay the committed event, never re-apply.
        if let Some(event) = lb.committed.get(&req.nonce) {
            info!(%board_id, nonce = %req.nonce, seq = event.seq, "replaying committed move");
            return Ok(MoveOutcome { event: event.clone(), replayed: true });
        }

        let (ci, _) = lb
            .board
            .locate_item(req.item_id)
            .ok_or(MoveError::StaleMove(req.item_id))?;
        let actual_source = lb.board.columns[ci].id;
        if req.source_column_id.is_some_and(|claimed| claimed != actual_source) {
            return Err(MoveError::StaleMove(req.item_id));
        }

        let target = lb
            .board
            .column(req.target_column_id)
            .ok_or(MoveError::UnknownColumn(req.target_column_id))?;
        let moving_within = actual_source == req.target_column_id;
        match admission::evaluate(target, moving_within) {
            Admission::Accept => {}
            Admission::Reject(RejectReason::WipLimitExceeded { limit }) => {
                return Err(MoveError::WipLimitExceeded { column: target.title.clone(), limit });
            }
        }

        // Final rank, clamped to the post-removal tail of the target.
        let tail = if moving_within {
            target.items.len().saturating_sub(1)
        } else {
            target.items.len()
        };
        let position =
            u32::try_from(req.position.map_or(tail, |p| (p as usize).min(tail))).unwrap_or(u32::MAX);

        // Persist first; a move the store rejects must never be announced.
        let seq = lb.seq + 1;
        self.store
            .persist_move(req.item_id, req.target_column_id, position, seq)
            .await
            .map_err(MoveError::Storage)?;

        // Infallible now: item and target were located above.
        if let Err(e) = lb.board.apply_move(req.item_id, req.target_column_id, Some(position)) {
            warn!(%board_id, error = %e, "apply after persist failed");
            return Err(MoveError::StaleMove(req.item_id));
        }
        lb.seq = seq;

        let event = MoveEvent {
            item_id: req.item_id,
            item_type: req.item_type,
            from_column_id: actual_source,
            column_id: req.target_column_id,
            position,
            moved_by: moved_by.to_string(),
            seq,
            nonce: req.nonce,
        };
        lb.committed.insert(req.nonce, event.clone());
        lb.broadcast(&Envelope::item_moved(&event), None);

        info!(
            %board_id,
            item_id = %req.item_id,
            column_id = %req.target_column_id,
            position,
            seq,
            "move committed"
        );
        Ok(MoveOutcome { event, replayed: false })
    }

    /// Current authoritative snapshot, for `sync_board` requests.
    ///
    /// # Errors
    ///
    /// Returns [`HubError`] when the board cannot be loaded.
    pub async fn snapshot(&self, board_id: Uuid) -> Result<SyncPayload, HubError> {
        let live = self.live(board_id).await?;
        let lb = live.lock().await;
        Ok(lb.sync_payload())
    }

    /// Re-hydrate the live board from the store and tell every viewer to
    /// discard local state. Used after out-of-band edits (item CRUD lives
    /// outside this core).
    ///
    /// # Errors
    ///
    /// Returns [`HubError`] when the reload fails; the live state is kept.
    pub async fn request_refresh(&self, board_id: Uuid) -> Result<(), HubError> {
        let live = self.live(board_id).await?;
        let snapshot = self.store.load_board(board_id).await?;
        let mut lb = live.lock().await;
        lb.board = snapshot.board;
        // The store sequence can only trail what this hub already committed.
        lb.seq = lb.seq.max(snapshot.seq);
        lb.broadcast(&Envelope::board_refresh(), None);
        info!(%board_id, seq = lb.seq, "board refreshed from store");
        Ok(())
    }

    /// Notify viewers that an item was created outside the sync core.
    pub async fn notify_item_created(&self, board_id: Uuid, payload: &ItemCreatedPayload) {
        self.broadcast_to(board_id, &Envelope::item_created(payload), None)
            .await;
    }

    /// Notify viewers of a new comment.
    pub async fn notify_comment_added(&self, board_id: Uuid, payload: &CommentPayload) {
        self.broadcast_to(board_id, &Envelope::comment_added(payload), None)
            .await;
    }

    /// Relay an ephemeral typing hint to board peers, excluding the sender.
    pub async fn relay_typing(&self, board_id: Uuid, exclude: Option<Uuid>, payload: &TypingPayload) {
        self.broadcast_to(board_id, &Envelope::user_typing(payload), exclude)
            .await;
    }

    /// Distinct users currently viewing a board.
    pub async fn online_count(&self, board_id: Uuid) -> usize {
        let Some(live) = self.boards.read().await.get(&board_id).cloned() else {
            return 0;
        };
        let lb = live.lock().await;
        lb.presence.online_count()
    }

    async fn broadcast_to(&self, board_id: Uuid, envelope: &Envelope, exclude: Option<Uuid>) {
        let Some(live) = self.boards.read().await.get(&board_id).cloned() else {
            return;
        };
        let lb = live.lock().await;
        lb.broadcast(envelope, exclude);
    }
}

/// Channel capacity used by callers when registering a subscriber.
#[must_use]
pub fn client_channel() -> (mpsc::Sender<Envelope>, mpsc::Receiver<Envelope>) {
    mpsc::channel(CLIENT_CHANNEL_CAPACITY)
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
