//! Drag negotiation — optimistic drops reconciled against the hub.
//!
//! DESIGN
//! ======
//! A drag walks `Idle -> Dragging -> Pending -> Idle`. Dropping on a new
//! column runs a local WIP pre-check against the mirror purely to save a
//! round trip on obviously-full columns; acceptance is always the hub's
//! call, delivered as the canonical `item_moved` (matched by nonce) or a
//! `move_rejected`. Dropping back on the source column resolves locally
//! with no network traffic at all.

use uuid::Uuid;

use crate::client::mirror::BoardMirror;
use crate::model::{ItemKind, MoveEvent, MoveRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging {
        item_id: Uuid,
        item_type: ItemKind,
        source_column: Uuid,
    },
    /// Dropped; awaiting the hub's verdict for `nonce`.
    Pending {
        item_id: Uuid,
        item_type: ItemKind,
        source_column: Uuid,
        target_column: Uuid,
        nonce: Uuid,
    },
}

/// What a drop produced.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// No drag was in progress.
    NotDragging,
    /// Same-column drop; resolved locally, nothing sent.
    NoOp,
    /// Local pre-check: the target is visibly full. Nothing sent; the UI
    /// snaps the card back immediately.
    RejectedLocally { limit: u32 },
    /// Send this request and wait for the hub.
    Request(MoveRequest),
}

/// Terminal verdict for a pending drop.
#[derive(Debug, Clone, PartialEq)]
pub enum DragResolution {
    /// The hub committed the move; `event` is the canonical record.
    Accepted { event: MoveEvent },
    /// The hub refused; the UI reverts the card to its source column.
    Rejected { error: String, message: String },
}

#[derive(Debug, Default)]
pub struct DragNegotiator {
    phase: DragPhase,
}

impl Default for DragPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl DragNegotiator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    /// Begin dragging an item the mirror can see. Refused while another drag
    /// or pending drop is in flight, or when the item is unknown.
    pub fn begin(&mut self, mirror: &BoardMirror, item_id: Uuid) -> bool {
        if self.phase != DragPhase::Idle {
            return false;
        }
        let Some((column, item)) = mirror.find_item(item_id) else {
            return false;
        };
        self.phase = DragPhase::Dragging {
            item_id,
            item_type: item.kind,
            source_column: column.id,
        };
        true
    }

    /// Drop the dragged item on `target_column` at `position` (tail when
    /// absent).
    pub fn drop_on(
        &mut self,
        mirror: &BoardMirror,
        target_column: Uuid,
        position: Option<u32>,
    ) -> DropOutcome {
        let DragPhase::Dragging { item_id, item_type, source_column } = self.phase else {
            return DropOutcome::NotDragging;
        };

        if target_column == source_column {
            self.phase = DragPhase::Idle;
            return DropOutcome::NoOp;
        }

        // Latency optimization only: the hub re-checks under its lock.
        if mirror.column_at_wip_limit(target_column) {
            let limit = mirror
                .column(target_column)
                .and_then(|c| c.wip_limit)
                .unwrap_or(0);
            self.phase = DragPhase::Idle;
            return DropOutcome::RejectedLocally { limit };
        }

        let nonce = Uuid::new_v4();
        self.phase = DragPhase::Pending {
            item_id,
            item_type,
            source_column,
            target_column,
            nonce,
        };
        DropOutcome::Request(MoveRequest {
            item_id,
            item_type,
            source_column_id: Some(source_column),
            target_column_id: target_column,
            position,
            session_id: None,
            nonce,
        })
    }

    /// Feed a canonical move event. Resolves the pending drop when its nonce
    /// matches; events about other items or users pass through untouched.
    pub fn on_canonical(&mut self, event: &MoveEvent) -> Option<DragResolution> {
        let DragPhase::Pending { nonce, .. } = self.phase else {
            return None;
        };
        if event.nonce != nonce {
            return None;
        }
        self.phase = DragPhase::Idle;
        Some(DragResolution::Accepted { event: event.clone() })
    }

    /// Feed a rejection. Resolves the pending drop when its nonce matches.
    pub fn on_rejected(
        &mut self,
        nonce: Uuid,
        error: &str,
        message: &str,
    ) -> Option<DragResolution> {
        let DragPhase::Pending { nonce: pending, .. } = self.phase else {
            return None;
        };
        if nonce != pending {
            return None;
        }
        self.phase = DragPhase::Idle;
        Some(DragResolution::Rejected {
            error: error.to_string(),
            message: message.to_string(),
        })
    }

    /// Abandon the current drag (escape key, connection loss).
    pub fn cancel(&mut self) {
        self.phase = DragPhase::Idle;
    }
}

#[cfg(test)]
#[path = "drag_test.rs"]
mod tests;
