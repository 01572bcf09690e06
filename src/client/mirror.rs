//! Board mirror — the client's read model of an authoritative board.
//!
//! DESIGN
//! ======
//! The mirror only ever changes through full snapshots (`board_sync`) and
//! canonical `item_moved` events applied through the same [`Board::apply_move`]
//! routine the hub uses, so a mirror that has applied the sequence the hub
//! committed holds identical column contents. Sequence numbers guard the
//! event stream: a duplicate is ignored, a gap means the mirror can no longer
//! be trusted and the caller must request a fresh snapshot.

use uuid::Uuid;

use crate::model::{Board, Column, Item, MoveEvent};

/// Outcome of feeding one canonical event into the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorApply {
    /// The event advanced local state.
    Applied,
    /// Already seen (seq at or below the watermark); ignored.
    Duplicate,
    /// Sequence gap or an event the local board cannot apply; the mirror is
    /// stale and needs a snapshot.
    Gap,
    /// No snapshot has been installed yet.
    Detached,
}

#[derive(Debug, Default)]
pub struct BoardMirror {
    board: Option<Board>,
    last_seq: u64,
}

impl BoardMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an authoritative snapshot, discarding everything local.
    pub fn replace(&mut self, board: Board, seq: u64) {
        self.board = Some(board);
        self.last_seq = seq;
    }

    /// Drop local state (e.g. on `board_refresh`).
    pub fn clear(&mut self) {
        self.board = None;
        self.last_seq = 0;
    }

    #[must_use]
    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Apply one canonical move, enforcing the per-board sequence.
    pub fn apply_move(&mut self, event: &MoveEvent) -> MirrorApply {
        let Some(board) = self.board.as_mut() else {
            return MirrorApply::Detached;
        };
        if event.seq <= self.last_seq {
            return MirrorApply::Duplicate;
        }
        if event.seq != self.last_seq + 1 {
            return MirrorApply::Gap;
        }
        if board
            .apply_move(event.item_id, event.column_id, Some(event.position))
            .is_err()
        {
            // The hub committed a move our board cannot express; resync.
            return MirrorApply::Gap;
        }
        self.last_seq = event.seq;
        MirrorApply::Applied
    }

    #[must_use]
    pub fn column(&self, column_id: Uuid) -> Option<&Column> {
        self.board.as_ref()?.column(column_id)
    }

    /// Whether an insertion from another column would exceed the limit.
    /// Columns we cannot see are treated as open; the hub decides anyway.
    #[must_use]
    pub fn column_at_wip_limit(&self, column_id: Uuid) -> bool {
        self.column(column_id).is_some_and(Column::at_wip_limit)
    }

    #[must_use]
    pub fn find_item(&self, item_id: Uuid) -> Option<(&Column, &Item)> {
        self.board.as_ref()?.find_item(item_id)
    }

    /// UI counter string for a column, e.g. `"3 / 5"`.
    #[must_use]
    pub fn wip_counter(&self, column_id: Uuid) -> Option<String> {
        self.column(column_id).map(Column::wip_counter)
    }
}

#[cfg(test)]
#[path = "mirror_test.rs"]
mod tests;
