//! Board data model shared by the hub and the client mirror.
//!
//! DESIGN
//! ======
//! The hub owns the authoritative `Board`; every connected agent owns a
//! read-only mirror of the same type. Both sides relocate items through the
//! single [`Board::apply_move`] routine, so a client that has applied the
//! same canonical events as the hub holds byte-identical column contents.
//!
//! INVARIANTS
//! ==========
//! - Column ids are unique within a board.
//! - Item positions are contiguous and zero-based within a column after
//!   every relocation (`Column::renumber` is the only writer of positions).
//! - `items.len() <= wip_limit` whenever a limit is set; enforced by the
//!   admission controller at insertion time, never checked here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ITEM
// =============================================================================

/// Polymorphic item tag. Type-specific fields (severity, estimate) belong to
/// the storage collaborator and never travel through the sync core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Bug,
    Feature,
}

impl ItemKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
        }
    }
}

/// A movable card. `position` is its zero-based rank within the owning column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    pub title: String,
    pub position: u32,
}

// =============================================================================
// COLUMN
// =============================================================================

/// An ordered bucket of items with an optional capacity limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: Uuid,
    pub title: String,
    /// `None` = unbounded. The database encodes unbounded as zero;
    /// the store maps that to `None` on load.
    pub wip_limit: Option<u32>,
    pub items: Vec<Item>,
}

impl Column {
    /// Whether an insertion from another column would exceed the limit.
    #[must_use]
    pub fn at_wip_limit(&self) -> bool {
        self.wip_limit
            .is_some_and(|limit| self.items.len() >= limit as usize)
    }

    /// Rewrite item positions to match their current order.
    pub fn renumber(&mut self) {
        for (rank, item) in self.items.iter_mut().enumerate() {
            item.position = u32::try_from(rank).unwrap_or(u32::MAX);
        }
    }

    /// UI counter string, e.g. `"3 / 5"` for a limited column.
    #[must_use]
    pub fn wip_counter(&self) -> String {
        match self.wip_limit {
            Some(limit) => format!("{} / {limit}", self.items.len()),
            None => self.items.len().to_string(),
        }
    }
}

// =============================================================================
// BOARD
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("item not on board: {0}")]
    UnknownItem(Uuid),
    #[error("column not on board: {0}")]
    UnknownColumn(Uuid),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    pub columns: Vec<Column>,
}

impl Board {
    #[must_use]
    pub fn column(&self, column_id: Uuid) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// Locate an item as (column index, item index).
    #[must_use]
    pub fn locate_item(&self, item_id: Uuid) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, col)| {
            col.items
                .iter()
                .position(|item| item.id == item_id)
                .map(|ii| (ci, ii))
        })
    }

    #[must_use]
    pub fn find_item(&self, item_id: Uuid) -> Option<(&Column, &Item)> {
        let (ci, ii) = self.locate_item(item_id)?;
        Some((&self.columns[ci], &self.columns[ci].items[ii]))
    }

    /// Relocate one item and renumber the affected columns.
    ///
    /// `position` is the requested rank in the target column; absent or
    /// oversized positions clamp to the tail. Returns the resulting rank.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the item or the target column is unknown;
    /// the board is unchanged in that case.
    pub fn apply_move(
        &mut self,
        item_id: Uuid,
        target_column: Uuid,
        position: Option<u32>,
    ) -> Result<u32, ApplyError> {
        let (ci, ii) = self
            .locate_item(item_id)
            .ok_or(ApplyError::UnknownItem(item_id))?;
        let ti = self
            .columns
            .iter()
            .position(|c| c.id == target_column)
            .ok_or(ApplyError::UnknownColumn(target_column))?;

        let item = self.columns[ci].items.remove(ii);
        let tail = self.columns[ti].items.len();
        let rank = position.map_or(tail, |p| (p as usize).min(tail));
        self.columns[ti].items.insert(rank, item);

        self.columns[ti].renumber();
        if ci != ti {
            self.columns[ci].renumber();
        }
        Ok(u32::try_from(rank).unwrap_or(u32::MAX))
    }
}

// =============================================================================
// MOVE REQUEST / CANONICAL MOVE EVENT
// =============================================================================

/// A client's intent to relocate an item. Wire field names for the target
/// column and position are kept from the legacy board API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    /// Column the client believes currently holds the item. When present the
    /// hub rejects the request as stale if it no longer matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column_id: Option<Uuid>,
    #[serde(rename = "nova_coluna_id")]
    pub target_column_id: Uuid,
    /// Requested rank in the target column; tail when absent.
    #[serde(rename = "nova_ordem", default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Client-generated, used by the hub for idempotent retry detection.
    pub nonce: Uuid,
}

/// The authoritative record of one accepted relocation, sequenced per board.
/// Local optimistic state is provisional until reconciled against this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    pub from_column_id: Uuid,
    pub column_id: Uuid,
    pub position: u32,
    pub moved_by: String,
    /// Strictly increasing per board. A client that sees a gap requests a
    /// full refresh instead of interpolating.
    pub seq: u64,
    /// Nonce of the request this event committed, for requester correlation.
    pub nonce: Uuid,
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
