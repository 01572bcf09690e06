//! Storage collaborator — the interface the hub persists through.
//!
//! DESIGN
//! ======
//! The hub never touches a database directly; it talks to [`BoardStore`].
//! Moves are persisted synchronously inside the hub's per-board critical
//! section, *before* the canonical event is broadcast — a move the store
//! could not record is never announced to anyone.
//!
//! `PgStore` is the production implementation, written in the same
//! runtime-bound sqlx style as the rest of the service. Tests use the
//! in-memory store from [`testing`].

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::model::{Board, Column, Item, ItemKind};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("board not found: {0}")]
    BoardNotFound(Uuid),
    #[error("item not found: {0}")]
    ItemNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A board at rest plus the last committed sequence number. Persisting the
/// sequence alongside moves keeps it monotonic across hub evictions.
#[derive(Debug, Clone)]
pub struct BoardSnapshot {
    pub board: Board,
    pub seq: u64,
}

#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Load a full board snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BoardNotFound`] for unknown boards and
    /// [`StoreError::Database`] on query failure.
    async fn load_board(&self, board_id: Uuid) -> Result<BoardSnapshot, StoreError>;

    /// Durably record one relocation and the board sequence it produced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; the caller must leave its
    /// authoritative state unchanged in that case.
    async fn persist_move(
        &self,
        item_id: Uuid,
        column_id: Uuid,
        position: u32,
        seq: u64,
    ) -> Result<(), StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn kind_from_db(kind: &str) -> ItemKind {
    match kind {
        "bug" => ItemKind::Bug,
        _ => ItemKind::Feature,
    }
}

#[async_trait]
impl BoardStore for PgStore {
    async fn load_board(&self, board_id: Uuid) -> Result<BoardSnapshot, StoreError> {
        let header: Option<(String, i64)> =
            sqlx::query_as("SELECT title, seq FROM boards WHERE id = $1")
                .bind(board_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((title, seq)) = header else {
            return Err(StoreError::BoardNotFound(board_id));
        };

        let column_rows = sqlx::query_as::<_, (Uuid, String, i32)>(
            "SELECT id, title, wip_limit FROM columns WHERE board_id = $1 ORDER BY ordem, id",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query_as::<_, (Uuid, Uuid, String, String, i32)>(
            "SELECT i.id, i.column_id, i.kind, i.title, i.position
             FROM items i
             JOIN columns c ON c.id = i.column_id
             WHERE c.board_id = $1
             ORDER BY i.position, i.id",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;

        let mut columns: Vec<Column> = column_rows
            .into_iter()
            .map(|(id, title, wip_limit)| Column {
                id,
                title,
                // 0 = unbounded in the schema.
                wip_limit: u32::try_from(wip_limit).ok().filter(|l| *l > 0),
                items: Vec::new(),
            })
            .collect();

        for (id, column_id, kind, title, position) in item_rows {
            if let Some(col) = columns.iter_mut().find(|c| c.id == column_id) {
                col.items.push(Item {
                    id,
                    kind: kind_from_db(&kind),
                    title,
                    position: u32::try_from(position).unwrap_or(0),
                });
            }
        }
        // Repair any gaps left by out-of-band edits.
        for col in &mut columns {
            col.renumber();
        }

        Ok(BoardSnapshot {
            board: Board { id: board_id, title, columns },
            seq: u64::try_from(seq).unwrap_or(0),
        })
    }

    async fn persist_move(
        &self,
        item_id: Uuid,
        column_id: Uuid,
        position: u32,
        seq: u64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let prev: Option<(Uuid, i32)> =
            sqlx::query_as("SELECT column_id, position FROM items WHERE id = $1 FOR UPDATE")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((prev_column, prev_position)) = prev else {
            return Err(StoreError::ItemNotFound(item_id));
        };

        // Close the gap the item leaves behind, then open a slot at the
        // destination rank.
        sqlx::query("UPDATE items SET position = position - 1 WHERE column_id = $1 AND position > $2")
            .bind(prev_column)
            .bind(prev_position)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE items SET position = position + 1
             WHERE column_id = $1 AND position >= $2 AND id <> $3",
        )
        .bind(column_id)
        .bind(i32::try_from(position).unwrap_or(i32::MAX))
        .bind(item_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE items SET column_id = $2, position = $3 WHERE id = $1")
            .bind(item_id)
            .bind(column_id)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE boards SET seq = $2
             WHERE id = (SELECT board_id FROM columns WHERE id = $1)",
        )
        .bind(column_id)
        .bind(i64::try_from(seq).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// TEST DOUBLE
// =============================================================================


#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
