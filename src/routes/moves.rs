//! HTTP move trigger — a thin adapter over the hub.
//!
//! DESIGN
//! ======
//! Mirrors the legacy AJAX drag-and-drop endpoint: accept a move intent,
//! hand it to the hub's serialized path, answer `{success, message|error}`
//! with HTTP 200 either way. All validation, admission, sequencing, and
//! broadcast live in the hub; nothing here inspects board state.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ItemKind, MoveRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveForm {
    pub item_id: Uuid,
    pub item_type: ItemKind,
    #[serde(default)]
    pub source_column_id: Option<Uuid>,
    #[serde(rename = "nova_coluna_id")]
    pub target_column_id: Uuid,
    #[serde(rename = "nova_ordem", default)]
    pub position: Option<u32>,
    /// Optional client nonce; generated here when absent (a plain HTTP
    /// caller loses idempotent retry detection, nothing else).
    #[serde(default)]
    pub nonce: Option<Uuid>,
    #[serde(default)]
    pub user: Option<String>,
    /// CSRF-style token, passed through for the (external) auth layer.
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn move_item(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    Json(form): Json<MoveForm>,
) -> Json<MoveResponse> {
    let moved_by = form.user.clone().unwrap_or_else(|| "anonymous".into());
    let req = MoveRequest {
        item_id: form.item_id,
        item_type: form.item_type,
        source_column_id: form.source_column_id,
        target_column_id: form.target_column_id,
        position: form.position,
        session_id: None,
        nonce: form.nonce.unwrap_or_else(Uuid::new_v4),
    };

    match state.hub.submit_move(board_id, &moved_by, &req).await {
        Ok(outcome) => Json(MoveResponse {
            success: true,
            message: Some(format!(
                "{} moved to position {} (seq {})",
                outcome.event.item_type.as_str(),
                outcome.event.position,
                outcome.event.seq
            )),
            error: None,
        }),
        Err(e) => Json(MoveResponse { success: false, message: None, error: Some(e.to_string()) }),
    }
}

#[cfg(test)]
#[path = "moves_test.rs"]
mod tests;
