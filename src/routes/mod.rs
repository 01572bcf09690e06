//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the websocket board endpoint and the thin HTTP move trigger under a
//! single Axum router. Everything interesting happens in the hub; these
//! routes are adapters.

pub mod moves;
pub mod ws;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/board/{board_id}", get(ws::handle_ws))
        .route("/api/board/{board_id}/move", post(moves::move_item))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
