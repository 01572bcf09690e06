//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the board hub, which in turn owns the storage collaborator; route
//! handlers never touch storage directly.

use std::sync::Arc;

use crate::services::hub::BoardHub;
use crate::store::BoardStore;

/// Shared application state. Clone is required by Axum — the hub is
/// Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BoardHub>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn BoardStore>) -> Self {
        Self { hub: Arc::new(BoardHub::new(store)) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
