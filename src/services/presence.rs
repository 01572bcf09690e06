//! Presence tracker — who is currently viewing a board.
//!
//! DESIGN
//! ======
//! One tracker lives inside each live board. It maps connection ids to
//! users, so a user with several tabs open counts once. Mutated only by
//! join/leave, never by move events; the UI reads it as an online count
//! plus `user_joined` / `user_left` envelopes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    joined: HashMap<Uuid, PresenceUser>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { joined: HashMap::new() }
    }

    /// Register a connection. Returns `true` if this is the user's first
    /// live session on the board.
    pub fn join(&mut self, conn_id: Uuid, user: PresenceUser) -> bool {
        let already_online = self.joined.values().any(|u| u.user_id == user.user_id);
        self.joined.insert(conn_id, user);
        !already_online
    }

    /// Deregister a connection. Returns the user if that was their last
    /// live session on the board.
    pub fn leave(&mut self, conn_id: Uuid) -> Option<PresenceUser> {
        let user = self.joined.remove(&conn_id)?;
        if self.joined.values().any(|u| u.user_id == user.user_id) {
            None
        } else {
            Some(user)
        }
    }

    /// Distinct users currently online.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.online_users().len()
    }

    /// Distinct users, sorted by name for stable output.
    #[must_use]
    pub fn online_users(&self) -> Vec<PresenceUser> {
        let mut users: Vec<PresenceUser> = Vec::new();
        for user in self.joined.values() {
            if !users.iter().any(|u| u.user_id == user.user_id) {
                users.push(user.clone());
            }
        }
        users.sort_by(|a, b| a.name.cmp(&b.name));
        users
    }

    #[must_use]
    pub fn connections(&self) -> usize {
        self.joined.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
