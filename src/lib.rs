//! vortex-board — realtime multi-user kanban synchronization.
//!
//! The server half ([`services::hub`], [`routes`]) serializes and broadcasts
//! board mutations; the client half ([`client`]) keeps a converged mirror
//! behind a reconnecting websocket agent. Both speak [`envelope::Envelope`]
//! and share the [`model`] types, so a client that has applied the hub's
//! event stream holds the hub's exact board.

pub mod admission;
pub mod client;
pub mod db;
pub mod envelope;
pub mod model;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
