//! Client-side sync engine: connection agent, dispatcher, board mirror,
//! heartbeat, and drag negotiation. Everything here runs inside one agent
//! task per board view; the UI interacts only through [`agent::ConnectionAgent`]
//! and the [`dispatcher::UiEvent`] stream.

pub mod agent;
pub mod dispatcher;
pub mod drag;
pub mod heartbeat;
pub mod mirror;
pub mod transport;

pub use agent::{AgentConfig, ConnectionAgent, DropResult};
pub use dispatcher::{ConnectionStatus, UiEvent};
pub use transport::{Transport, WsTransport};
