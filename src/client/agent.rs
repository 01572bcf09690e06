//! Connection agent — owns the socket, the heartbeat, and reconnection.
//!
//! DESIGN
//! ======
//! One spawned task per board view. The task is the sole owner of the
//! socket, the mirror, the heartbeat monitor, and the drag negotiator; the
//! UI talks to it through a command channel and listens on a [`UiEvent`]
//! stream, so no drag or dispatch state is ever shared across threads.
//!
//! RECONNECTION
//! ============
//! Loss of the socket (close, send failure, stale heartbeat) schedules
//! exactly one reconnect attempt a fixed delay out. Further loss signals
//! while an attempt is already scheduled are absorbed; a failed attempt
//! schedules the next one. Every successful (re)connect requests a full
//! snapshot, so the mirror never resumes from stale state.
//!
//! VISIBILITY
//! ==========
//! A hidden tab keeps its socket but suspends heartbeats, trading liveness
//! detection for not being torn down over a throttled timer. Becoming
//! visible resumes probing on a fresh interval.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::dispatcher::{ConnectionStatus, Dispatcher, PostDispatch, UiEvent};
use crate::client::drag::{DragNegotiator, DropOutcome};
use crate::client::heartbeat::{
    HEARTBEAT_GRACE, HEARTBEAT_INTERVAL, HeartbeatMonitor, TickAction,
};
use crate::client::transport::{Socket, Transport};
use crate::envelope::Envelope;

use std::time::Duration;

/// Fixed pause before a reconnect attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// =============================================================================
// CONFIG / COMMANDS
// =============================================================================

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub heartbeat_interval: Duration,
    pub heartbeat_grace: Duration,
    pub reconnect_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_grace: HEARTBEAT_GRACE,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// What a drop request came to, reported back to the UI caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResult {
    NotDragging,
    /// Same-column drop; nothing was sent.
    NoOp,
    /// Local WIP pre-check refused; nothing was sent.
    RejectedLocally { limit: u32 },
    /// No live connection to carry the request; the drag was reverted and
    /// nothing was sent.
    Disconnected,
    /// Request sent; the verdict arrives as a `DragResolved` event.
    InFlight { nonce: Uuid },
}

enum Command {
    Send(Envelope),
    BeginDrag { item_id: Uuid },
    DropOn {
        target_column: Uuid,
        position: Option<u32>,
        reply: oneshot::Sender<DropResult>,
    },
    SetVisible(bool),
    Close,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable handle to a running agent task.
#[derive(Clone)]
pub struct ConnectionAgent {
    cmds: mpsc::UnboundedSender<Command>,
}

impl ConnectionAgent {
    /// Spawn the agent task; it connects immediately. Returns the handle and
    /// the UI event stream.
    pub fn spawn(
        config: AgentConfig,
        transport: Arc<dyn Transport>,
    ) -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let heartbeat = HeartbeatMonitor::new(config.heartbeat_interval, config.heartbeat_grace);
        let task = AgentTask {
            config,
            transport,
            cmds: cmd_rx,
            dispatcher: Dispatcher::new(event_tx),
            heartbeat,
            drag: DragNegotiator::new(),
            socket: None,
            reconnect_at: None,
            visible: true,
            status: ConnectionStatus::Closed,
        };
        tokio::spawn(task.run());
        (Self { cmds: cmd_tx }, event_rx)
    }

    /// Queue an envelope for the hub (typing hints, comment notices).
    pub fn send(&self, envelope: Envelope) {
        let _ = self.cmds.send(Command::Send(envelope));
    }

    pub fn begin_drag(&self, item_id: Uuid) {
        let _ = self.cmds.send(Command::BeginDrag { item_id });
    }

    /// Drop the dragged item; resolves once the agent has decided whether a
    /// request went out (not when the hub answers).
    pub async fn drop_on(&self, target_column: Uuid, position: Option<u32>) -> DropResult {
        let (reply, rx) = oneshot::channel();
        if self
            .cmds
            .send(Command::DropOn { target_column, position, reply })
            .is_err()
        {
            return DropResult::NotDragging;
        }
        rx.await.unwrap_or(DropResult::NotDragging)
    }

    /// Report tab visibility; hidden tabs suspend heartbeating.
    pub fn set_visible(&self, visible: bool) {
        let _ = self.cmds.send(Command::SetVisible(visible));
    }

    /// Shut the agent down for good (navigation away).
    pub fn close(&self) {
        let _ = self.cmds.send(Command::Close);
    }
}

// =============================================================================
// TASK
// =============================================================================

enum Wake {
    Command(Option<Command>),
    Inbound(Option<String>),
    ReconnectDue,
    HeartbeatDue,
}

struct AgentTask {
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    cmds: mpsc::UnboundedReceiver<Command>,
    dispatcher: Dispatcher,
    heartbeat: HeartbeatMonitor,
    drag: DragNegotiator,
    socket: Option<Socket>,
    /// At most one scheduled attempt at a time.
    reconnect_at: Option<Instant>,
    visible: bool,
    status: ConnectionStatus,
}

impl AgentTask {
    async fn run(mut self) {
        self.set_status(ConnectionStatus::Connecting);
        self.connect().await;

        loop {
            match self.next_wake().await {
                Wake::Command(None) | Wake::Command(Some(Command::Close)) => break,
                Wake::Command(Some(cmd)) => self.on_command(cmd),
                Wake::Inbound(Some(text)) => self.on_inbound(&text),
                Wake::Inbound(None) => {
                    info!("agent: connection closed by peer");
                    self.on_connection_lost();
                }
                Wake::ReconnectDue => {
                    self.reconnect_at = None;
                    self.connect().await;
                }
                Wake::HeartbeatDue => self.on_heartbeat_due(),
            }
        }

        self.set_status(ConnectionStatus::Closing);
        self.socket = None;
        self.heartbeat.stop();
        self.reconnect_at = None;
        self.set_status(ConnectionStatus::Closed);
    }

    /// Sleep until a command, an inbound frame, or the earliest timer.
    async fn next_wake(&mut self) -> Wake {
        let reconnect_at = self.reconnect_at;
        let heartbeat_at = self.heartbeat.deadline();
        let socket = self.socket.as_mut();
        let cmds = &mut self.cmds;
        tokio::select! {
            cmd = cmds.recv() => Wake::Command(cmd),
            frame = recv_or_pending(socket) => Wake::Inbound(frame),
            () = sleep_until_or_pending(reconnect_at) => Wake::ReconnectDue,
            () = sleep_until_or_pending(heartbeat_at) => Wake::HeartbeatDue,
        }
    }

    // ==== connection lifecycle ====

    async fn connect(&mut self) {
        match self.transport.connect().await {
            Ok(socket) => {
                self.socket = Some(socket);
                self.reconnect_at = None;
                self.heartbeat.start(Instant::now());
                if !self.visible {
                    self.heartbeat.pause();
                }
                self.set_status(ConnectionStatus::Open);
                info!("agent: connected");
                // Seed (or re-seed) the mirror from the authoritative state.
                self.send_now(&Envelope::sync_board());
            }
            Err(e) => {
                warn!(error = %e, "agent: connect failed");
                self.schedule_reconnect();
            }
        }
    }

    fn on_connection_lost(&mut self) {
        self.socket = None;
        self.heartbeat.stop();
        // A drop that was awaiting a verdict will never get one; revert it.
        self.drag.cancel();
        self.set_status(ConnectionStatus::Reconnecting);
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_none() {
            self.reconnect_at = Some(Instant::now() + self.config.reconnect_delay);
            debug!(delay = ?self.config.reconnect_delay, "agent: reconnect scheduled");
        }
    }

    // ==== input handling ====

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Send(envelope) => self.send_now(&envelope),
            Command::BeginDrag { item_id } => {
                if !self.drag.begin(&self.dispatcher.mirror, item_id) {
                    debug!(%item_id, "agent: drag refused");
                }
            }
            Command::DropOn { target_column, position, reply } => {
                // A request with no wire to carry it would leave the
                // negotiator pending forever; revert and report instead.
                let result = if self.socket.is_none() {
                    self.drag.cancel();
                    DropResult::Disconnected
                } else {
                    match self.drag.drop_on(&self.dispatcher.mirror, target_column, position) {
                        DropOutcome::NotDragging => DropResult::NotDragging,
                        DropOutcome::NoOp => DropResult::NoOp,
                        DropOutcome::RejectedLocally { limit } => {
                            DropResult::RejectedLocally { limit }
                        }
                        DropOutcome::Request(req) => {
                            let nonce = req.nonce;
                            self.send_now(&Envelope::move_item(&req));
                            if self.socket.is_some() {
                                DropResult::InFlight { nonce }
                            } else {
                                // The send hit a dead socket; the loss path
                                // has already reverted the drag.
                                DropResult::Disconnected
                            }
                        }
                    }
                };
                let _ = reply.send(result);
            }
            Command::SetVisible(visible) => {
                self.visible = visible;
                if self.socket.is_some() {
                    if visible {
                        self.heartbeat.resume(Instant::now());
                    } else {
                        self.heartbeat.pause();
                    }
                }
            }
            // Intercepted by the run loop before dispatch.
            Command::Close => {}
        }
    }

    fn on_inbound(&mut self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "agent: malformed envelope dropped");
                return;
            }
        };
        let post = self.dispatcher.dispatch(
            &envelope,
            &mut self.heartbeat,
            &mut self.drag,
            Instant::now(),
        );
        match post {
            PostDispatch::None => {}
            PostDispatch::RequestSync => self.send_now(&Envelope::sync_board()),
        }
    }

    fn on_heartbeat_due(&mut self) {
        match self.heartbeat.on_tick(Instant::now()) {
            Some(TickAction::SendPing) => self.send_now(&Envelope::ping()),
            Some(TickAction::ConnectionStale) => {
                warn!("agent: heartbeat timed out, forcing reconnect");
                self.on_connection_lost();
            }
            None => {}
        }
    }

    // ==== output ====

    fn send_now(&mut self, envelope: &Envelope) {
        let Some(socket) = self.socket.as_ref() else {
            debug!(kind = %envelope.kind, "agent: dropped envelope, not connected");
            return;
        };
        let json = match serde_json::to_string(envelope) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "agent: failed to serialize envelope");
                return;
            }
        };
        if socket.send(json).is_err() {
            info!("agent: send failed, connection lost");
            self.on_connection_lost();
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            self.dispatcher.emit(UiEvent::Connection(status));
        }
    }
}

// =============================================================================
// SELECT HELPERS
// =============================================================================

async fn recv_or_pending(socket: Option<&mut Socket>) -> Option<String> {
    match socket {
        Some(socket) => socket.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_or_pending(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;
