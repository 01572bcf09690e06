//! Transport seam between the connection agent and the network.
//!
//! DESIGN
//! ======
//! The agent never touches a websocket directly; it talks to a [`Socket`]
//! pair of text channels. [`WsTransport`] backs those channels with a real
//! tokio-tungstenite connection via two pump tasks; the `testing` module
//! backs them with in-memory peers so agent behavior is fully testable
//! without a server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connection closed")]
    Closed,
}

// =============================================================================
// SOCKET
// =============================================================================

/// A live connection as seen by the agent: text frames in, text frames out.
/// Dropping the socket tears down the underlying connection.
pub struct Socket {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl Socket {
    /// Queue one text frame for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the connection is gone.
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    /// Next inbound text frame, or `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }
}

/// How the agent obtains connections. One implementor per environment.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Socket, TransportError>;
}

// =============================================================================
// WEBSOCKET TRANSPORT
// =============================================================================

/// Production transport: one websocket per [`Socket`], pumped by two tasks.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<Socket, TransportError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        // Outbound pump: agent -> wire. Ends when the socket is dropped.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sink.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Inbound pump: wire -> agent. Dropping `in_tx` signals closure.
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            debug!("ws transport: inbound pump ended");
        });

        Ok(Socket { outbound: out_tx, inbound: in_rx })
    }
}

// =============================================================================
// TEST DOUBLES
// =============================================================================
