// src/transport/stream.rs
// Duplex streaming connection to the per-session status endpoint

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::frame::{CommandFrame, StatusFrame};
use super::TransportError;

/// Fixed delay before reopening a channel that closed unexpectedly.
/// Non-exponential: the service closes promptly after completion, so a short
/// constant retry is the common case. Reconnection is unbounded and runs
/// until the session is reset.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Events forwarded from one streaming connection. Each event carries the
/// generation of the connection that produced it; events from a superseded
/// generation are discarded by the consumer.
#[derive(Debug)]
pub enum StreamEvent {
    Frame { generation: u64, frame: StatusFrame },
    Closed { generation: u64 },
}

/// Handle to one open streaming connection. Dropping the handle closes the
/// connection.
pub struct StreamHandle {
    command_tx: mpsc::UnboundedSender<CommandFrame>,
    shutdown_tx: broadcast::Sender<()>,
    generation: u64,
}

impl StreamHandle {
    pub(crate) fn new(
        command_tx: mpsc::UnboundedSender<CommandFrame>,
        shutdown_tx: broadcast::Sender<()>,
        generation: u64,
    ) -> Self {
        Self {
            command_tx,
            shutdown_tx,
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Send a command over the channel. Silently dropped when the channel is
    /// no longer open; callers guard via session phase.
    pub fn send(&self, command: CommandFrame) {
        if self.command_tx.send(command).is_err() {
            tracing::debug!("command dropped; stream already closed");
        }
    }

    /// Deliberately close the connection. No close event is emitted for a
    /// requested shutdown.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Open the streaming connection and spawn its reader/writer task.
///
/// Inbound text frames are parsed and forwarded to `events` exactly once, in
/// arrival order. Malformed frames are dropped inside the parser. A close or
/// read error emits `StreamEvent::Closed` so the session layer can decide
/// whether to reconnect.
pub async fn connect(
    url: Url,
    generation: u64,
    events: mpsc::UnboundedSender<StreamEvent>,
) -> Result<StreamHandle, TransportError> {
    let (ws_stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    tracing::info!(%url, generation, "stream connected");

    let (mut write, mut read) = ws_stream.split();
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<CommandFrame>();
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(frame) = StatusFrame::parse(&text) {
                                if events.send(StreamEvent::Frame { generation, frame }).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!(generation, "stream closed by service");
                            let _ = events.send(StreamEvent::Closed { generation });
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::error!(generation, "stream read error: {}", e);
                            let _ = events.send(StreamEvent::Closed { generation });
                            break;
                        }
                        _ => {} // Ignore ping/pong/binary
                    }
                }

                cmd = command_rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            match serde_json::to_string(&cmd) {
                                Ok(json) => {
                                    if write.send(Message::Text(json)).await.is_err() {
                                        let _ = events.send(StreamEvent::Closed { generation });
                                        break;
                                    }
                                }
                                Err(e) => tracing::error!("failed to encode command: {}", e),
                            }
                        }
                        // Handle dropped: close the connection.
                        None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    Ok(StreamHandle::new(command_tx, shutdown_tx, generation))
}
