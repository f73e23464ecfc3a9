//! Session Controller - the state machine driving one upload through the
//! streaming extraction pipeline.
//!
//! The controller mirrors the service-authoritative status stream into a
//! [`Session`] snapshot, handles the locally-observable transitions the
//! service cannot see (submission, submission failure, reset), and owns the
//! reconnect decision for unexpectedly dropped streaming connections.

pub mod state;

pub use state::{Artifacts, Phase, Progress, Session};

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};

use crate::config::ServiceConfig;
use crate::transport::{
    CommandFrame, ExtractionTransport, HttpTransport, StreamEvent, StreamHandle, TransportError,
    RECONNECT_DELAY,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation not valid in phase {0:?}")]
    InvalidPhase(Phase),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

struct Inner {
    session: Session,
    stream: Option<StreamHandle>,
    /// Connection generation. Bumped whenever the current connection is
    /// superseded (new open, terminal transition, reset); events and pending
    /// reconnect timers carrying an older generation are discarded.
    generation: u64,
}

impl Inner {
    fn close_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.generation += 1;
    }
}

pub struct SessionController {
    inner: Arc<TokioMutex<Inner>>,
    snapshot_tx: Arc<watch::Sender<Session>>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    transport: Arc<dyn ExtractionTransport>,
    config: ServiceConfig,
}

impl SessionController {
    /// Create a controller backed by the real HTTP/WebSocket transport.
    /// Must be called from within a tokio runtime: the controller spawns its
    /// event pump on construction.
    pub fn new(config: ServiceConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.clone()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ServiceConfig, transport: Arc<dyn ExtractionTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let snapshot_tx = Arc::new(watch::channel(Session::new()).0);
        let inner = Arc::new(TokioMutex::new(Inner {
            session: Session::new(),
            stream: None,
            generation: 0,
        }));

        tokio::spawn(pump(
            inner.clone(),
            events_rx,
            events_tx.clone(),
            snapshot_tx.clone(),
            transport.clone(),
            config.clone(),
        ));

        Self {
            inner,
            snapshot_tx,
            events_tx,
            transport,
            config,
        }
    }

    /// Current session snapshot.
    pub fn snapshot(&self) -> Session {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to session snapshots. The presentation layer re-renders on
    /// change; the controller publishes after every observable mutation.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.snapshot_tx.subscribe()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Upload one stem and start tracking its extraction. Valid only while
    /// idle; exactly one upload is in flight per session.
    pub async fn submit(&self, path: &Path) -> Result<(), SessionError> {
        {
            let mut guard = self.inner.lock().await;
            if guard.session.phase != Phase::Idle {
                return Err(SessionError::InvalidPhase(guard.session.phase));
            }
            guard.session.phase = Phase::Uploading;
            self.publish(&guard.session);
        }

        tracing::info!("uploading stem: {}", path.display());

        let task_id = match self.transport.upload(path).await {
            Ok(task_id) => task_id,
            Err(e) => {
                let mut guard = self.inner.lock().await;
                // A reset during the upload wins; the late failure is moot.
                if guard.session.phase == Phase::Uploading {
                    guard.session.fail(e.to_string());
                    self.publish(&guard.session);
                }
                return Err(e.into());
            }
        };

        let generation = {
            let mut guard = self.inner.lock().await;
            if guard.session.phase != Phase::Uploading {
                return Ok(());
            }
            guard.session.task_id = Some(task_id.clone());
            guard.session.phase = Phase::Connecting;
            guard.generation += 1;
            self.publish(&guard.session);
            guard.generation
        };

        match self
            .transport
            .open_stream(&task_id, generation, self.events_tx.clone())
            .await
        {
            Ok(handle) => {
                let mut guard = self.inner.lock().await;
                if guard.generation != generation {
                    handle.close();
                    return Ok(());
                }
                if let Some(old) = guard.stream.replace(handle) {
                    old.close();
                }
                Ok(())
            }
            Err(e) => {
                // Initial connect failures fall under the same policy as a
                // dropped channel: retry on a fixed delay until reset.
                tracing::warn!(
                    "stream connect failed: {}; retrying in {:?}",
                    e,
                    RECONNECT_DELAY
                );
                tokio::spawn(reconnect(
                    self.inner.clone(),
                    self.transport.clone(),
                    self.events_tx.clone(),
                    task_id,
                    generation,
                ));
                Ok(())
            }
        }
    }

    /// Forward MIDI extraction parameters to the service. Valid only while
    /// the service awaits them. Values are forwarded as-is; range rejection
    /// is the service's prerogative and surfaces as an errored session.
    pub async fn request_midi_extraction(
        &self,
        onset_sensitivity: f64,
        frame_threshold: f64,
    ) -> Result<(), SessionError> {
        let guard = self.inner.lock().await;
        if guard.session.phase != Phase::AwaitingMidiParams {
            return Err(SessionError::InvalidPhase(guard.session.phase));
        }

        match &guard.stream {
            Some(stream) => stream.send(CommandFrame::StartMidi {
                onset: onset_sensitivity,
                frame: frame_threshold,
            }),
            None => tracing::debug!("start_midi dropped; no open stream"),
        }
        Ok(())
    }

    /// Tear down any open connection and clear the session. Valid from any
    /// phase; idempotent.
    pub async fn reset(&self) {
        let mut guard = self.inner.lock().await;
        guard.close_stream();
        guard.session.reset();
        self.publish(&guard.session);
        tracing::info!("session reset");
    }

    fn publish(&self, session: &Session) {
        self.snapshot_tx.send_replace(session.clone());
    }
}

/// Event pump: applies stream events to the session under the same lock used
/// by the public operations, so mutation stays confined to one logical
/// thread of control.
async fn pump(
    inner: Arc<TokioMutex<Inner>>,
    mut events_rx: mpsc::UnboundedReceiver<StreamEvent>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    snapshot_tx: Arc<watch::Sender<Session>>,
    transport: Arc<dyn ExtractionTransport>,
    config: ServiceConfig,
) {
    while let Some(event) = events_rx.recv().await {
        match event {
            StreamEvent::Frame { generation, frame } => {
                let mut guard = inner.lock().await;
                if generation != guard.generation {
                    tracing::debug!(generation, "discarding frame from superseded connection");
                    continue;
                }
                if guard.session.apply_frame(&frame, &config) {
                    if !guard.session.phase.is_active() {
                        // Terminal (or idle) per the service: the connection
                        // has served its purpose, and any pending reconnect
                        // must not fire.
                        guard.close_stream();
                    }
                    snapshot_tx.send_replace(guard.session.clone());
                }
            }

            StreamEvent::Closed { generation } => {
                let mut guard = inner.lock().await;
                if generation != guard.generation {
                    continue;
                }
                guard.stream = None;

                // The reconnect decision reads the phase *now*, not the
                // phase at connection-open time.
                if !guard.session.phase.is_active() {
                    continue;
                }
                let Some(task_id) = guard.session.task_id.clone() else {
                    continue;
                };

                tracing::warn!(
                    task_id = %task_id,
                    "stream closed unexpectedly; reconnecting in {:?}",
                    RECONNECT_DELAY
                );
                tokio::spawn(reconnect(
                    inner.clone(),
                    transport.clone(),
                    events_tx.clone(),
                    task_id,
                    generation,
                ));
            }
        }
    }
}

/// Reopen the stream for `task_id` after the fixed delay, retrying until it
/// sticks. Bails out as soon as the generation it was scheduled against is
/// superseded by a reset or a terminal transition.
async fn reconnect(
    inner: Arc<TokioMutex<Inner>>,
    transport: Arc<dyn ExtractionTransport>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    task_id: String,
    mut generation: u64,
) {
    loop {
        tokio::time::sleep(RECONNECT_DELAY).await;

        // Claim the next generation; bail if this timer has been superseded.
        let next = {
            let mut guard = inner.lock().await;
            if guard.generation != generation || !guard.session.phase.is_active() {
                return;
            }
            guard.generation += 1;
            guard.generation
        };

        match transport
            .open_stream(&task_id, next, events_tx.clone())
            .await
        {
            Ok(handle) => {
                let mut guard = inner.lock().await;
                if guard.generation != next {
                    handle.close();
                    return;
                }
                if let Some(old) = guard.stream.replace(handle) {
                    old.close();
                }
                tracing::info!(task_id = %task_id, "stream reconnected");
                return;
            }
            Err(e) => {
                tracing::warn!(task_id = %task_id, "reconnect failed: {}", e);
                generation = next;
            }
        }
    }
}
