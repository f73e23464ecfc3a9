//! Client library for a remote drum-extraction service: upload a stem,
//! follow the processing session over a websocket status stream, and turn
//! the resulting audio and MIDI artifacts into renderable previews.

pub mod artifact;
pub mod config;
pub mod session;
pub mod transport;
pub mod viz;

pub use artifact::{ArtifactError, ArtifactFetcher, NoteEvent, NoteSequence, SampleBuffer};
pub use config::{ConfigError, ServiceConfig};
pub use session::{Artifacts, Phase, Progress, Session, SessionController, SessionError};
pub use transport::{
    CommandFrame, ExtractionTransport, HttpTransport, StatusFrame, StreamEvent, StreamHandle,
    TransportError,
};
pub use viz::{
    render_piano_roll, render_waveform, PianoRollConfig, Raster, WaveformConfig,
};
