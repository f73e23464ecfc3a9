// src/artifact/mod.rs
// Artifact preview: fetch result files and turn them into renderable data

pub mod audio;
pub mod midi;

pub use audio::SampleBuffer;
pub use midi::{NoteEvent, NoteSequence, NoteTrack};

use std::time::Duration;

use thiserror::Error;
use url::Url;

const FETCH_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact fetch failed: {0}")]
    Fetch(String),

    #[error("artifact fetch rejected: HTTP {0}")]
    Http(u16),

    #[error("audio decode failed: {0}")]
    Decode(String),

    #[error("no audio track in artifact")]
    NoAudioTrack,

    #[error("MIDI parse failed: {0}")]
    MidiParse(String),
}

/// Fetches artifact files from their resolved URLs. Results are one-shot
/// snapshots owned by the caller; nothing is cached across fetches.
pub struct ArtifactFetcher {
    client: reqwest::Client,
}

impl ArtifactFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    pub async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>, ArtifactError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ArtifactError::Fetch(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ArtifactError::Http(status.as_u16()));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ArtifactError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Fetch and decode an audio artifact to a mono sample buffer.
    pub async fn fetch_samples(&self, url: &Url) -> Result<SampleBuffer, ArtifactError> {
        let bytes = self.fetch_bytes(url).await?;
        let extension = extension_of(url);
        audio::decode_samples(bytes, extension.as_deref())
    }

    /// Fetch and parse a MIDI artifact to a note sequence.
    pub async fn fetch_notes(&self, url: &Url) -> Result<NoteSequence, ArtifactError> {
        let bytes = self.fetch_bytes(url).await?;
        midi::parse_notes(&bytes)
    }
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(url: &Url) -> Option<String> {
    let path = url.path();
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}
