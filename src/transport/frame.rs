// src/transport/frame.rs
// Wire frames for the streaming status channel

use serde::{Deserialize, Serialize};

use crate::session::state::Progress;

/// Inbound status frame. Every field other than `status` is optional; a frame
/// carries only the fields that changed, and absent fields leave prior session
/// state untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusFrame {
    pub status: String,
    #[serde(default)]
    pub progress: Option<Progress>,
    #[serde(default)]
    pub drum_url: Option<String>,
    #[serde(default)]
    pub midi_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusFrame {
    /// Parse one text frame. Malformed frames are logged and dropped; they
    /// must never take down the reader loop.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("dropping malformed status frame: {} ({})", e, text);
                None
            }
        }
    }
}

/// Outbound command frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandFrame {
    StartMidi { onset: f64, frame: f64 },
}
