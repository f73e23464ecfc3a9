// src/session/state.rs
// Session data model and phase transitions

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ServiceConfig;
use crate::transport::StatusFrame;

/// Session lifecycle phase. The remote service is the source of truth:
/// streamed status values are mirrored verbatim, and the only locally-driven
/// transitions are the ones the service cannot observe (submission and its
/// failure, and reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Uploading,
    Connecting,
    Processing,
    AwaitingMidiParams,
    Complete,
    Errored,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Errored)
    }

    /// Whether the session still needs a live streaming connection. Drives
    /// the reconnect decision when a channel closes.
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::Complete | Phase::Errored)
    }

    /// Map a wire status string to a phase. Unknown strings are treated as
    /// malformed input, not as new phases.
    pub fn from_status(status: &str) -> Option<Phase> {
        match status {
            "idle" => Some(Phase::Idle),
            "uploading" => Some(Phase::Uploading),
            "connecting" => Some(Phase::Connecting),
            "processing" => Some(Phase::Processing),
            // The service historically emitted the short form.
            "awaiting_midi_params" | "awaiting_midi" => Some(Phase::AwaitingMidiParams),
            "complete" => Some(Phase::Complete),
            "error" | "errored" => Some(Phase::Errored),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub percent: u8,
    pub message: String,
}

/// Result artifact URLs, resolved against the service base URL. Fields appear
/// independently and are append-only until reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    pub extracted_audio_url: Option<Url>,
    pub midi_url: Option<Url>,
}

/// One upload-to-completion unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub task_id: Option<String>,
    pub phase: Phase,
    pub progress: Progress,
    pub artifacts: Artifacts,
    pub error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            task_id: None,
            phase: Phase::Idle,
            progress: Progress::default(),
            artifacts: Artifacts::default(),
            error: None,
        }
    }

    /// Clear back to the initial empty state.
    pub fn reset(&mut self) {
        *self = Session::new();
    }

    /// Enter the terminal error state. Error text and phase change together;
    /// one never appears without the other.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = Phase::Errored;
        self.error = Some(message.into());
    }

    /// Apply one status frame as a partial update. Returns whether the
    /// session changed.
    ///
    /// Progress and artifact fields are applied only when present; absent
    /// fields leave prior values untouched. A frame carrying `error` is
    /// terminal regardless of its status value. Frames reaching a session
    /// that is already terminal (or idle) are stale and ignored.
    pub fn apply_frame(&mut self, frame: &StatusFrame, config: &ServiceConfig) -> bool {
        if !self.phase.is_active() {
            tracing::debug!(
                phase = ?self.phase,
                "ignoring status frame for inactive session"
            );
            return false;
        }

        if let Some(error) = &frame.error {
            tracing::error!("service reported error: {}", error);
            self.fail(error.clone());
            return true;
        }

        let Some(phase) = Phase::from_status(&frame.status) else {
            tracing::warn!("dropping frame with unknown status '{}'", frame.status);
            return false;
        };

        self.phase = phase;
        if phase == Phase::Errored {
            // Keep phase and error text in lockstep even when the service
            // signals an error through the status field alone.
            self.error = Some("service reported an error".to_string());
        }

        if let Some(progress) = &frame.progress {
            self.progress = progress.clone();
        }

        if let Some(path) = &frame.drum_url {
            match config.resolve(path) {
                Ok(url) => self.artifacts.extracted_audio_url = Some(url),
                Err(e) => tracing::warn!("unresolvable drum_url '{}': {}", path, e),
            }
        }

        if let Some(path) = &frame.midi_url {
            match config.resolve(path) {
                Ok(url) => self.artifacts.midi_url = Some(url),
                Err(e) => tracing::warn!("unresolvable midi_url '{}': {}", path, e),
            }
        }

        true
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServiceConfig {
        ServiceConfig::new("http://localhost:8000").unwrap()
    }

    fn frame(json: &str) -> StatusFrame {
        StatusFrame::parse(json).unwrap()
    }

    fn processing_session() -> Session {
        let mut session = Session::new();
        session.task_id = Some("abc123".to_string());
        session.phase = Phase::Processing;
        session
    }

    #[test]
    fn mirrors_server_status() {
        let mut session = Session::new();
        session.phase = Phase::Connecting;

        assert!(session.apply_frame(
            &frame(r#"{"status":"processing","progress":{"percent":40,"message":"separating"}}"#),
            &config(),
        ));
        assert_eq!(session.phase, Phase::Processing);
        assert_eq!(session.progress.percent, 40);
        assert_eq!(session.progress.message, "separating");

        assert!(session.apply_frame(&frame(r#"{"status":"awaiting_midi_params"}"#), &config()));
        assert_eq!(session.phase, Phase::AwaitingMidiParams);
        // Progress untouched by a status-only frame.
        assert_eq!(session.progress.percent, 40);
    }

    #[test]
    fn accepts_short_awaiting_midi_status() {
        let mut session = processing_session();
        session.apply_frame(&frame(r#"{"status":"awaiting_midi"}"#), &config());
        assert_eq!(session.phase, Phase::AwaitingMidiParams);
    }

    #[test]
    fn error_field_is_terminal_whatever_the_status_says() {
        let mut session = processing_session();
        assert!(session.apply_frame(
            &frame(r#"{"status":"processing","error":"decoder_failure"}"#),
            &config(),
        ));
        assert_eq!(session.phase, Phase::Errored);
        assert_eq!(session.error.as_deref(), Some("decoder_failure"));
    }

    #[test]
    fn error_status_without_text_still_sets_error() {
        let mut session = processing_session();
        session.apply_frame(&frame(r#"{"status":"error"}"#), &config());
        assert_eq!(session.phase, Phase::Errored);
        assert!(session.error.is_some());
    }

    #[test]
    fn terminal_sessions_ignore_late_frames() {
        let mut session = processing_session();
        session.fail("decoder_failure");

        assert!(!session.apply_frame(&frame(r#"{"status":"complete"}"#), &config()));
        assert_eq!(session.phase, Phase::Errored);
    }

    #[test]
    fn idle_sessions_ignore_frames() {
        let mut session = Session::new();
        assert!(!session.apply_frame(&frame(r#"{"status":"processing"}"#), &config()));
        assert_eq!(session.phase, Phase::Idle);
    }

    #[test]
    fn unknown_status_is_dropped_without_state_change() {
        let mut session = processing_session();
        session.progress.percent = 30;

        assert!(!session.apply_frame(
            &frame(r#"{"status":"defragging","progress":{"percent":99,"message":"x"}}"#),
            &config(),
        ));
        assert_eq!(session.phase, Phase::Processing);
        assert_eq!(session.progress.percent, 30);
    }

    #[test]
    fn artifact_urls_resolve_against_base_and_append_independently() {
        let mut session = processing_session();

        session.apply_frame(
            &frame(r#"{"status":"processing","drum_url":"/f/x.wav"}"#),
            &config(),
        );
        assert_eq!(
            session.artifacts.extracted_audio_url.as_ref().unwrap().as_str(),
            "http://localhost:8000/f/x.wav"
        );
        assert!(session.artifacts.midi_url.is_none());

        // A progress-only frame leaves artifacts alone.
        session.apply_frame(
            &frame(r#"{"status":"processing","progress":{"percent":80,"message":"rendering"}}"#),
            &config(),
        );
        assert!(session.artifacts.extracted_audio_url.is_some());

        session.apply_frame(
            &frame(r#"{"status":"complete","midi_url":"/f/x.mid"}"#),
            &config(),
        );
        assert_eq!(
            session.artifacts.midi_url.as_ref().unwrap().as_str(),
            "http://localhost:8000/f/x.mid"
        );
        assert!(session.artifacts.extracted_audio_url.is_some());
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut session = processing_session();
        session.progress = Progress {
            percent: 70,
            message: "separating".to_string(),
        };
        session.fail("boom");

        session.reset();
        assert_eq!(session, Session::new());
    }
}
