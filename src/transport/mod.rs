// src/transport/mod.rs
// Transport Client - upload request + streaming status channel

mod frame;
pub mod stream;

pub use frame::{CommandFrame, StatusFrame};
pub use stream::{StreamEvent, StreamHandle, RECONNECT_DELAY};

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{ConfigError, ServiceConfig};

const UPLOAD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout")]
    Timeout,

    #[error("upload rejected: HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    task_id: String,
}

/// Transport seam between the session controller and the remote service.
/// The production implementation is [`HttpTransport`]; tests drive the
/// controller with a scripted transport.
#[async_trait]
pub trait ExtractionTransport: Send + Sync {
    /// Upload one stem. Single request/response, no automatic retry:
    /// silently re-sending a large upload is the caller's decision.
    async fn upload(&self, path: &Path) -> Result<String, TransportError>;

    /// Open the duplex status stream for a task. Parsed frames are forwarded
    /// to `events` exactly once, in arrival order, tagged with `generation`.
    async fn open_stream(
        &self,
        task_id: &str,
        generation: u64,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<StreamHandle, TransportError>;
}

pub struct HttpTransport {
    config: ServiceConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn mime_for(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "wav" | "wave" => "audio/wav",
            "mp3" => "audio/mpeg",
            "flac" => "audio/flac",
            "ogg" | "oga" => "audio/ogg",
            "m4a" | "mp4" => "audio/mp4",
            "aiff" | "aif" => "audio/aiff",
            _ => "application/octet-stream",
        }
    }
}

#[async_trait]
impl ExtractionTransport for HttpTransport {
    async fn upload(&self, path: &Path) -> Result<String, TransportError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        tracing::info!(
            "uploading {} ({} bytes)",
            file_name,
            bytes.len()
        );

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(Self::mime_for(path))
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let form = multipart::Form::new().part("file", file_part);

        let response = self
            .client
            .post(self.config.upload_url()?)
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();

                if status.is_success() {
                    let body: UploadResponse = resp
                        .json()
                        .await
                        .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
                    tracing::info!("upload accepted: task {}", body.task_id);
                    Ok(body.task_id)
                } else {
                    let body = resp.text().await.unwrap_or_default();
                    Err(TransportError::Http {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
            Err(e) => {
                if e.is_timeout() {
                    Err(TransportError::Timeout)
                } else {
                    Err(TransportError::Network(e.to_string()))
                }
            }
        }
    }

    async fn open_stream(
        &self,
        task_id: &str,
        generation: u64,
        events: mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<StreamHandle, TransportError> {
        let url = self.config.stream_url(task_id)?;
        stream::connect(url, generation, events).await
    }
}
