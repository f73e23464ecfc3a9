// src/config.rs
// Remote service configuration

use thiserror::Error;
use url::Url;

pub const API_URL_ENV: &str = "DRUMLIFT_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
}

/// Selects the remote extraction service. A single base URL is the only
/// setting; the streaming scheme is derived from it (https -> wss, http -> ws).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    base_url: Url,
}

impl ServiceConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_url.trim()).map_err(|e| ConfigError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(Self { base_url: url }),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Load from the environment (`DRUMLIFT_API_URL`), falling back to the
    /// default local service when unset or unparseable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        match std::env::var(API_URL_ENV) {
            Ok(value) => Self::new(&value).unwrap_or_else(|e| {
                tracing::warn!("ignoring {}: {}", API_URL_ENV, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Upload endpoint for new sessions.
    pub fn upload_url(&self) -> Result<Url, ConfigError> {
        self.join("upload")
    }

    /// Streaming status endpoint for one task. The websocket scheme mirrors
    /// the HTTP scheme of the base URL.
    pub fn stream_url(&self, task_id: &str) -> Result<Url, ConfigError> {
        let mut url = self.join(&format!("ws/process/{}", task_id))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ConfigError::UnsupportedScheme(scheme.to_string()))?;
        Ok(url)
    }

    /// Resolve a service-relative artifact path (e.g. `/files/x.mid`) against
    /// the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.join(path)
    }

    fn join(&self, path: &str) -> Result<Url, ConfigError> {
        self.base_url.join(path).map_err(|e| ConfigError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            // The default is a compile-time constant and always parses.
            base_url: Url::parse(DEFAULT_API_URL).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_derives_ws_from_http() {
        let config = ServiceConfig::new("http://localhost:8000").unwrap();
        let url = config.stream_url("abc123").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/process/abc123");
    }

    #[test]
    fn stream_url_derives_wss_from_https() {
        let config = ServiceConfig::new("https://api.example.com").unwrap();
        let url = config.stream_url("t1").unwrap();
        assert_eq!(url.as_str(), "wss://api.example.com/ws/process/t1");
    }

    #[test]
    fn resolves_relative_artifact_paths() {
        let config = ServiceConfig::new("https://api.example.com").unwrap();
        let url = config.resolve("/files/x.mid").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/files/x.mid");
    }

    #[test]
    fn upload_url_appends_endpoint() {
        let config = ServiceConfig::new("http://localhost:8000").unwrap();
        assert_eq!(
            config.upload_url().unwrap().as_str(),
            "http://localhost:8000/upload"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            ServiceConfig::new("ftp://example.com"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn rejects_garbage_urls() {
        assert!(ServiceConfig::new("not a url").is_err());
    }
}
