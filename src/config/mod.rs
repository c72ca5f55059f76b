//! Configuration reading and data directory paths.

pub mod paths;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::get_data_dir;

const DEFAULT_BACKEND_HOST: &str = "127.0.0.1";
const DEFAULT_BACKEND_PORT: u16 = 8000;
const DEFAULT_IDENTITY_ENDPOINT: &str = "http://127.0.0.1:8000/oauth/token";
const DEFAULT_EDIT_ENDPOINT: &str = "https://docs.googleapis.com/v1/documents";

/// Top-level redline_config.json shape (written by the extension's
/// options page).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedlineConfig {
    #[serde(default)]
    pub backend_host: Option<String>,
    #[serde(default)]
    pub backend_port: Option<u16>,
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    #[serde(default)]
    pub edit_endpoint: Option<String>,
}

impl RedlineConfig {
    pub fn backend_host(&self) -> &str {
        self.backend_host.as_deref().unwrap_or(DEFAULT_BACKEND_HOST)
    }

    pub fn backend_port(&self) -> u16 {
        self.backend_port.unwrap_or(DEFAULT_BACKEND_PORT)
    }

    /// WebSocket endpoint for the popup control panel.
    pub fn popup_socket_url(&self) -> String {
        format!("ws://{}:{}/ws", self.backend_host(), self.backend_port())
    }

    /// WebSocket endpoint for a document page session.
    pub fn document_socket_url(&self, document_id: &str) -> String {
        format!(
            "ws://{}:{}/ws/{}",
            self.backend_host(),
            self.backend_port(),
            document_id
        )
    }

    /// Base URL for backend HTTP calls (voice command forwarding).
    pub fn backend_http_base(&self) -> String {
        format!("http://{}:{}", self.backend_host(), self.backend_port())
    }

    /// Token endpoint of the identity provider.
    pub fn identity_endpoint(&self) -> &str {
        self.identity_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_IDENTITY_ENDPOINT)
    }

    /// Base URL of the external document-edit API.
    pub fn edit_endpoint(&self) -> &str {
        self.edit_endpoint.as_deref().unwrap_or(DEFAULT_EDIT_ENDPOINT)
    }
}

/// Read redline_config.json from the data directory.
pub fn read_redline_config() -> RedlineConfig {
    read_json_file(&get_config_path()).unwrap_or_default()
}

/// Path to redline_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("redline_config.json")
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_socket_urls() {
        let config = RedlineConfig::default();
        assert_eq!(config.popup_socket_url(), "ws://127.0.0.1:8000/ws");
        assert_eq!(
            config.document_socket_url("abc123"),
            "ws://127.0.0.1:8000/ws/abc123"
        );
        assert_eq!(config.backend_http_base(), "http://127.0.0.1:8000");
    }

    #[test]
    fn test_config_overrides() {
        let config: RedlineConfig = serde_json::from_str(
            r#"{"backendHost": "localhost", "backendPort": 9001, "editEndpoint": "http://edit.local"}"#,
        )
        .unwrap();
        assert_eq!(config.popup_socket_url(), "ws://localhost:9001/ws");
        assert_eq!(config.edit_endpoint(), "http://edit.local");
    }
}
