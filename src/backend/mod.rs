//! HTTP client for the recognition backend and the external edit API.
//!
//! The edit API contract is opaque: we POST the changes object and map
//! anything that is not a 2xx to a failure. Its response shape is not
//! interpreted beyond being JSON.

use reqwest::StatusCode;
use tracing::debug;

use crate::config::RedlineConfig;
use crate::ipc::VoicePayload;

/// Errors raised by backend HTTP calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The payload was missing a required field.
    Payload(String),
    /// The backend rejected our token.
    Unauthorized,
    /// The backend answered with a non-success status.
    Api { status: u16, body: String },
    /// The backend could not be reached.
    Network(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payload(msg) => write!(f, "invalid payload: {}", msg),
            Self::Unauthorized => write!(f, "Authentication failed"),
            Self::Api { status, body } => write!(f, "backend error {}: {}", status, body),
            Self::Network(msg) => write!(f, "backend unreachable: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// HTTP surface of the local backend plus the external edit API.
pub struct BackendApi {
    client: reqwest::Client,
    command_base: String,
    edit_base: String,
}

impl BackendApi {
    pub fn new(config: &RedlineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            command_base: config.backend_http_base(),
            edit_base: config.edit_endpoint().trim_end_matches('/').to_string(),
        }
    }

    fn command_url(&self, document_id: &str) -> String {
        format!("{}/process-command/{}", self.command_base, document_id)
    }

    fn edit_url(&self, document_id: &str) -> String {
        format!("{}/{}", self.edit_base, document_id)
    }

    /// Forward a voice payload to the backend command endpoint and
    /// relay its JSON result verbatim.
    pub async fn process_voice(
        &self,
        payload: &VoicePayload,
        token: &str,
    ) -> Result<serde_json::Value, BackendError> {
        let document_id = payload
            .document_id
            .as_deref()
            .ok_or_else(|| BackendError::Payload("missing documentId".into()))?;

        debug!(document_id, "Forwarding voice payload to backend");
        let resp = self
            .client
            .post(self.command_url(document_id))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::json_result(resp).await
    }

    /// Apply a changes object through the external edit API.
    pub async fn apply_changes(
        &self,
        document_id: &str,
        changes: &serde_json::Value,
        token: &str,
    ) -> Result<serde_json::Value, BackendError> {
        debug!(document_id, "Applying document changes");
        let resp = self
            .client
            .post(self.edit_url(document_id))
            .bearer_auth(token)
            .json(changes)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::json_result(resp).await
    }

    async fn json_result(resp: reqwest::Response) -> Result<serde_json::Value, BackendError> {
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }
        resp.json()
            .await
            .map_err(|e| BackendError::Network(format!("invalid backend response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> BackendApi {
        let config: RedlineConfig = serde_json::from_str(
            r#"{"backendHost": "localhost", "backendPort": 8000, "editEndpoint": "https://edit.example/v1/documents/"}"#,
        )
        .unwrap();
        BackendApi::new(&config)
    }

    #[test]
    fn test_command_url() {
        assert_eq!(
            api().command_url("doc1"),
            "http://localhost:8000/process-command/doc1"
        );
    }

    #[test]
    fn test_edit_url_strips_trailing_slash() {
        assert_eq!(api().edit_url("doc1"), "https://edit.example/v1/documents/doc1");
    }

    #[tokio::test]
    async fn test_process_voice_requires_document_id() {
        let payload = VoicePayload {
            document_id: None,
            action: Some("start".to_string()),
            text: None,
        };
        let err = api().process_voice(&payload, "tok").await.unwrap_err();
        assert!(matches!(err, BackendError::Payload(_)));
    }
}
