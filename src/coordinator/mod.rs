//! Cross-context request coordination.
//!
//! The coordinator is the only component with lifecycle beyond a single
//! page load: it owns the capture flag, fronts the credential provider,
//! and answers the cross-context request vocabulary. Every handler
//! resolves to an [`Outcome`]; errors are serialized into the response,
//! never thrown across the IPC boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::CredentialProvider;
use crate::backend::{BackendApi, BackendError};
use crate::ipc::{EditPayload, Outcome, VoicePayload};

// ---------------------------------------------------------------------------
// Capture state
// ---------------------------------------------------------------------------

/// Process-wide voice capture flag. At most one capture is active; the
/// toggles are idempotent and always answer with the resulting status.
#[derive(Debug, Default)]
pub struct CaptureState {
    active: AtomicBool,
}

impl CaptureState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start(&self) -> &'static str {
        self.active.store(true, Ordering::Release);
        "started"
    }

    pub fn stop(&self) -> &'static str {
        self.active.store(false, Ordering::Release);
        "stopped"
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct SessionCoordinator {
    capture: Arc<CaptureState>,
    credentials: Arc<CredentialProvider>,
    backend: Arc<BackendApi>,
}

impl SessionCoordinator {
    pub fn new(credentials: Arc<CredentialProvider>, backend: Arc<BackendApi>) -> Self {
        Self {
            capture: CaptureState::new(),
            credentials,
            backend,
        }
    }

    pub fn capture(&self) -> &Arc<CaptureState> {
        &self.capture
    }

    /// `GET_AUTH_TOKEN`: acquire (possibly prompting) and answer with
    /// the token.
    pub async fn get_auth_token(&self) -> Outcome {
        match self.credentials.acquire().await {
            Ok(cred) => Outcome::Token { token: cred.token },
            Err(e) => {
                warn!("Token acquisition failed: {}", e);
                Outcome::error(e)
            }
        }
    }

    /// `PROCESS_VOICE`: gate on a silently obtainable credential, then
    /// forward the payload and relay the backend's answer.
    pub async fn process_voice(&self, payload: &VoicePayload) -> Outcome {
        if !self.credentials.validate().await {
            return Outcome::error("Authentication failed");
        }
        let token = match self.credentials.current_token().await {
            Some(token) => token,
            None => return Outcome::error("Authentication failed"),
        };

        match self.backend.process_voice(payload, &token).await {
            Ok(result) => Outcome::Result { result },
            Err(BackendError::Unauthorized) => {
                // The token was explicitly rejected; drop it so the next
                // attempt re-acquires.
                self.credentials.invalidate().await;
                Outcome::error(BackendError::Unauthorized)
            }
            Err(e) => {
                warn!("Voice forwarding failed: {}", e);
                Outcome::error(e)
            }
        }
    }

    /// `EDIT_DOCUMENT`: apply a changes object through the edit API.
    pub async fn edit_document(&self, payload: &EditPayload) -> Outcome {
        let document_id = match payload.document_id.as_deref() {
            Some(id) => id,
            None => return Outcome::error("missing documentId"),
        };
        let token = match self.credentials.current_token().await {
            Some(token) => token,
            None => match self.credentials.acquire().await {
                Ok(cred) => cred.token,
                Err(e) => return Outcome::error(e),
            },
        };

        match self
            .backend
            .apply_changes(document_id, &payload.changes, &token)
            .await
        {
            Ok(result) => Outcome::Result { result },
            Err(BackendError::Unauthorized) => {
                self.credentials.invalidate().await;
                Outcome::error(BackendError::Unauthorized)
            }
            Err(e) => {
                warn!("Edit apply failed: {}", e);
                Outcome::error(e)
            }
        }
    }

    /// `startRecognition`: idempotent capture start.
    pub fn start_recognition(&self) -> Outcome {
        let status = self.capture.start();
        info!(status, "Capture state toggled");
        Outcome::Status {
            status: status.to_string(),
        }
    }

    /// `stopRecognition`: idempotent capture stop.
    pub fn stop_recognition(&self) -> Outcome {
        let status = self.capture.stop();
        info!(status, "Capture state toggled");
        Outcome::Status {
            status: status.to_string(),
        }
    }
}
