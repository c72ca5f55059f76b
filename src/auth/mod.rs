//! Credential acquisition and durable caching.
//!
//! One process-wide token, owned here and nowhere else. The token is
//! replaced wholesale on refresh and persisted under the `oauth_token`
//! key so a reloaded context can reuse it without prompting.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::paths::get_data_dir;

/// Durable storage key for the cached token.
const TOKEN_KEY: &str = "oauth_token";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by credential acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The identity provider denied the request.
    Denied(String),
    /// The identity provider could not be reached or misbehaved.
    Provider(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied(msg) => write!(f, "authorization denied: {}", msg),
            Self::Provider(msg) => write!(f, "identity provider error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

// ---------------------------------------------------------------------------
// Identity provider seam
// ---------------------------------------------------------------------------

/// External identity provider (dyn-compatible).
///
/// `interactive` permits user prompting; a non-interactive request must
/// fail rather than prompt.
pub trait IdentityProvider: Send + Sync {
    fn request_token(
        &self,
        interactive: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + '_>>;
}

/// HTTP identity provider hitting a token endpoint.
///
/// POST `{endpoint}` with `{"interactive": bool}`; expects
/// `{"token": "..."}` on success or `{"error": "..."}` on denial.
pub struct HttpIdentityProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpIdentityProvider {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl IdentityProvider for HttpIdentityProvider {
    fn request_token(
        &self,
        interactive: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, AuthError>> + Send + '_>> {
        Box::pin(async move {
            let body = serde_json::json!({ "interactive": interactive });
            let resp = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| AuthError::Provider(format!("token request failed: {}", e)))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(AuthError::Provider(format!(
                    "token endpoint error {}: {}",
                    status, body
                )));
            }

            let json: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| AuthError::Provider(format!("invalid token response: {}", e)))?;

            if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
                return Err(AuthError::Denied(err.to_string()));
            }
            match json.get("token").and_then(|v| v.as_str()) {
                Some(token) if !token.is_empty() => Ok(token.to_string()),
                _ => Err(AuthError::Provider("token response missing token".into())),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Credential and durable store
// ---------------------------------------------------------------------------

/// The cached authentication token.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub obtained_at: DateTime<Utc>,
}

impl Credential {
    fn new(token: String) -> Self {
        Self {
            token,
            obtained_at: Utc::now(),
        }
    }
}

/// Durable token storage, one JSON file keyed by `oauth_token`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at the default location in the data directory.
    pub fn default_path() -> Self {
        Self::at(get_data_dir().join("oauth_token.json"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the persisted token, if any.
    pub fn load(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let json: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to parse {}: {}", self.path.display(), e);
                return None;
            }
        };
        json.get(TOKEN_KEY)
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// Persist a token, replacing the whole file.
    pub fn save(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::Map::new();
        json.insert(
            TOKEN_KEY.to_string(),
            serde_json::Value::String(token.to_string()),
        );
        std::fs::write(&self.path, serde_json::Value::Object(json).to_string())
    }

    /// Remove the persisted token.
    pub fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Owns the process-wide credential.
///
/// The in-memory cache sits behind a `Mutex` that is held across the
/// identity-provider call, so concurrent `acquire()` calls collapse
/// into a single prompt: the losers wait, then read the cache.
pub struct CredentialProvider {
    identity: Arc<dyn IdentityProvider>,
    store: CredentialStore,
    cached: Mutex<Option<Credential>>,
}

impl CredentialProvider {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: CredentialStore) -> Self {
        Self {
            identity,
            store,
            cached: Mutex::new(None),
        }
    }

    /// Get a credential, prompting the user through the identity
    /// provider if nothing is cached. The result is cached in memory
    /// and persisted to the store.
    pub async fn acquire(&self) -> Result<Credential, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(cred) = cached.as_ref() {
            debug!(obtained_at = %cred.obtained_at, "Reusing cached credential");
            return Ok(cred.clone());
        }
        if let Some(token) = self.store.load() {
            debug!("Reusing persisted token");
            let cred = Credential::new(token);
            *cached = Some(cred.clone());
            return Ok(cred);
        }

        let token = self.identity.request_token(true).await?;
        let cred = Credential::new(token);
        if let Err(e) = self.store.save(&cred.token) {
            warn!("Failed to persist token: {}", e);
        }
        *cached = Some(cred.clone());
        Ok(cred)
    }

    /// Whether a credential exists or can be obtained without
    /// prompting. Never interactive.
    pub async fn validate(&self) -> bool {
        let mut cached = self.cached.lock().await;
        if cached.is_some() {
            return true;
        }
        if let Some(token) = self.store.load() {
            *cached = Some(Credential::new(token));
            return true;
        }
        match self.identity.request_token(false).await {
            Ok(token) => {
                let cred = Credential::new(token);
                if let Err(e) = self.store.save(&cred.token) {
                    warn!("Failed to persist token: {}", e);
                }
                *cached = Some(cred);
                true
            }
            Err(e) => {
                debug!("Silent token acquisition failed: {}", e);
                false
            }
        }
    }

    /// The cached token, if any. Does not touch the identity provider.
    pub async fn current_token(&self) -> Option<String> {
        self.cached.lock().await.as_ref().map(|c| c.token.clone())
    }

    /// Drop the credential after an explicit authentication failure.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
        self.store.clear();
    }
}
