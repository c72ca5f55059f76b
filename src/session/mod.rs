//! Backend session types and the shared connection-state cell.
//!
//! One `Session` pairs an execution context (popup or document page) with
//! a WebSocket channel to the local backend. Contexts never share socket
//! state; each owns its own connection and reconnect timer.

pub mod connection;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Context and connection state
// ---------------------------------------------------------------------------

/// The execution context that owns a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionContext {
    /// The popup control panel.
    Popup,
    /// A document page (content-script surface).
    Content,
}

impl std::fmt::Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Popup => write!(f, "popup"),
            Self::Content => write!(f, "content"),
        }
    }
}

/// Connection lifecycle states.
///
/// Transitions are `connecting -> open -> closed` with `closed ->
/// retrying -> connecting` for the automatic reconnect path. A session
/// never goes straight from `open` to `retrying`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
    Retrying = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connecting,
            1 => Self::Open,
            3 => Self::Retrying,
            _ => Self::Closed,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Retrying => write!(f, "retrying"),
        }
    }
}

/// Thread-safe connection state, shareable via `Arc`.
///
/// Shared between the connection driver task and the owning handle.
#[derive(Debug)]
pub struct SessionStateCell {
    state: AtomicU8,
}

impl SessionStateCell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(SessionState::Connecting as u8),
        })
    }

    /// Current state.
    pub fn current(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Transition Connecting -> Open (socket handshake succeeded).
    pub fn set_open(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Transition to Closed from any state (socket gone or caller close).
    pub fn mark_closed(&self) {
        self.state.store(SessionState::Closed as u8, Ordering::Release);
    }

    /// Transition Closed -> Retrying (reconnect timer armed).
    pub fn begin_retry(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Closed as u8,
                SessionState::Retrying as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Transition Retrying -> Connecting (reconnect attempt starting).
    pub fn begin_connect(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Retrying as u8,
                SessionState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Messages: backend -> session (inbound)
// ---------------------------------------------------------------------------

/// All messages the backend can deliver over a session socket.
///
/// Deserialized from `{"type": "<variant>", ...}`. Types we do not know
/// deserialize into `Unknown` and are dropped without an error; the
/// backend is free to add message types ahead of us.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum BackendMessage {
    DocumentUpdate {
        #[serde(default)]
        changes: serde_json::Value,
    },
    Suggestion {
        #[serde(default)]
        content: String,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    Transcript {
        #[serde(default)]
        content: String,
    },
    Suggestions {
        #[serde(default)]
        content: String,
    },
    Preview {
        #[serde(default)]
        content: String,
    },
    Status {
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Messages: session -> backend (outbound)
// ---------------------------------------------------------------------------

/// Cursor movement direction for `moveCursor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorDirection {
    Up,
    Down,
    Forward,
}

/// All actions a surface can send to the backend.
///
/// Serialized as `{"action": "<variant>", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
#[serde(rename_all = "camelCase")]
pub enum ClientAction {
    StartRecognition,
    StopRecognition,
    ClearChanges,
    AcceptChanges,
    AcceptAllChanges,
    GetSuggestions,
    MoveCursor {
        direction: CursorDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steps: Option<u32>,
    },
    MoveCursorToWords {
        words: String,
    },
}

// ---------------------------------------------------------------------------
// Session events and errors
// ---------------------------------------------------------------------------

/// Events a connection driver reports to the main loop.
///
/// Within one session, `Message` events arrive in socket receipt order.
/// Nothing is guaranteed across sessions.
#[derive(Debug)]
pub enum SessionEvent {
    Connected {
        context: SessionContext,
    },
    Disconnected {
        context: SessionContext,
    },
    Message {
        context: SessionContext,
        message: BackendMessage,
    },
}

/// Errors that can occur on a session.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Send attempted while the socket is not open.
    NotConnected,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected to server"),
        }
    }
}

impl std::error::Error for SessionError {}

// ---------------------------------------------------------------------------
// Document id extraction
// ---------------------------------------------------------------------------

/// Extract a document id from a docs URL path of the form
/// `/document/d/<id>`. Returns `None` when the URL is not a document
/// page.
pub fn document_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/document/d/")?;
    let id = rest
        .split(['/', '?', '#'])
        .next()
        .filter(|id| !id.is_empty())?;
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_happy_path() {
        let cell = SessionStateCell::new();
        assert_eq!(cell.current(), SessionState::Connecting);
        assert!(cell.set_open());
        assert_eq!(cell.current(), SessionState::Open);
        cell.mark_closed();
        assert_eq!(cell.current(), SessionState::Closed);
    }

    #[test]
    fn test_state_cell_retry_requires_closed() {
        let cell = SessionStateCell::new();
        // Cannot retry straight out of Connecting or Open.
        assert!(!cell.begin_retry());
        cell.set_open();
        assert!(!cell.begin_retry());
        cell.mark_closed();
        assert!(cell.begin_retry());
        assert_eq!(cell.current(), SessionState::Retrying);
        assert!(cell.begin_connect());
        assert_eq!(cell.current(), SessionState::Connecting);
    }

    #[test]
    fn test_state_cell_open_only_from_connecting() {
        let cell = SessionStateCell::new();
        cell.mark_closed();
        assert!(!cell.set_open());
        assert_eq!(cell.current(), SessionState::Closed);
    }

    #[test]
    fn test_backend_message_unknown_type_is_ignored_variant() {
        let msg: BackendMessage =
            serde_json::from_str(r#"{"type": "telemetry", "content": "x"}"#).unwrap();
        assert!(matches!(msg, BackendMessage::Unknown));
    }

    #[test]
    fn test_backend_message_document_update() {
        let msg: BackendMessage = serde_json::from_str(
            r#"{"type": "document_update", "changes": {"ops": [1, 2]}}"#,
        )
        .unwrap();
        match msg {
            BackendMessage::DocumentUpdate { changes } => {
                assert_eq!(changes["ops"][0], 1);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_client_action_wire_format() {
        let json = serde_json::to_value(ClientAction::StartRecognition).unwrap();
        assert_eq!(json, serde_json::json!({"action": "startRecognition"}));

        let json = serde_json::to_value(ClientAction::MoveCursor {
            direction: CursorDirection::Up,
            steps: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"action": "moveCursor", "direction": "up"}));

        let json = serde_json::to_value(ClientAction::MoveCursor {
            direction: CursorDirection::Forward,
            steps: Some(2),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "moveCursor", "direction": "forward", "steps": 2})
        );

        let json = serde_json::to_value(ClientAction::MoveCursorToWords {
            words: "hello world".to_string(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"action": "moveCursorToWords", "words": "hello world"})
        );
    }

    #[test]
    fn test_document_id_from_url() {
        assert_eq!(
            document_id_from_url("https://docs.example.com/document/d/abc123/edit"),
            Some("abc123".to_string())
        );
        assert_eq!(
            document_id_from_url("https://docs.example.com/document/d/abc123?tab=t.0"),
            Some("abc123".to_string())
        );
        assert_eq!(document_id_from_url("https://docs.example.com/home"), None);
        assert_eq!(document_id_from_url("https://docs.example.com/document/d/"), None);
    }
}
