//! IPC protocol types for communication with the extension shell.
//!
//! Requests use `{"id": "...", "type": "<name>", ...}` format (shell -> core).
//! Events use `{"event": "<name>", "data": {...}}` format (core -> shell).
//! Responses are events that echo the request's correlation id.

pub mod bridge;

use serde::{Deserialize, Serialize};

use crate::feedback::{CommandRecord, StatusKind};
use crate::session::{ClientAction, SessionContext, SessionState};
use crate::shortcuts::QuickAction;

// ---------------------------------------------------------------------------
// Requests: shell -> core (stdin)
// ---------------------------------------------------------------------------

/// A correlated request from the extension shell.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellRequest {
    /// Correlation id, echoed on the response. Surface inputs that need
    /// no response may omit it.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub body: RequestBody,
}

/// All request types received from the shell.
///
/// The first five are the cross-context request vocabulary; the rest
/// are surface inputs from the popup, content script, and shortcut bar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum RequestBody {
    #[serde(rename = "GET_AUTH_TOKEN")]
    GetAuthToken {},
    #[serde(rename = "PROCESS_VOICE")]
    ProcessVoice { data: VoicePayload },
    #[serde(rename = "EDIT_DOCUMENT")]
    EditDocument { data: EditPayload },
    #[serde(rename = "startRecognition")]
    StartRecognition {},
    #[serde(rename = "stopRecognition")]
    StopRecognition {},

    /// The popup control panel opened; bring up its session.
    #[serde(rename = "popupOpened")]
    PopupOpened {},
    /// A document page finished loading; bring up the content session.
    #[serde(rename = "documentDetected")]
    DocumentDetected { url: String },
    /// A recognized utterance to route.
    #[serde(rename = "voiceCommand")]
    VoiceCommand { text: String },
    /// A popup button press, carrying the wire action directly.
    #[serde(rename = "panelAction")]
    PanelAction { data: ClientAction },
    /// A keyboard chord from the shortcut listener.
    #[serde(rename = "shortcut")]
    Shortcut { chord: String },
    /// A quick-action bar button press.
    #[serde(rename = "quickAction")]
    QuickAction { action: QuickAction },

    /// Shut the core down.
    #[serde(rename = "stop")]
    Stop {},
}

/// Payload of a `PROCESS_VOICE` request, forwarded to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Payload of an `EDIT_DOCUMENT` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPayload {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub changes: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Events: core -> shell (stdout)
// ---------------------------------------------------------------------------

/// All events emitted to the shell via stdout as JSON lines.
///
/// Serialized as `{"event": "<variant>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum ShellEvent {
    Starting {},
    Ready {},
    Stopping {},
    /// Protocol-level failure (e.g. a stdin line that was not valid JSON).
    Error {
        message: String,
    },
    /// Response to a correlated request.
    Response {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(flatten)]
        outcome: Outcome,
    },
    StatusBubble {
        kind: StatusKind,
        message: String,
        duration_ms: u64,
    },
    CommandFeedback {
        command: String,
        accepted: bool,
    },
    History {
        commands: Vec<CommandRecord>,
    },
    PanelUpdate {
        panel: PanelKind,
        content: String,
    },
    SessionState {
        context: SessionContext,
        state: SessionState,
    },
    RecordingState {
        active: bool,
    },
    Progress {
        id: String,
        label: String,
        percent: u8,
        done: bool,
    },
}

/// UI panels the shell can render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Transcript,
    Suggestions,
    Preview,
    Status,
    /// The inline suggestion overlay on a document page.
    Suggestion,
}

/// Result of one cross-context request, serialized into the response.
///
/// Errors always cross the boundary as `{"error": "..."}`, never as a
/// crash or a dropped response.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Token { token: String },
    Status { status: String },
    Result { result: serde_json::Value },
    Error { error: String },
}

impl Outcome {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::Error {
            error: message.to_string(),
        }
    }
}
