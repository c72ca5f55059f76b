//! Status bubble and command feedback view model.
//!
//! Pure presentation state: translates relay outcomes into shell events
//! and keeps the command history. No business logic lives here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ipc::ShellEvent;

/// How long the shell keeps a status bubble visible.
const STATUS_DURATION_MS: u64 = 3000;

/// Status bubble kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Listening,
    Processing,
    Ready,
    Error,
}

impl StatusKind {
    fn default_message(self) -> &'static str {
        match self {
            Self::Listening => "Listening...",
            Self::Processing => "Processing...",
            Self::Ready => "Ready",
            Self::Error => "Error",
        }
    }
}

/// One routed command, as remembered for the history panel.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub accepted: bool,
    pub at: DateTime<Utc>,
}

/// Command history plus status bubble constructors.
#[derive(Debug, Default)]
pub struct FeedbackManager {
    history: Vec<CommandRecord>,
}

impl FeedbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status bubble event with the kind's standard message.
    pub fn status(kind: StatusKind) -> ShellEvent {
        ShellEvent::StatusBubble {
            kind,
            message: kind.default_message().to_string(),
            duration_ms: STATUS_DURATION_MS,
        }
    }

    /// Error bubble with a specific message.
    pub fn error(message: &str) -> ShellEvent {
        ShellEvent::StatusBubble {
            kind: StatusKind::Error,
            message: message.to_string(),
            duration_ms: STATUS_DURATION_MS,
        }
    }

    /// Record a routed command and produce its feedback event.
    pub fn record_command(&mut self, command: &str, accepted: bool) -> ShellEvent {
        self.history.push(CommandRecord {
            command: command.to_string(),
            accepted,
            at: Utc::now(),
        });
        ShellEvent::CommandFeedback {
            command: command.to_string(),
            accepted,
        }
    }

    /// History snapshot event for the shell's history panel.
    pub fn history_event(&self) -> ShellEvent {
        ShellEvent::History {
            commands: self.history.clone(),
        }
    }
}
