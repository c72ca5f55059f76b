//! Voice Redline — native relay core.
//!
//! Communicates with the extension shell via JSON-line IPC on
//! stdin/stdout and with the local backend over WebSocket sessions.
//! This is the entry point that wires the coordinator, sessions, and
//! presentation managers together and runs the main event loop.

mod auth;
mod backend;
mod config;
mod coordinator;
mod feedback;
mod ipc;
mod logger;
mod progress;
mod router;
mod session;
mod shortcuts;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use auth::{CredentialProvider, CredentialStore, HttpIdentityProvider};
use backend::BackendApi;
use config::RedlineConfig;
use coordinator::SessionCoordinator;
use feedback::{FeedbackManager, StatusKind};
use ipc::bridge::emit_event;
use ipc::{Outcome, PanelKind, RequestBody, ShellEvent, ShellRequest};
use progress::ProgressTracker;
use router::Route;
use session::connection::SessionConnection;
use session::{
    BackendMessage, ClientAction, SessionContext, SessionEvent, SessionState,
};
use shortcuts::{QuickAction, ShortcutMap};

#[tokio::main]
async fn main() {
    if let Err(e) = logger::init() {
        // Keep going without logs; the relay itself still works.
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    // Emit starting event immediately so the shell knows we're alive.
    emit_event(&ShellEvent::Starting {});

    let config = config::read_redline_config();
    info!(?config, "Configuration loaded");

    let mut requests = ipc::bridge::spawn_stdin_reader();

    let identity = Arc::new(HttpIdentityProvider::new(config.identity_endpoint()));
    let credentials = Arc::new(CredentialProvider::new(identity, CredentialStore::default_path()));
    let backend = Arc::new(BackendApi::new(&config));
    let coordinator = SessionCoordinator::new(credentials, backend);

    let (session_tx, mut session_events) = mpsc::unbounded_channel();
    let mut app = App::new(config, coordinator, session_tx);

    emit_event(&ShellEvent::Ready {});
    info!("Redline core ready");

    // Main loop: requests from the shell, events from the sessions.
    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(request) => {
                    if !app.handle_request(request).await {
                        break;
                    }
                }
                None => {
                    // stdin closed — shell process gone.
                    info!("stdin closed, shutting down");
                    break;
                }
            },
            event = session_events.recv() => {
                if let Some(event) = event {
                    app.handle_session_event(event).await;
                }
            }
        }
    }

    app.shutdown();
    info!("Redline core shutting down");
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

struct App {
    config: RedlineConfig,
    coordinator: SessionCoordinator,
    feedback: FeedbackManager,
    progress: ProgressTracker,
    shortcuts: ShortcutMap,
    popup: Option<SessionConnection>,
    content: Option<SessionConnection>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl App {
    fn new(
        config: RedlineConfig,
        coordinator: SessionCoordinator,
        session_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            coordinator,
            feedback: FeedbackManager::new(),
            progress: ProgressTracker::new(),
            shortcuts: ShortcutMap::with_defaults(),
            popup: None,
            content: None,
            session_tx,
        }
    }

    /// Handle a single request from the shell.
    /// Returns `false` if the main loop should exit.
    async fn handle_request(&mut self, request: ShellRequest) -> bool {
        let id = request.id;
        match request.body {
            RequestBody::GetAuthToken {} => {
                let outcome = self.coordinator.get_auth_token().await;
                respond(id, outcome);
            }

            RequestBody::ProcessVoice { data } => {
                emit_event(&FeedbackManager::status(StatusKind::Processing));
                let outcome = self.coordinator.process_voice(&data).await;
                respond(id, outcome);
            }

            RequestBody::EditDocument { data } => {
                let outcome = self.coordinator.edit_document(&data).await;
                respond(id, outcome);
            }

            RequestBody::StartRecognition {} => {
                let outcome = self.coordinator.start_recognition();
                emit_event(&ShellEvent::RecordingState { active: true });
                respond(id, outcome);
            }

            RequestBody::StopRecognition {} => {
                let outcome = self.coordinator.stop_recognition();
                emit_event(&ShellEvent::RecordingState { active: false });
                respond(id, outcome);
            }

            RequestBody::PopupOpened {} => {
                self.open_popup();
                ack(id);
            }

            RequestBody::DocumentDetected { url } => {
                self.handle_document_detected(id, &url).await;
            }

            RequestBody::VoiceCommand { text } => {
                self.handle_voice_command(&text);
                ack(id);
            }

            RequestBody::PanelAction { data } => {
                self.dispatch_action(data);
                ack(id);
            }

            RequestBody::Shortcut { chord } => {
                self.handle_shortcut(&chord);
                ack(id);
            }

            RequestBody::QuickAction { action } => {
                self.perform_quick_action(action);
                ack(id);
            }

            RequestBody::Stop {} => {
                ack(id);
                return false;
            }
        }
        true
    }

    /// Bring up the popup session unless one is already running.
    fn open_popup(&mut self) {
        if let Some(existing) = &self.popup {
            if existing.state() != SessionState::Closed {
                debug!("popup session already running");
                return;
            }
        }
        let conn = SessionConnection::open(
            SessionContext::Popup,
            self.config.popup_socket_url(),
            None,
            self.session_tx.clone(),
        );
        info!(session = conn.id(), "popup session opened");
        self.popup = Some(conn);
    }

    /// A document page loaded: resolve its id, make sure we hold a
    /// credential, then bring up the content session.
    async fn handle_document_detected(&mut self, id: Option<String>, url: &str) {
        let document_id = match session::document_id_from_url(url) {
            Some(document_id) => document_id,
            None => {
                emit_event(&FeedbackManager::error("No document ID found"));
                respond(id, Outcome::error("No document ID found"));
                return;
            }
        };

        if let Outcome::Error { error } = self.coordinator.get_auth_token().await {
            warn!(%document_id, "Document initialization failed: {}", error);
            emit_event(&FeedbackManager::error(&error));
            respond(id, Outcome::error(error));
            return;
        }

        if let Some(existing) = self.content.take() {
            existing.close();
        }
        let conn = SessionConnection::open(
            SessionContext::Content,
            self.config.document_socket_url(&document_id),
            Some(document_id.clone()),
            self.session_tx.clone(),
        );
        info!(session = conn.id(), %document_id, "Initialized for document");
        self.content = Some(conn);
        ack(id);
    }

    /// Route a recognized utterance and report the result.
    fn handle_voice_command(&mut self, text: &str) {
        match router::route(text) {
            Route::Action(action) => {
                let accepted = self.dispatch_action(action);
                let event = self.feedback.record_command(text, accepted);
                emit_event(&event);
            }
            Route::Unrecognized { report } => {
                // Report to the status panel; no state changes.
                emit_event(&ShellEvent::PanelUpdate {
                    panel: PanelKind::Status,
                    content: report,
                });
                let event = self.feedback.record_command(text, false);
                emit_event(&event);
            }
        }
    }

    /// Forward one action over the active session, flipping the capture
    /// flag for the start/stop pair. Returns whether the send went out.
    fn dispatch_action(&mut self, action: ClientAction) -> bool {
        match &action {
            ClientAction::StartRecognition => {
                self.coordinator.start_recognition();
                emit_event(&ShellEvent::RecordingState { active: true });
                emit_event(&FeedbackManager::status(StatusKind::Listening));
            }
            ClientAction::StopRecognition => {
                self.coordinator.stop_recognition();
                emit_event(&ShellEvent::RecordingState { active: false });
                emit_event(&FeedbackManager::status(StatusKind::Ready));
            }
            _ => {}
        }

        let session = [self.popup.as_ref(), self.content.as_ref()]
            .into_iter()
            .flatten()
            .find(|s| s.state() == SessionState::Open);

        let sent = match session {
            Some(session) => {
                debug!(context = %session.context(), ?action, "forwarding action");
                session.send(action).is_ok()
            }
            None => false,
        };
        if !sent {
            emit_event(&ShellEvent::PanelUpdate {
                panel: PanelKind::Status,
                content: "Not connected to server".to_string(),
            });
        }
        sent
    }

    fn handle_shortcut(&mut self, chord: &str) {
        match self.shortcuts.resolve(chord) {
            Some(action) => self.perform_quick_action(action),
            None => debug!(chord, "unbound shortcut"),
        }
    }

    fn perform_quick_action(&mut self, action: QuickAction) {
        match action {
            QuickAction::ToggleVoice => {
                if self.coordinator.capture().is_active() {
                    self.dispatch_action(ClientAction::StopRecognition);
                } else {
                    self.dispatch_action(ClientAction::StartRecognition);
                }
            }
            QuickAction::UndoLastChange | QuickAction::RejectAllChanges => {
                self.dispatch_action(ClientAction::ClearChanges);
            }
            QuickAction::AcceptAllChanges => {
                self.dispatch_action(ClientAction::AcceptAllChanges);
            }
            QuickAction::ShowHistory => {
                emit_event(&self.feedback.history_event());
            }
        }
    }

    /// Handle one event from a session driver.
    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { context } => {
                emit_event(&ShellEvent::SessionState {
                    context,
                    state: SessionState::Open,
                });
                match context {
                    SessionContext::Popup => emit_event(&ShellEvent::PanelUpdate {
                        panel: PanelKind::Status,
                        content: "Connected to server".to_string(),
                    }),
                    SessionContext::Content => {
                        emit_event(&FeedbackManager::status(StatusKind::Ready))
                    }
                }
            }

            SessionEvent::Disconnected { context } => {
                emit_event(&ShellEvent::SessionState {
                    context,
                    state: SessionState::Retrying,
                });
                if context == SessionContext::Popup {
                    emit_event(&ShellEvent::PanelUpdate {
                        panel: PanelKind::Status,
                        content: "Disconnected from server".to_string(),
                    });
                }
            }

            SessionEvent::Message { context, message } => {
                self.handle_backend_message(context, message).await;
            }
        }
    }

    async fn handle_backend_message(&mut self, context: SessionContext, message: BackendMessage) {
        match message {
            BackendMessage::DocumentUpdate { changes } => {
                let document_id = self
                    .content
                    .as_ref()
                    .and_then(|c| c.document_id())
                    .map(str::to_string);
                let payload = ipc::EditPayload {
                    document_id,
                    changes,
                };

                let (op, started) = self.progress.start("Applying changes");
                emit_event(&started);

                // Edit failures surface as a UI error; the session
                // stays up either way.
                if let Outcome::Error { error } = self.coordinator.edit_document(&payload).await {
                    warn!(%context, "Failed to apply changes: {}", error);
                    emit_event(&FeedbackManager::error("Failed to apply changes"));
                }
                if let Some(event) = self.progress.update(&op, 100) {
                    emit_event(&event);
                }
            }

            BackendMessage::Suggestion { content } => {
                emit_event(&ShellEvent::PanelUpdate {
                    panel: PanelKind::Suggestion,
                    content,
                });
            }

            BackendMessage::Error { message } => {
                emit_event(&FeedbackManager::error(&message));
            }

            BackendMessage::Transcript { content } => {
                emit_event(&ShellEvent::PanelUpdate {
                    panel: PanelKind::Transcript,
                    content,
                });
            }

            BackendMessage::Suggestions { content } => {
                emit_event(&ShellEvent::PanelUpdate {
                    panel: PanelKind::Suggestions,
                    content,
                });
            }

            BackendMessage::Preview { content } => {
                emit_event(&ShellEvent::PanelUpdate {
                    panel: PanelKind::Preview,
                    content,
                });
            }

            BackendMessage::Status { content } => {
                emit_event(&ShellEvent::PanelUpdate {
                    panel: PanelKind::Status,
                    content,
                });
            }

            // Filtered in the connection driver; nothing to do here.
            BackendMessage::Unknown => {}
        }
    }

    fn shutdown(&mut self) {
        emit_event(&ShellEvent::Stopping {});
        if let Some(popup) = self.popup.take() {
            popup.close();
        }
        if let Some(content) = self.content.take() {
            content.close();
        }
    }
}

/// Emit a correlated response.
fn respond(id: Option<String>, outcome: Outcome) {
    emit_event(&ShellEvent::Response { id, outcome });
}

/// Acknowledge a surface input when the shell asked for correlation.
fn ack(id: Option<String>) {
    if id.is_some() {
        respond(
            id,
            Outcome::Status {
                status: "ok".to_string(),
            },
        );
    }
}
