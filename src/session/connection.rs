//! WebSocket session connection with fixed-delay reconnect.
//!
//! Each connection owns a driver task that dials the backend, pumps
//! frames in both directions, and arms a single reconnect timer after
//! an unexpected close. The delay is a fixed 5 seconds with no backoff
//! or cap; the backend is expected to be a local process. `close()`
//! cancels a pending reconnect and is terminal.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{
    BackendMessage, ClientAction, SessionContext, SessionError, SessionEvent, SessionState,
    SessionStateCell,
};

/// Delay before the single reconnect attempt after an unexpected close.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to one backend session.
///
/// Dropping the handle ends the session once the driver notices the
/// closed channels; prefer an explicit [`close`], which also cancels a
/// pending reconnect timer.
///
/// [`close`]: SessionConnection::close
pub struct SessionConnection {
    id: String,
    context: SessionContext,
    document_id: Option<String>,
    state: Arc<SessionStateCell>,
    outbound_tx: mpsc::UnboundedSender<ClientAction>,
    close_tx: watch::Sender<bool>,
}

impl SessionConnection {
    /// Open a session to `endpoint`, spawning its driver task.
    ///
    /// Events (connected, disconnected, inbound messages) are delivered
    /// on `events` in receipt order.
    pub fn open(
        context: SessionContext,
        endpoint: String,
        document_id: Option<String>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self::open_with_delay(context, endpoint, document_id, events, RECONNECT_DELAY)
    }

    pub(crate) fn open_with_delay(
        context: SessionContext,
        endpoint: String,
        document_id: Option<String>,
        events: mpsc::UnboundedSender<SessionEvent>,
        reconnect_delay: Duration,
    ) -> Self {
        let state = SessionStateCell::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);

        tokio::spawn(drive(
            endpoint,
            context,
            Arc::clone(&state),
            outbound_rx,
            close_rx,
            events,
            reconnect_delay,
        ));

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            context,
            document_id,
            state,
            outbound_tx,
            close_tx,
        }
    }

    /// Queue an action for the backend.
    ///
    /// Fails with [`SessionError::NotConnected`] unless the socket is
    /// currently open.
    pub fn send(&self, action: ClientAction) -> Result<(), SessionError> {
        if self.state.current() != SessionState::Open {
            return Err(SessionError::NotConnected);
        }
        self.outbound_tx
            .send(action)
            .map_err(|_| SessionError::NotConnected)
    }

    /// Close the session. Cancels any pending reconnect timer.
    pub fn close(&self) {
        self.state.mark_closed();
        let _ = self.close_tx.send(true);
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn context(&self) -> SessionContext {
        self.context
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

async fn drive(
    endpoint: String,
    context: SessionContext,
    state: Arc<SessionStateCell>,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientAction>,
    mut close_rx: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<SessionEvent>,
    reconnect_delay: Duration,
) {
    loop {
        if *close_rx.borrow() {
            break;
        }

        match connect_async(endpoint.as_str()).await {
            Ok((socket, _response)) => {
                state.set_open();
                info!(%context, %endpoint, "session connected");
                let _ = events.send(SessionEvent::Connected { context });
                run_io(socket, context, &mut outbound_rx, &mut close_rx, &events).await;
            }
            Err(e) => {
                warn!(%context, %endpoint, "session connect failed: {}", e);
            }
        }

        state.mark_closed();
        if *close_rx.borrow() {
            // Caller-initiated close: no retry, no disconnect report.
            break;
        }

        let _ = events.send(SessionEvent::Disconnected { context });

        // Arm exactly one reconnect timer; close() cancels it.
        state.begin_retry();
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            changed = close_rx.changed() => {
                if changed.is_err() || *close_rx.borrow() {
                    break;
                }
            }
        }
        if *close_rx.borrow() {
            break;
        }
        state.begin_connect();
        debug!(%context, "session reconnecting");
    }

    state.mark_closed();
    debug!(%context, "session driver exiting");
}

/// Pump one connected socket until it closes or the caller closes us.
async fn run_io(
    socket: WsStream,
    context: SessionContext,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientAction>,
    close_rx: &mut watch::Receiver<bool>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<BackendMessage>(&text) {
                        Ok(BackendMessage::Unknown) => {
                            // Unknown types are dropped on purpose; the
                            // backend may be newer than this client.
                            debug!(%context, "ignoring unknown backend message");
                        }
                        Ok(message) => {
                            let _ = events.send(SessionEvent::Message { context, message });
                        }
                        Err(e) => {
                            warn!(%context, "invalid backend message: {} — input: {}", e, text);
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(%context, "backend closed the socket");
                    return;
                }
                Some(Ok(_)) => {} // binary frames are not part of the contract
                Some(Err(e)) => {
                    warn!(%context, "socket error: {}", e);
                    return;
                }
            },

            action = outbound_rx.recv() => match action {
                Some(action) => {
                    let json = match serde_json::to_string(&action) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(%context, "failed to serialize action: {}", e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(json)).await.is_err() {
                        return;
                    }
                }
                None => return, // handle dropped
            },

            changed = close_rx.changed() => {
                // Read the flag before awaiting; the borrow guard must
                // not be held across a suspension point.
                let closed = changed.is_err() || *close_rx.borrow();
                if closed {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const EVENT_WAIT: Duration = Duration::from_secs(5);

    async fn ws_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}/ws", listener.local_addr().unwrap());
        (listener, endpoint)
    }

    async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = timeout(EVENT_WAIT, listener.accept())
            .await
            .expect("no connection attempt")
            .unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        timeout(EVENT_WAIT, rx.recv())
            .await
            .expect("no session event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_send_before_open_fails_with_not_connected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        // Port 9 (discard) is not listening; the session never opens.
        let conn = SessionConnection::open_with_delay(
            SessionContext::Popup,
            "ws://127.0.0.1:9/ws".to_string(),
            None,
            tx,
            Duration::from_millis(50),
        );
        assert_eq!(
            conn.send(ClientAction::ClearChanges),
            Err(SessionError::NotConnected)
        );
        conn.close();
    }

    #[tokio::test]
    async fn test_connect_send_and_receive() {
        let (listener, endpoint) = ws_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = SessionConnection::open_with_delay(
            SessionContext::Popup,
            endpoint,
            None,
            tx,
            Duration::from_millis(50),
        );

        let mut server = accept_ws(&listener).await;
        assert!(matches!(
            next_event(&mut rx).await,
            SessionEvent::Connected { context: SessionContext::Popup }
        ));
        assert_eq!(conn.state(), SessionState::Open);

        // Outbound: action reaches the server as the wire JSON.
        conn.send(ClientAction::GetSuggestions).unwrap();
        let frame = timeout(EVENT_WAIT, server.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match frame {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value, serde_json::json!({"action": "getSuggestions"}));
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        // Inbound: backend message is delivered in order.
        server
            .send(Message::Text(
                r#"{"type": "suggestion", "content": "replace foo"}"#.to_string(),
            ))
            .await
            .unwrap();
        match next_event(&mut rx).await {
            SessionEvent::Message {
                message: BackendMessage::Suggestion { content },
                ..
            } => assert_eq!(content, "replace foo"),
            other => panic!("unexpected event: {:?}", other),
        }

        conn.close();
    }

    #[tokio::test]
    async fn test_unknown_message_type_produces_no_event() {
        let (listener, endpoint) = ws_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = SessionConnection::open_with_delay(
            SessionContext::Content,
            endpoint,
            Some("doc1".to_string()),
            tx,
            Duration::from_millis(50),
        );

        let mut server = accept_ws(&listener).await;
        assert!(matches!(next_event(&mut rx).await, SessionEvent::Connected { .. }));

        server
            .send(Message::Text(r#"{"type": "telemetry", "content": "x"}"#.to_string()))
            .await
            .unwrap();
        server
            .send(Message::Text(r#"{"type": "status", "content": "ok"}"#.to_string()))
            .await
            .unwrap();

        // The unknown message is skipped; the next event is the status.
        match next_event(&mut rx).await {
            SessionEvent::Message {
                message: BackendMessage::Status { content },
                ..
            } => assert_eq!(content, "ok"),
            other => panic!("unexpected event: {:?}", other),
        }

        conn.close();
    }

    #[tokio::test]
    async fn test_reconnects_once_after_unexpected_close() {
        let (listener, endpoint) = ws_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = SessionConnection::open_with_delay(
            SessionContext::Popup,
            endpoint,
            None,
            tx,
            Duration::from_millis(50),
        );

        let server = accept_ws(&listener).await;
        assert!(matches!(next_event(&mut rx).await, SessionEvent::Connected { .. }));

        // Unexpected close: drop the server side of the socket.
        drop(server);
        assert!(matches!(
            next_event(&mut rx).await,
            SessionEvent::Disconnected { .. }
        ));

        // One reconnect attempt arrives after the fixed delay.
        let _server2 = accept_ws(&listener).await;
        assert!(matches!(next_event(&mut rx).await, SessionEvent::Connected { .. }));
        assert_eq!(conn.state(), SessionState::Open);

        conn.close();
    }

    #[tokio::test]
    async fn test_close_cancels_pending_reconnect() {
        let (listener, endpoint) = ws_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        // Generous delay so close() always lands before the timer fires.
        let conn = SessionConnection::open_with_delay(
            SessionContext::Popup,
            endpoint,
            None,
            tx,
            Duration::from_millis(500),
        );

        let server = accept_ws(&listener).await;
        assert!(matches!(next_event(&mut rx).await, SessionEvent::Connected { .. }));

        drop(server);
        assert!(matches!(
            next_event(&mut rx).await,
            SessionEvent::Disconnected { .. }
        ));

        conn.close();
        assert_eq!(conn.state(), SessionState::Closed);

        // No further connection attempt: accept() must time out well
        // past the reconnect delay.
        let attempt = timeout(Duration::from_millis(900), listener.accept()).await;
        assert!(attempt.is_err(), "reconnect was not cancelled");
        assert_eq!(conn.state(), SessionState::Closed);
    }
}
