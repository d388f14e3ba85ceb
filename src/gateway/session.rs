//! Gateway session
//!
//! Drives one gateway connection through its lifecycle:
//!
//! ```text
//! Disconnected --connect()--> Connecting --open--> Authenticating --40{auth}--> Ready
//!      ^                                                                       |
//!      +---------- transport failure / disconnect() (via Closing) -------------+
//! ```
//!
//! Public operations are serialised on the link mutex. While `Ready`, a
//! single receive task reads frames in delivery order, answers pings before
//! reading the next frame, and hands events to the [`EventTable`]. Nothing
//! reconnects automatically.

use std::sync::{Arc, Mutex as StdMutex, Weak};

use secrecy::ExposeSecret;
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use super::codec::{self, AuthCredential, WireFrame};
use super::dispatch::EventTable;
use super::state::{ConnectionState, Fault, GatewaySessionState, SessionEvent, StateStore};
use super::transport::{Connection, FrameSink, FrameSource, Inbound, Transport, WebSocketTransport};
use super::types::{events, ChatHistoryRequest, ChatMessage, ChatSendRequest, HISTORY_LIMIT};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Path and query identifying the Socket.IO websocket transport
pub const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// Derive the websocket URL from a configured gateway base URL
///
/// `http` becomes `ws`, `https` becomes `wss`, and a bare host gets `ws://`.
pub fn build_gateway_url(base: &str) -> Result<Url> {
    let trimmed = base.trim();
    let base = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if base.is_empty() {
        return Err(Error::NotConfigured("gateway URL".to_string()));
    }

    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        format!("ws://{}", base)
    };

    let url = Url::parse(&format!("{}{}", ws_base, SOCKET_IO_PATH))
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", base, e)))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidUrl(format!("{}: missing host", base)));
    }
    Ok(url)
}

/// Connection resources guarded by the operation lock
struct Link {
    config: GatewayConfig,
    sink: Option<Box<dyn FrameSink>>,
    reader: Option<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    events: EventTable,
    state: StateStore,
    link: Mutex<Link>,
    /// Reachable without the link lock, for `Drop`
    reader_abort: StdMutex<Option<AbortHandle>>,
}

/// Client session with an OpenClaw gateway
pub struct GatewaySession {
    inner: Arc<Inner>,
}

impl GatewaySession {
    /// Session over a real WebSocket
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_transport(config, Arc::new(WebSocketTransport::new()))
    }

    /// Session over a custom transport
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_event_table(config, transport, EventTable::default())
    }

    /// Session with a custom transport and event table
    pub fn with_event_table(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        events: EventTable,
    ) -> Self {
        GatewaySession {
            inner: Arc::new(Inner {
                transport,
                events,
                state: StateStore::new(),
                link: Mutex::new(Link {
                    config,
                    sink: None,
                    reader: None,
                }),
                reader_abort: StdMutex::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn state(&self) -> &StateStore {
        &self.inner.state
    }

    pub fn snapshot(&self) -> GatewaySessionState {
        self.inner.state.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.connection()
    }

    pub fn is_ready(&self) -> bool {
        self.connection_state().is_ready()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.state.messages()
    }

    pub fn last_error(&self) -> Option<Fault> {
        self.inner.state.last_error()
    }

    pub fn agent_name(&self) -> Option<String> {
        self.inner.state.agent_name()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.state.subscribe()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.watch_connection()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Replace the configuration used by the next `connect()`
    pub async fn update_config(&self, config: GatewayConfig) {
        self.inner.link.lock().await.config = config;
    }

    /// Open the socket, authenticate and start receiving.
    ///
    /// Any existing connection is closed first. Failures leave the session
    /// `Disconnected` with the error recorded.
    pub async fn connect(&self) -> Result<()> {
        let mut link = self.inner.link.lock().await;

        if link.sink.is_some() || link.reader.is_some() {
            self.inner.state.set_connection(ConnectionState::Closing);
            self.inner.teardown(&mut link).await;
            self.inner.state.set_connection(ConnectionState::Disconnected);
        }

        match self.inner.establish(&mut link).await {
            Ok(()) => {
                self.inner.state.clear_error();
                self.inner.state.set_connection(ConnectionState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!("Gateway connect failed: {}", e);
                self.inner.state.set_connection(ConnectionState::Disconnected);
                self.inner.state.record_error(&e);
                Err(e)
            }
        }
    }

    /// Close the connection. Idempotent.
    pub async fn disconnect(&self) {
        let mut link = self.inner.link.lock().await;

        if link.sink.is_none() && link.reader.is_none() {
            self.inner.state.set_connection(ConnectionState::Disconnected);
            return;
        }

        self.inner.state.set_connection(ConnectionState::Closing);
        self.inner.teardown(&mut link).await;
        self.inner.state.set_connection(ConnectionState::Disconnected);
        info!("Disconnected from gateway");
    }

    /// Append an optimistic user message and send it as `chat.send`.
    ///
    /// The message stays in the log even if the send fails.
    pub async fn send_message(&self, content: &str) -> Result<()> {
        let mut link = self.inner.link.lock().await;

        if !self.is_ready() || link.sink.is_none() {
            self.inner.state.record_error(&Error::NotConnected);
            return Err(Error::NotConnected);
        }

        let session_key = link.config.session_key.clone();
        self.inner
            .state
            .append_message(ChatMessage::user(content, Some(session_key.clone())));

        let request = ChatSendRequest {
            message: content.to_string(),
            session_key,
        };
        self.inner.send_event(&mut link, events::CHAT_SEND, &request).await
    }

    /// Ask for recent history. Replies arrive as `chat` events.
    pub async fn fetch_history(&self) -> Result<()> {
        let mut link = self.inner.link.lock().await;
        if !self.is_ready() {
            return Ok(());
        }

        let request = ChatHistoryRequest {
            session_key: link.config.session_key.clone(),
            limit: HISTORY_LIMIT,
        };
        self.inner.send_event(&mut link, events::CHAT_HISTORY, &request).await
    }

    /// Ask for gateway status. The reply arrives as a `status` event.
    pub async fn check_status(&self) -> Result<()> {
        let mut link = self.inner.link.lock().await;
        if !self.is_ready() {
            return Ok(());
        }

        self.inner
            .send_event(&mut link, events::STATUS, &serde_json::json!({}))
            .await
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        // Once the reader is gone nothing else holds `Inner`, and dropping
        // it drops the sink.
        if let Some(reader) = self.inner.take_reader_abort() {
            reader.abort();
        }
    }
}

impl Inner {
    async fn establish(self: &Arc<Self>, link: &mut Link) -> Result<()> {
        if !link.config.is_configured() {
            return Err(Error::NotConfigured(
                "gateway URL and token are required".to_string(),
            ));
        }
        let url = build_gateway_url(&link.config.url)?;

        self.state.set_connection(ConnectionState::Connecting);
        info!("Connecting to gateway at {}", url);
        let Connection { mut sink, source } = self.transport.open(&url).await?;

        self.state.set_connection(ConnectionState::Authenticating);
        let credential = AuthCredential::new(link.config.token.expose_secret());
        if let Err(e) = sink.send(codec::encode_handshake(&credential)).await {
            let _ = sink.close().await;
            return Err(e);
        }

        link.sink = Some(sink);
        let reader = tokio::spawn(receive_loop(Arc::downgrade(self), source));
        *self.reader_abort_slot() = Some(reader.abort_handle());
        link.reader = Some(reader);
        info!("Gateway handshake sent");
        Ok(())
    }

    fn reader_abort_slot(&self) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
        self.reader_abort.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_reader_abort(&self) -> Option<AbortHandle> {
        self.reader_abort_slot().take()
    }

    /// Stop the receive task and close the socket
    async fn teardown(&self, link: &mut Link) {
        self.take_reader_abort();
        if let Some(reader) = link.reader.take() {
            reader.abort();
            // Wait so no frame is handled after this returns
            let _ = reader.await;
        }
        if let Some(mut sink) = link.sink.take() {
            if let Err(e) = sink.close().await {
                debug!("Error closing gateway socket: {}", e);
            }
        }
    }

    async fn send_event<T: Serialize>(&self, link: &mut Link, name: &str, payload: &T) -> Result<()> {
        let result = match link.sink.as_mut() {
            Some(sink) => {
                let payload = serde_json::to_value(payload)?;
                sink.send(codec::encode_event(name, &payload)).await
            }
            None => Err(Error::NotConnected),
        };

        match &result {
            Ok(()) => {
                debug!("Sent '{}' event", name);
                self.state.clear_error();
            }
            Err(e) => {
                warn!("Failed to send '{}' event: {}", name, e);
                self.state.record_error(e);
            }
        }
        result
    }

    async fn handle_inbound(&self, inbound: Inbound) -> Result<()> {
        let Some(text) = inbound.into_text() else {
            debug!("Ignoring binary frame that is not UTF-8");
            return Ok(());
        };

        match codec::decode(&text) {
            WireFrame::HeartbeatPing => {
                let mut link = self.link.lock().await;
                if let Some(sink) = link.sink.as_mut() {
                    sink.send(codec::encode_heartbeat_ack()).await?;
                }
            }
            WireFrame::Event { name, payload } => {
                self.events.dispatch(&name, &payload, &self.state);
            }
            WireFrame::Open(meta) => debug!("Gateway open: {}", meta),
            WireFrame::HeartbeatPong | WireFrame::Noop => {}
        }
        Ok(())
    }

    async fn on_transport_lost(&self, err: Error) {
        let mut link = self.link.lock().await;
        warn!("Gateway connection lost: {}", err);

        if let Some(mut sink) = link.sink.take() {
            let _ = sink.close().await;
        }
        // This is the running task's own handle
        drop(link.reader.take());
        self.take_reader_abort();

        self.state.set_connection(ConnectionState::Disconnected);
        self.state.record_error(&err);
    }
}

async fn receive_loop(inner: Weak<Inner>, mut source: Box<dyn FrameSource>) {
    loop {
        let next = source.next_frame().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };

        let failure = match next {
            Some(Ok(inbound)) => match inner.handle_inbound(inbound).await {
                Ok(()) => continue,
                Err(e) => e,
            },
            Some(Err(e)) => e,
            None => Error::Transport("connection closed by gateway".to_string()),
        };

        inner.on_transport_lost(failure).await;
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gateway::memory::{MemoryPeer, MemoryServer, MemoryTransport};
    use crate::gateway::types::Role;
    use secrecy::SecretString;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_test::{assert_err, assert_ok};

    const WAIT: Duration = Duration::from_secs(2);

    fn config() -> GatewayConfig {
        GatewayConfig {
            url: "https://gw.test".into(),
            token: SecretString::from("tok".to_string()),
            session_key: "s".into(),
        }
    }

    async fn ready_session() -> (GatewaySession, MemoryServer, MemoryPeer) {
        let (transport, mut server) = MemoryTransport::pair();
        let session = GatewaySession::with_transport(config(), Arc::new(transport));
        assert_ok!(session.connect().await);

        let mut peer = server.accept().await.unwrap();
        assert_eq!(peer.recv().await.unwrap(), r#"40{"auth":{"token":"tok"}}"#);
        (session, server, peer)
    }

    async fn wait_event<F>(rx: &mut broadcast::Receiver<SessionEvent>, pred: F) -> SessionEvent
    where
        F: Fn(&SessionEvent) -> bool,
    {
        timeout(WAIT, async {
            loop {
                match rx.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for session event")
    }

    async fn wait_disconnected(session: &GatewaySession) {
        let mut rx = session.watch_connection();
        timeout(WAIT, rx.wait_for(|s| *s == ConnectionState::Disconnected))
            .await
            .expect("timed out waiting for disconnect")
            .unwrap();
    }

    #[test]
    fn test_build_gateway_url() {
        let cases = [
            ("https://gw.example.com", "wss://gw.example.com/socket.io/?EIO=4&transport=websocket"),
            ("http://10.0.0.2:3000/", "ws://10.0.0.2:3000/socket.io/?EIO=4&transport=websocket"),
            ("gw.local:18789", "ws://gw.local:18789/socket.io/?EIO=4&transport=websocket"),
            (" wss://gw.example.com ", "wss://gw.example.com/socket.io/?EIO=4&transport=websocket"),
        ];
        for (input, expected) in cases {
            assert_eq!(build_gateway_url(input).unwrap().as_str(), expected, "input: {}", input);
        }

        assert!(matches!(build_gateway_url("  "), Err(Error::NotConfigured(_))));
        assert!(matches!(build_gateway_url("gw host.local"), Err(Error::InvalidUrl(_))));
        assert!(matches!(build_gateway_url("https://[::1"), Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_connect_reaches_ready() {
        let (session, _server, peer) = ready_session().await;
        assert_eq!(session.connection_state(), ConnectionState::Ready);
        assert!(session.last_error().is_none());
        assert_eq!(
            peer.url().as_str(),
            "wss://gw.test/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[tokio::test]
    async fn test_connect_walks_through_states() {
        let (transport, _server) = MemoryTransport::pair();
        let session = GatewaySession::with_transport(config(), Arc::new(transport));
        let mut rx = session.subscribe();

        session.connect().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::ConnectionChanged(state) = event {
                seen.push(state);
            }
        }
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Authenticating,
                ConnectionState::Ready
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_with_empty_token() {
        let (transport, server) = MemoryTransport::pair();
        let mut cfg = config();
        cfg.token = SecretString::from(String::new());
        let session = GatewaySession::with_transport(cfg, Arc::new(transport));

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.last_error().unwrap().kind, ErrorKind::NotConfigured);
        assert_eq!(server.open_attempts(), 0);
    }

    #[tokio::test]
    async fn test_connect_with_invalid_url() {
        let (transport, server) = MemoryTransport::pair();
        let mut cfg = config();
        cfg.url = "gw host.local".into();
        let session = GatewaySession::with_transport(cfg, Arc::new(transport));

        assert!(session.connect().await.is_err());
        assert_eq!(session.last_error().unwrap().kind, ErrorKind::InvalidUrl);
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(server.open_attempts(), 0);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (transport, server) = MemoryTransport::pair();
        server.refuse_connections(true);
        let session = GatewaySession::with_transport(config(), Arc::new(transport));

        assert_err!(session.connect().await);
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.last_error().unwrap().kind, ErrorKind::Transport);
        assert_eq!(server.open_attempts(), 1);
    }

    #[tokio::test]
    async fn test_handshake_send_failure() {
        let (transport, server) = MemoryTransport::pair();
        server.fail_sends(true);
        let session = GatewaySession::with_transport(config(), Arc::new(transport));

        assert!(session.connect().await.is_err());
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.last_error().unwrap().kind, ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_ping_is_acked_before_next_frame() {
        let (session, _server, mut peer) = ready_session().await;
        let mut rx = session.subscribe();

        peer.send_text("2");
        peer.send_text(r#"42["chat",{"role":"assistant","text":"after ping"}]"#);

        wait_event(&mut rx, |e| matches!(e, SessionEvent::MessageAppended(_))).await;
        // The ack is already on the wire by the time the chat is applied
        assert_eq!(peer.try_recv().as_deref(), Some("3"));
        assert_eq!(peer.try_recv(), None);
    }

    #[tokio::test]
    async fn test_incoming_chat() {
        let (session, _server, peer) = ready_session().await;
        let mut rx = session.subscribe();

        peer.send_text(r#"42["chat",{"role":"assistant"}]"#);
        peer.send_text(r#"42["chat",{"role":"assistant","text":"hi"}]"#);

        let event = wait_event(&mut rx, |e| matches!(e, SessionEvent::MessageAppended(_))).await;
        let SessionEvent::MessageAppended(message) = event else {
            unreachable!()
        };
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "hi");
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_status_event_sets_agent_name() {
        let (session, _server, peer) = ready_session().await;
        let mut rx = session.subscribe();

        peer.send_text(r#"42["status",{"agentName":"Enigma"}]"#);

        wait_event(&mut rx, |e| matches!(e, SessionEvent::AgentNameChanged(_))).await;
        assert_eq!(session.agent_name().as_deref(), Some("Enigma"));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_binary_and_malformed_frames() {
        let (session, _server, peer) = ready_session().await;
        let mut rx = session.subscribe();

        peer.send_binary(vec![0xff, 0x00, 0xfe]);
        peer.send_text("42[not json");
        peer.send_text(r#"0{"sid":"x"}"#);
        peer.send_binary(br#"42["status",{"agentName":"Bin"}]"#.to_vec());

        wait_event(&mut rx, |e| matches!(e, SessionEvent::AgentNameChanged(_))).await;
        assert_eq!(session.agent_name().as_deref(), Some("Bin"));
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn test_send_message_when_disconnected() {
        let (transport, _server) = MemoryTransport::pair();
        let session = GatewaySession::with_transport(config(), Arc::new(transport));

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(session.messages().is_empty());
        assert_eq!(session.last_error().unwrap().kind, ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_send_message_appends_and_sends() {
        let (session, _server, mut peer) = ready_session().await;

        session.send_message("hello").await.unwrap();

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_user());
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[0].session_key.as_deref(), Some("s"));
        assert_eq!(
            peer.recv().await.unwrap(),
            r#"42["chat.send",{"message":"hello","sessionKey":"s"}]"#
        );
    }

    #[tokio::test]
    async fn test_failed_send_keeps_optimistic_message() {
        let (session, server, _peer) = ready_session().await;
        server.fail_sends(true);

        assert!(session.send_message("lost").await.is_err());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.last_error().unwrap().kind, ErrorKind::Transport);
        assert_eq!(session.connection_state(), ConnectionState::Ready);

        server.fail_sends(false);
        session.check_status().await.unwrap();
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_server_echo_is_appended_again() {
        let (session, _server, peer) = ready_session().await;
        let mut rx = session.subscribe();

        session.send_message("hi").await.unwrap();
        peer.send_text(r#"42["chat",{"role":"user","text":"hi"}]"#);

        wait_event(&mut rx, |e| matches!(e, SessionEvent::MessageAppended(m) if m.id != session.messages()[0].id)).await;
        let contents: Vec<_> = session.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["hi", "hi"]);
    }

    #[tokio::test]
    async fn test_history_and_status_frames() {
        let (session, _server, mut peer) = ready_session().await;

        session.fetch_history().await.unwrap();
        session.check_status().await.unwrap();

        assert_eq!(
            peer.recv().await.unwrap(),
            r#"42["chat.history",{"limit":50,"sessionKey":"s"}]"#
        );
        assert_eq!(peer.recv().await.unwrap(), r#"42["status",{}]"#);
    }

    #[tokio::test]
    async fn test_history_and_status_are_noops_when_disconnected() {
        let (transport, _server) = MemoryTransport::pair();
        let session = GatewaySession::with_transport(config(), Arc::new(transport));

        assert_ok!(session.fetch_history().await);
        assert_ok!(session.check_status().await);
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_receive_error_disconnects() {
        let (session, _server, peer) = ready_session().await;

        peer.fail("connection reset");
        wait_disconnected(&session).await;

        let fault = session.last_error().unwrap();
        assert_eq!(fault.kind, ErrorKind::Transport);
        assert!(fault.message.contains("connection reset"));
        assert!(matches!(session.send_message("x").await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_remote_close_disconnects() {
        let (session, _server, peer) = ready_session().await;

        peer.close();
        wait_disconnected(&session).await;
        assert_eq!(session.last_error().unwrap().kind, ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_disconnect_releases_transport() {
        let (session, _server, mut peer) = ready_session().await;

        session.disconnect().await;
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(peer.recv().await.is_none());

        // Frames after disconnect are never handled
        peer.send_text(r#"42["chat",{"role":"assistant","text":"late"}]"#);
        tokio::task::yield_now().await;
        assert!(session.messages().is_empty());

        session.disconnect().await;
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_reconnect_retains_log_and_agent_name() {
        let (session, mut server, peer) = ready_session().await;
        let mut rx = session.subscribe();

        peer.send_text(r#"42["status",{"agentName":"Enigma"}]"#);
        wait_event(&mut rx, |e| matches!(e, SessionEvent::AgentNameChanged(_))).await;
        session.send_message("first").await.unwrap();

        session.disconnect().await;
        session.connect().await.unwrap();

        let mut second = server.accept().await.unwrap();
        assert_eq!(second.recv().await.unwrap(), r#"40{"auth":{"token":"tok"}}"#);
        assert!(session.is_ready());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.agent_name().as_deref(), Some("Enigma"));

        second.send_text(r#"42["chat",{"role":"assistant","text":"welcome back"}]"#);
        wait_event(&mut rx, |e| matches!(e, SessionEvent::MessageAppended(m) if m.content == "welcome back")).await;
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_connect_while_ready_replaces_connection() {
        let (session, mut server, mut first) = ready_session().await;
        let mut rx = session.subscribe();

        session.connect().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::ConnectionChanged(state) = event {
                seen.push(state);
            }
        }
        assert_eq!(
            seen,
            vec![
                ConnectionState::Closing,
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Authenticating,
                ConnectionState::Ready
            ]
        );
        assert!(first.recv().await.is_none());

        let mut second = server.accept().await.unwrap();
        assert!(second.recv().await.is_some());
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn test_drop_releases_connection() {
        let (session, _server, mut peer) = ready_session().await;

        drop(session);
        let closed = timeout(WAIT, peer.recv()).await.expect("sink was not released");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_drop_stops_reader_while_link_is_locked() {
        let (session, _server, peer) = ready_session().await;

        let inner = session.inner.clone();
        let guard = inner.link.lock().await;
        drop(session);

        timeout(WAIT, async {
            while !peer.client_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reader kept running after drop");
        drop(guard);
    }

    #[tokio::test]
    async fn test_update_config_applies_on_next_connect() {
        let (transport, mut server) = MemoryTransport::pair();
        let session = GatewaySession::with_transport(GatewayConfig::default(), Arc::new(transport));
        assert!(session.connect().await.is_err());

        session.update_config(config()).await;
        session.connect().await.unwrap();
        assert!(server.accept().await.is_some());
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_racing_send() {
        let (session, _server, mut peer) = ready_session().await;
        let session = Arc::new(session);

        let sender = {
            let session = session.clone();
            tokio::spawn(async move { session.send_message("race").await })
        };
        let closer = {
            let session = session.clone();
            tokio::spawn(async move { session.disconnect().await })
        };

        let sent = sender.await.unwrap();
        closer.await.unwrap();

        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        match sent {
            Ok(()) => {
                assert_eq!(peer.recv().await.unwrap(), r#"42["chat.send",{"message":"race","sessionKey":"s"}]"#);
                assert_eq!(session.messages().len(), 1);
            }
            Err(e) => {
                assert!(matches!(e, Error::NotConnected));
                assert!(session.messages().is_empty());
            }
        }
        assert!(peer.recv().await.is_none());
    }
}
