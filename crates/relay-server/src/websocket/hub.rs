//! Connection lifecycle and the hub task that serializes it.
//!
//! [`Relay`] is the synchronous state machine: it owns the [`Fanout`] and
//! the [`Registry`] and turns transport events into deliveries. [`Hub`]
//! runs one `Relay` inside a single task fed by an ordered mpsc queue, so
//! every registration check-and-insert and every broadcast happens without
//! interleaving.
//!
//! Per-connection lifecycle:
//!
//! ```text
//! Unregistered --register ok--> Registered --disconnect--> Closed
//!      |                                                     ^
//!      +--- malformed / name taken / disconnect -------------+
//! ```

use metrics::{counter, gauge};
use relay_core::{ClientFrame, ConnectionId, RegisterError, ServerFrame, notices};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::fanout::Fanout;
use super::registry::{Registry, Session};
use super::router::{self, RouteOutcome};
use crate::metrics::{FRAMES_MALFORMED_TOTAL, REGISTRATIONS_REJECTED_TOTAL, SESSIONS_ACTIVE};

/// Where a connection stands from the hub's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Open, no nickname yet. Only `register_nickname` is accepted.
    Unregistered,
    /// Open and holding a nickname.
    Registered,
    /// Closed, force-closed, or never seen.
    Closed,
}

/// Why a connection left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a Close frame or the stream ended.
    ClientClosed,
    /// Reading from or writing to the socket failed.
    TransportError,
    /// The server closed the socket.
    ServerClosed,
}

impl DisconnectReason {
    /// Label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::ServerClosed => "server_closed",
        }
    }
}

/// What the gate or the router did with one inbound payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextOutcome {
    /// Registration succeeded.
    Registered(String),
    /// Registration was refused. `NameTaken` also closes the connection.
    Rejected(RegisterError),
    /// Connection was closed for sending something other than a valid
    /// registration before registering.
    GateClosed,
    /// Payload from a registered connection failed to decode.
    Malformed,
    /// Routed by the router.
    Routed(RouteOutcome),
    /// Connection is not open.
    Stale,
}

// ─────────────────────────────────────────────────────────────────────────────
// Relay state machine
// ─────────────────────────────────────────────────────────────────────────────

/// Registry plus open connections, and the rules that tie them together.
#[derive(Debug, Default)]
pub struct Relay {
    fanout: Fanout,
    registry: Registry,
}

impl Relay {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered sessions.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lifecycle state of `id`.
    pub fn state(&self, id: ConnectionId) -> ConnectionState {
        if !self.fanout.contains(id) {
            ConnectionState::Closed
        } else if self.registry.contains(id) {
            ConnectionState::Registered
        } else {
            ConnectionState::Unregistered
        }
    }

    /// Track a newly accepted connection as unregistered.
    pub fn connect(&mut self, connection: ClientConnection) {
        debug!(conn_id = %connection.id, "connection added to relay");
        self.fanout.add(connection);
    }

    /// Handle one text payload from `id`.
    pub fn handle_text(&mut self, id: ConnectionId, raw: &str) -> TextOutcome {
        match self.state(id) {
            ConnectionState::Closed => TextOutcome::Stale,
            ConnectionState::Unregistered => self.gate(id, ClientFrame::decode(raw).ok()),
            ConnectionState::Registered => match ClientFrame::decode(raw) {
                Ok(frame) => {
                    TextOutcome::Routed(router::route(&self.fanout, &self.registry, id, frame))
                }
                Err(e) => {
                    counter!(FRAMES_MALFORMED_TOTAL).increment(1);
                    debug!(conn_id = %id, error = %e, "dropping malformed frame");
                    TextOutcome::Malformed
                }
            },
        }
    }

    /// Handle a binary payload from `id`. Treated as malformed.
    pub fn handle_binary(&mut self, id: ConnectionId, len: usize) -> TextOutcome {
        match self.state(id) {
            ConnectionState::Closed => TextOutcome::Stale,
            ConnectionState::Unregistered => self.gate(id, None),
            ConnectionState::Registered => {
                counter!(FRAMES_MALFORMED_TOTAL).increment(1);
                debug!(conn_id = %id, len, "dropping binary frame");
                TextOutcome::Malformed
            }
        }
    }

    /// Pre-registration gate. `None` means the payload did not decode.
    fn gate(&mut self, id: ConnectionId, frame: Option<ClientFrame>) -> TextOutcome {
        if let Some(ClientFrame::RegisterNickname {
            nickname: Some(nickname),
        }) = &frame
            && !nickname.is_empty()
        {
            return match self.register(id, nickname) {
                Ok(session) => TextOutcome::Registered(session.nickname),
                Err(e) => TextOutcome::Rejected(e),
            };
        }

        if frame.is_none() {
            counter!(FRAMES_MALFORMED_TOTAL).increment(1);
        }
        counter!(REGISTRATIONS_REJECTED_TOTAL, "reason" => "gate").increment(1);
        warn!(
            conn_id = %id,
            frame = frame.as_ref().map_or("malformed", ClientFrame::kind),
            "closing unregistered connection"
        );
        let _ = self.fanout.close(id);
        TextOutcome::GateClosed
    }

    /// Claim `nickname` for `id` and announce it.
    ///
    /// On success: welcome to `id`, user list to every open connection,
    /// then the join notice to every other open connection. A taken name
    /// gets a notice and a forced close. An empty name changes nothing.
    pub fn register(&mut self, id: ConnectionId, nickname: &str) -> Result<Session, RegisterError> {
        match self.registry.register(id, nickname) {
            Ok(session) => {
                let nick = session.nickname.as_str();
                let _ = self.fanout.notify(id, notices::welcome(nick));
                let _ = self.fanout.broadcast(&self.user_list());
                let _ = self
                    .fanout
                    .broadcast_except(id, &ServerFrame::notification(notices::joined(nick)));
                gauge!(SESSIONS_ACTIVE).set(self.registry.len() as f64);
                info!(conn_id = %id, nickname = nick, users = self.registry.len(), "nickname registered");
                Ok(session)
            }
            Err(e) => {
                let reason = match &e {
                    RegisterError::NameTaken(_) => {
                        let _ = self.fanout.notify(id, notices::NAME_TAKEN);
                        let _ = self.fanout.close(id);
                        "name_taken"
                    }
                    RegisterError::EmptyNickname => "empty",
                    RegisterError::AlreadyRegistered(_) => "already_registered",
                };
                counter!(REGISTRATIONS_REJECTED_TOTAL, "reason" => reason).increment(1);
                warn!(conn_id = %id, error = %e, "registration refused");
                Err(e)
            }
        }
    }

    /// Release the session held by `id` and announce the departure.
    ///
    /// No-op when `id` holds no session, so calling it twice is harmless.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Session> {
        let session = self.registry.unregister(id)?;
        let _ = self.fanout.broadcast(&self.user_list());
        let _ = self
            .fanout
            .broadcast(&ServerFrame::notification(notices::left(&session.nickname)));
        gauge!(SESSIONS_ACTIVE).set(self.registry.len() as f64);
        info!(conn_id = %id, nickname = %session.nickname, users = self.registry.len(), "nickname released");
        Some(session)
    }

    /// Transport for `id` is gone: stop delivering to it, then clean up.
    pub fn disconnect(&mut self, id: ConnectionId, reason: DisconnectReason) -> Option<Session> {
        let connected_for = self.fanout.remove(id).map(|conn| conn.age());
        let session = self.unregister(id);
        debug!(
            conn_id = %id,
            reason = reason.as_str(),
            registered = session.is_some(),
            ?connected_for,
            "connection removed from relay"
        );
        session
    }

    fn user_list(&self) -> ServerFrame {
        ServerFrame::UserList {
            users: self.registry.nicknames(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hub task
// ─────────────────────────────────────────────────────────────────────────────

/// Event posted by a connection task.
#[derive(Debug)]
pub enum HubEvent {
    /// A WebSocket upgrade completed.
    Connected(ClientConnection),
    /// A text frame arrived.
    Text {
        /// Sending connection.
        id: ConnectionId,
        /// Raw payload.
        text: String,
    },
    /// A binary frame arrived.
    Binary {
        /// Sending connection.
        id: ConnectionId,
        /// Payload length in bytes.
        len: usize,
    },
    /// The transport ended.
    Disconnected {
        /// Departing connection.
        id: ConnectionId,
        /// Why it left.
        reason: DisconnectReason,
    },
}

/// Cloneable sender side of the hub queue.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    /// Post an event. Returns `false` once the hub has stopped.
    pub async fn send(&self, event: HubEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// Owner of the relay state.
pub struct Hub {
    relay: Relay,
    rx: mpsc::Receiver<HubEvent>,
}

impl Hub {
    /// Start the hub task with a queue of `buffer` events.
    ///
    /// The task ends once every [`HubHandle`] is dropped.
    pub fn spawn(buffer: usize) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let hub = Self {
            relay: Relay::new(),
            rx,
        };
        (HubHandle { tx }, tokio::spawn(hub.run()))
    }

    async fn run(mut self) {
        info!("relay hub started");
        while let Some(event) = self.rx.recv().await {
            self.handle(event);
        }
        info!(users = self.relay.registry.len(), "relay hub stopped");
    }

    fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected(conn) => self.relay.connect(conn),
            HubEvent::Text { id, text } => {
                let _ = self.relay.handle_text(id, &text);
            }
            HubEvent::Binary { id, len } => {
                let _ = self.relay.handle_binary(id, len);
            }
            HubEvent::Disconnected { id, reason } => {
                let _ = self.relay.disconnect(id, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Outbound;
    use crate::websocket::connection::tests::make_connection;
    use assert_matches::assert_matches;
    use std::time::Duration;

    struct Client {
        id: ConnectionId,
        rx: mpsc::Receiver<Outbound>,
    }

    impl Client {
        fn drain(&mut self) -> Vec<Outbound> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }

        fn frames(&mut self) -> Vec<ServerFrame> {
            self.drain()
                .into_iter()
                .filter_map(|o| match o {
                    Outbound::Frame(json) => Some(serde_json::from_str(&json).unwrap()),
                    Outbound::Close => None,
                })
                .collect()
        }
    }

    fn connect(relay: &mut Relay) -> Client {
        let (conn, rx) = make_connection();
        let id = conn.id;
        relay.connect(conn);
        Client { id, rx }
    }

    fn register_json(nickname: &str) -> String {
        serde_json::json!({ "type": "register_nickname", "nickname": nickname }).to_string()
    }

    fn joined(relay: &mut Relay, nickname: &str) -> Client {
        let mut client = connect(relay);
        assert_eq!(
            relay.handle_text(client.id, &register_json(nickname)),
            TextOutcome::Registered(nickname.into())
        );
        let _ = client.drain();
        client
    }

    fn note(text: &str) -> ServerFrame {
        ServerFrame::notification(text)
    }

    fn users(names: &[&str]) -> ServerFrame {
        ServerFrame::UserList {
            users: names.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn register_sends_welcome_then_user_list() {
        let mut relay = Relay::new();
        let mut alice = connect(&mut relay);
        assert_eq!(relay.state(alice.id), ConnectionState::Unregistered);

        let outcome = relay.handle_text(alice.id, &register_json("alice"));
        assert_eq!(outcome, TextOutcome::Registered("alice".into()));
        assert_eq!(relay.state(alice.id), ConnectionState::Registered);
        assert_eq!(
            alice.frames(),
            vec![note("Bem-vindo, alice!"), users(&["alice"])]
        );
    }

    #[test]
    fn register_announces_to_others_after_user_list() {
        let mut relay = Relay::new();
        let mut alice = joined(&mut relay, "alice");
        let mut lurker = connect(&mut relay);
        let mut bob = connect(&mut relay);

        let _ = relay.handle_text(bob.id, &register_json("  bob "));
        assert_eq!(
            bob.frames(),
            vec![note("Bem-vindo, bob!"), users(&["alice", "bob"])]
        );
        let expected = vec![users(&["alice", "bob"]), note("bob entrou no chat.")];
        assert_eq!(alice.frames(), expected);
        assert_eq!(lurker.frames(), expected);
    }

    #[test]
    fn duplicate_nickname_is_notified_and_closed() {
        let mut relay = Relay::new();
        let mut alice = joined(&mut relay, "alice");
        let mut impostor = connect(&mut relay);

        let outcome = relay.handle_text(impostor.id, &register_json("alice"));
        assert_matches!(outcome, TextOutcome::Rejected(RegisterError::NameTaken(_)));
        assert_eq!(
            impostor.drain(),
            vec![
                Outbound::Frame(std::sync::Arc::new(note(notices::NAME_TAKEN).encode().unwrap())),
                Outbound::Close,
            ]
        );
        assert_eq!(relay.state(impostor.id), ConnectionState::Closed);
        assert_eq!(relay.registry().len(), 1);
        assert!(alice.frames().is_empty());
    }

    #[test]
    fn whitespace_nickname_keeps_connection_open() {
        let mut relay = Relay::new();
        let mut client = connect(&mut relay);

        let outcome = relay.handle_text(client.id, &register_json("   "));
        assert_eq!(outcome, TextOutcome::Rejected(RegisterError::EmptyNickname));
        assert_eq!(relay.state(client.id), ConnectionState::Unregistered);
        assert!(client.drain().is_empty());
        assert!(relay.registry().is_empty());

        // Still allowed to register afterwards
        assert_eq!(
            relay.handle_text(client.id, &register_json("carol")),
            TextOutcome::Registered("carol".into())
        );
    }

    #[test]
    fn gate_closes_on_anything_but_registration() {
        let payloads = [
            "not json",
            r#"{"type":"message","text":"hi"}"#,
            r#"{"type":"dm","target":"bob","text":"hi"}"#,
            r#"{"type":"register_nickname"}"#,
            r#"{"type":"register_nickname","nickname":""}"#,
            r#"{"type":"register_nickname","nickname":42}"#,
            r#"{"type":"bogus"}"#,
            r#"["register_nickname"]"#,
        ];
        for payload in payloads {
            let mut relay = Relay::new();
            let mut client = connect(&mut relay);
            assert_eq!(
                relay.handle_text(client.id, payload),
                TextOutcome::GateClosed,
                "payload: {payload}"
            );
            assert_eq!(client.drain(), vec![Outbound::Close], "payload: {payload}");
            assert_eq!(relay.state(client.id), ConnectionState::Closed);
        }
    }

    #[test]
    fn binary_before_registration_closes() {
        let mut relay = Relay::new();
        let mut client = connect(&mut relay);
        assert_eq!(relay.handle_binary(client.id, 4), TextOutcome::GateClosed);
        assert_eq!(client.drain(), vec![Outbound::Close]);
    }

    #[test]
    fn malformed_after_registration_is_ignored() {
        let mut relay = Relay::new();
        let mut alice = joined(&mut relay, "alice");

        assert_eq!(relay.handle_text(alice.id, "{oops"), TextOutcome::Malformed);
        assert_eq!(relay.handle_binary(alice.id, 3), TextOutcome::Malformed);
        assert_eq!(relay.state(alice.id), ConnectionState::Registered);
        assert!(alice.drain().is_empty());
    }

    #[test]
    fn dm_to_absent_user_notifies_sender_only() {
        let mut relay = Relay::new();
        let mut alice = joined(&mut relay, "alice");
        let mut carol = joined(&mut relay, "carol");
        let _ = alice.drain();

        let _ = relay.handle_text(alice.id, r#"{"type":"dm","target":"bob","text":"hi"}"#);
        assert_eq!(alice.frames(), vec![note("Usuário \"bob\" não está online.")]);
        assert!(carol.frames().is_empty());
    }

    #[test]
    fn disconnect_sends_user_list_then_departure() {
        let mut relay = Relay::new();
        let alice = joined(&mut relay, "alice");
        let mut bob = joined(&mut relay, "bob");
        let _ = bob.drain();

        let session = relay.disconnect(alice.id, DisconnectReason::ClientClosed);
        assert_eq!(session.map(|s| s.nickname), Some("alice".into()));
        assert_eq!(
            bob.frames(),
            vec![users(&["bob"]), note("alice saiu do chat.")]
        );
        assert_eq!(relay.state(alice.id), ConnectionState::Closed);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let mut relay = Relay::new();
        let alice = joined(&mut relay, "alice");
        let mut bob = joined(&mut relay, "bob");
        let _ = bob.drain();

        assert!(relay.disconnect(alice.id, DisconnectReason::TransportError).is_some());
        assert!(relay.disconnect(alice.id, DisconnectReason::ClientClosed).is_none());
        assert!(relay.unregister(alice.id).is_none());
        assert_eq!(bob.frames().len(), 2);
    }

    #[test]
    fn unregistered_disconnect_is_silent() {
        let mut relay = Relay::new();
        let mut alice = joined(&mut relay, "alice");
        let lurker = connect(&mut relay);

        assert!(relay.disconnect(lurker.id, DisconnectReason::ClientClosed).is_none());
        assert!(alice.frames().is_empty());
    }

    #[test]
    fn closed_connection_frames_are_stale() {
        let mut relay = Relay::new();
        let alice = joined(&mut relay, "alice");
        let _ = relay.disconnect(alice.id, DisconnectReason::ClientClosed);
        assert_eq!(
            relay.handle_text(alice.id, r#"{"type":"message","text":"ghost"}"#),
            TextOutcome::Stale
        );
    }

    #[test]
    fn nickname_reusable_after_departure() {
        let mut relay = Relay::new();
        let alice = joined(&mut relay, "alice");
        let _ = relay.disconnect(alice.id, DisconnectReason::ClientClosed);
        let _again = joined(&mut relay, "alice");
        assert_eq!(relay.registry().nicknames(), vec!["alice"]);
    }

    #[test]
    fn disconnect_reason_labels() {
        assert_eq!(DisconnectReason::ClientClosed.as_str(), "client_closed");
        assert_eq!(DisconnectReason::TransportError.as_str(), "transport_error");
        assert_eq!(DisconnectReason::ServerClosed.as_str(), "server_closed");
    }

    async fn recv_frame(rx: &mut mpsc::Receiver<Outbound>) -> ServerFrame {
        let out = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed");
        match out {
            Outbound::Frame(json) => serde_json::from_str(&json).unwrap(),
            Outbound::Close => panic!("unexpected close"),
        }
    }

    #[tokio::test]
    async fn hub_task_processes_events_in_order() {
        let (handle, task) = Hub::spawn(16);

        let (alice, mut alice_rx) = make_connection();
        let (bob, mut bob_rx) = make_connection();
        let (alice_id, bob_id) = (alice.id, bob.id);

        assert!(handle.send(HubEvent::Connected(alice)).await);
        assert!(handle.send(HubEvent::Connected(bob)).await);
        assert!(
            handle
                .send(HubEvent::Text { id: alice_id, text: register_json("alice") })
                .await
        );
        assert!(
            handle
                .send(HubEvent::Text { id: bob_id, text: register_json("bob") })
                .await
        );

        assert_eq!(recv_frame(&mut alice_rx).await, note("Bem-vindo, alice!"));
        assert_eq!(recv_frame(&mut alice_rx).await, users(&["alice"]));
        assert_eq!(recv_frame(&mut alice_rx).await, users(&["alice", "bob"]));
        assert_eq!(recv_frame(&mut alice_rx).await, note("bob entrou no chat."));

        assert!(
            handle
                .send(HubEvent::Disconnected { id: alice_id, reason: DisconnectReason::ClientClosed })
                .await
        );
        // bob: alice joining, own registration, then alice leaving
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(recv_frame(&mut bob_rx).await);
        }
        assert_eq!(
            seen,
            vec![
                users(&["alice"]),
                note("alice entrou no chat."),
                note("Bem-vindo, bob!"),
                users(&["alice", "bob"]),
                users(&["bob"]),
                note("alice saiu do chat."),
            ]
        );

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("hub did not stop")
            .unwrap();
    }
}
