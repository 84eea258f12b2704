use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::HeaderMap;
use parking_lot::Mutex;
use switchboard::ack::AckManager;
use switchboard::config::Config;
use switchboard::error::{StoreError, TransportError};
use switchboard::gateway::packet::Packet;
use switchboard::namespace::{Namespace, NamespaceListener};
use switchboard::session::{
    DisconnectHub, HandshakeData, NamespaceClient, SendCompleter, SendHandle, Session, Transport,
    TransportKind,
};
use switchboard::store::{MemoryStoreFactory, Store, StoreFactory};
use switchboard::AppState;
use switchboard_common::SessionId;

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Counts hub notifications and remembers which sessions they were for.
#[derive(Default)]
pub struct CountingHub {
    calls: AtomicUsize,
    sessions: Mutex<Vec<SessionId>>,
}

impl CountingHub {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.sessions.lock().clone()
    }
}

impl DisconnectHub for CountingHub {
    fn on_disconnect(&self, session: &Session) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().push(session.id().clone());
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Transport stub. In manual mode every write stays pending until
/// `complete_all` is called; otherwise writes succeed immediately.
pub struct ManualTransport {
    remote: SocketAddr,
    manual: bool,
    sent: Mutex<Vec<Packet>>,
    pending: Mutex<Vec<SendCompleter>>,
    closes: AtomicUsize,
}

impl ManualTransport {
    pub fn manual(remote: &str) -> Arc<Self> {
        Self::build(remote, true)
    }

    pub fn immediate(remote: &str) -> Arc<Self> {
        Self::build(remote, false)
    }

    fn build(remote: &str, manual: bool) -> Arc<Self> {
        Arc::new(Self {
            remote: remote.parse().unwrap(),
            manual,
            sent: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn complete_all(&self, ok: bool) {
        for completer in self.pending.lock().drain(..) {
            completer.complete(if ok { Ok(()) } else { Err(TransportError::Closed) });
        }
    }
}

impl Transport for ManualTransport {
    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn send(&self, packet: Packet) -> SendHandle {
        self.sent.lock().push(packet);
        if !self.manual {
            return SendHandle::ready(Ok(()));
        }
        let (completer, handle) = SendHandle::channel();
        self.pending.lock().push(completer);
        handle
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Memory store factory that counts `create_store` calls.
#[derive(Default)]
pub struct CountingStoreFactory {
    inner: MemoryStoreFactory,
    created: AtomicUsize,
}

impl CountingStoreFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StoreFactory for CountingStoreFactory {
    fn create_store(&self, session_id: &SessionId) -> Arc<dyn Store> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_store(session_id)
    }

    async fn release(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.inner.release(session_id).await
    }
}

// ---------------------------------------------------------------------------
// Namespace listeners
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingListener {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub events: AtomicUsize,
}

impl CountingListener {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl NamespaceListener for CountingListener {
    fn on_connect(&self, _client: &NamespaceClient) -> anyhow::Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_disconnect(&self, _client: &NamespaceClient) -> anyhow::Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_event(
        &self,
        _client: &NamespaceClient,
        _event: &str,
        _data: &serde_json::Value,
        _ack_id: Option<u64>,
    ) -> anyhow::Result<()> {
        self.events.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every hook.
pub struct FailingListener;

impl NamespaceListener for FailingListener {
    fn on_disconnect(&self, _client: &NamespaceClient) -> anyhow::Result<()> {
        anyhow::bail!("teardown hook exploded")
    }
}

/// Replies to every ack-requesting event with `{"echo": <event>}`.
pub struct EchoAckListener;

impl NamespaceListener for EchoAckListener {
    fn on_event(
        &self,
        client: &NamespaceClient,
        event: &str,
        _data: &serde_json::Value,
        ack_id: Option<u64>,
    ) -> anyhow::Result<()> {
        if let Some(id) = ack_id {
            let _ = client.ack(id, serde_json::json!({ "echo": event }));
        }
        Ok(())
    }
}

/// Removes the client from the namespace when it emits `kick`.
pub struct KickListener;

impl NamespaceListener for KickListener {
    fn on_event(
        &self,
        client: &NamespaceClient,
        event: &str,
        _data: &serde_json::Value,
        _ack_id: Option<u64>,
    ) -> anyhow::Result<()> {
        if event == "kick" {
            let _ = client.disconnect();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn handshake() -> HandshakeData {
    HandshakeData::new(
        &HeaderMap::new(),
        "127.0.0.1:40000".parse().unwrap(),
        "/socket",
        Vec::new(),
    )
}

pub fn namespace(name: &str) -> Arc<Namespace> {
    Arc::new(Namespace::new(name))
}

/// A session with a memory store and no transport bound.
pub fn new_session(hub: Arc<CountingHub>) -> Arc<Session> {
    Session::new(
        SessionId::new(),
        TransportKind::Websocket,
        handshake(),
        Arc::new(AckManager::new()),
        hub,
        &MemoryStoreFactory::new(),
    )
}

/// A session with an immediately-completing transport bound.
pub fn connected_session(hub: Arc<CountingHub>) -> (Arc<Session>, Arc<ManualTransport>) {
    let session = new_session(hub);
    let transport = ManualTransport::immediate("10.0.0.1:9000");
    session.bind_transport(transport.clone());
    (session, transport)
}

pub fn test_state(config: Config) -> AppState {
    AppState::new(config, Arc::new(MemoryStoreFactory::new()))
}
