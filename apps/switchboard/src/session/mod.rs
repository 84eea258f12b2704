//! One physical connection multiplexed into per-namespace clients.
//!
//! A [`Session`] owns the map from namespace name to [`NamespaceClient`].
//! Clients leave one at a time through [`Session::leave`]; the leave that
//! empties the map tells the [`DisconnectHub`], once. When the transport goes
//! away instead, [`Session::on_transport_closed`] drops every client in one
//! sweep and the hub is never told.

mod client;
mod handshake;
mod hub;
mod transport;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{ReentrantMutex, RwLock};
use switchboard_common::SessionId;

use crate::ack::AckCorrelator;
use crate::error::{SessionError, TransportError};
use crate::gateway::packet::Packet;
use crate::namespace::Namespace;
use crate::store::{Store, StoreFactory};

pub use client::NamespaceClient;
pub use handshake::{HandshakeData, TransportKind};
pub use hub::DisconnectHub;
pub use transport::{SendCompleter, SendHandle, Transport};

pub struct Session {
    id: SessionId,
    transport_kind: TransportKind,
    handshake: HandshakeData,
    /// Namespace name -> client. Reads go straight to the map; inserts and
    /// removals also take `membership`.
    clients: DashMap<String, Arc<NamespaceClient>>,
    /// Serializes join-insert, leave-remove-check-notify, and the sweep drain.
    /// Reentrant so a hub callback may call back into the session.
    membership: ReentrantMutex<()>,
    connected: AtomicBool,
    hub_notified: AtomicBool,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    store: Arc<dyn Store>,
    ack: Arc<dyn AckCorrelator>,
    hub: Arc<dyn DisconnectHub>,
    this: Weak<Session>,
}

impl Session {
    /// Create a session for a connection whose handshake just completed.
    ///
    /// The session's store is created here, exactly once. No transport is
    /// bound yet; call [`Session::bind_transport`] before sending.
    pub fn new(
        id: SessionId,
        transport_kind: TransportKind,
        handshake: HandshakeData,
        ack: Arc<dyn AckCorrelator>,
        hub: Arc<dyn DisconnectHub>,
        store_factory: &dyn StoreFactory,
    ) -> Arc<Self> {
        let store = store_factory.create_store(&id);
        Arc::new_cyclic(|this| Self {
            id,
            transport_kind,
            handshake,
            clients: DashMap::new(),
            membership: ReentrantMutex::new(()),
            connected: AtomicBool::new(true),
            hub_notified: AtomicBool::new(false),
            transport: RwLock::new(None),
            store,
            ack,
            hub,
            this: this.clone(),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    pub fn handshake_data(&self) -> &HandshakeData {
        &self.handshake
    }

    pub fn ack_correlator(&self) -> &Arc<dyn AckCorrelator> {
        &self.ack
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Namespace membership
    // -----------------------------------------------------------------------

    /// Get the client for `namespace`, creating it on first join.
    ///
    /// Concurrent joins of one namespace all receive the same client. Fails
    /// once the session has been swept.
    pub fn join(&self, namespace: &Arc<Namespace>) -> Result<Arc<NamespaceClient>, SessionError> {
        if let Some(existing) = self.lookup(namespace.name()) {
            return Ok(existing);
        }

        let _guard = self.membership.lock();
        if !self.is_connected() {
            return Err(SessionError::Disconnected(self.id.clone()));
        }

        let client = self
            .clients
            .entry(namespace.name().to_string())
            .or_insert_with(|| {
                tracing::debug!(
                    session_id = %self.id,
                    namespace = %namespace.name(),
                    "namespace joined"
                );
                Arc::new(NamespaceClient::new(
                    self.this.clone(),
                    self.id.clone(),
                    Arc::clone(namespace),
                    Arc::clone(&self.ack),
                ))
            })
            .clone();
        Ok(client)
    }

    /// Remove `client` from the map.
    ///
    /// Only removes the entry if it still holds this exact client, so a stale
    /// handle cannot evict a newer join of the same namespace. Removing an
    /// absent client is a no-op. If this removal empties the map the hub is
    /// notified, at most once over the session's lifetime.
    pub fn leave(&self, client: &NamespaceClient) {
        let _guard = self.membership.lock();

        let removed = self
            .clients
            .remove_if(client.namespace().name(), |_, current| {
                std::ptr::eq(Arc::as_ptr(current), client)
            });
        if removed.is_none() {
            return;
        }

        tracing::debug!(
            session_id = %self.id,
            namespace = %client.namespace().name(),
            "namespace left"
        );

        if self.clients.is_empty()
            && self
                .hub_notified
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            tracing::info!(session_id = %self.id, "last namespace left");
            self.hub.on_disconnect(self);
        }
    }

    pub fn lookup(&self, namespace: &str) -> Option<Arc<NamespaceClient>> {
        self.clients.get(namespace).map(|entry| entry.value().clone())
    }

    /// Snapshot of the current clients. Joins and leaves racing with the call
    /// may or may not be reflected.
    pub fn all_sub_clients(&self) -> Vec<Arc<NamespaceClient>> {
        self.clients.iter().map(|entry| entry.value().clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Write a packet through the current transport.
    ///
    /// Never fails synchronously: after disconnection, or before a transport
    /// is bound, the returned handle resolves to an error.
    pub fn send(&self, packet: Packet) -> SendHandle {
        if !self.is_connected() {
            return SendHandle::failed(TransportError::Disconnected);
        }
        match self.transport() {
            Some(transport) => transport.send(packet),
            None => SendHandle::failed(TransportError::NotBound),
        }
    }

    /// Tell the peer the connection is closing, then close it.
    ///
    /// The local sweep runs before this returns, so the session reads as
    /// disconnected immediately. The transport is closed once the disconnect
    /// packet has been written; the returned handle resolves after that close
    /// with the outcome of the write.
    pub fn disconnect(&self) -> SendHandle {
        let written = self.send(Packet::disconnect_all());
        let transport = self.transport();

        self.on_transport_closed();

        let Some(transport) = transport else {
            return SendHandle::failed(TransportError::NotBound);
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let (completer, handle) = SendHandle::channel();
                runtime.spawn(async move {
                    let result = written.await;
                    transport.close();
                    completer.complete(result);
                });
                handle
            }
            Err(_) => {
                // No runtime to wait on the write; close right away.
                transport.close();
                SendHandle::ready(Ok(()))
            }
        }
    }

    /// Mark the session disconnected and force every namespace client out.
    ///
    /// Only the first caller does anything. The map is drained without going
    /// through [`Session::leave`], so the hub is not notified. A failing
    /// client notification does not stop the others.
    pub fn on_transport_closed(&self) {
        if self
            .connected
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let drained: Vec<Arc<NamespaceClient>> = {
            let _guard = self.membership.lock();
            let names: Vec<String> = self.clients.iter().map(|entry| entry.key().clone()).collect();
            names
                .into_iter()
                .filter_map(|name| self.clients.remove(&name).map(|(_, client)| client))
                .collect()
        };

        tracing::info!(
            session_id = %self.id,
            namespaces = drained.len(),
            "session disconnected"
        );

        for client in &drained {
            client.on_force_disconnect();
        }
    }

    // -----------------------------------------------------------------------
    // Transport binding
    // -----------------------------------------------------------------------

    /// Bind (or rebind, e.g. on upgrade) the physical transport. Returns the
    /// previously bound transport, if any.
    pub fn bind_transport(&self, transport: Arc<dyn Transport>) -> Option<Arc<dyn Transport>> {
        tracing::debug!(
            session_id = %self.id,
            remote = %transport.remote_addr(),
            "transport bound"
        );
        self.transport.write().replace(transport)
    }

    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.read().clone()
    }

    pub fn remote_address(&self) -> Result<SocketAddr, SessionError> {
        self.transport
            .read()
            .as_ref()
            .map(|t| t.remote_addr())
            .ok_or_else(|| SessionError::NoTransport(self.id.clone()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transport_kind", &self.transport_kind)
            .field("connected", &self.is_connected())
            .field("namespaces", &self.clients.len())
            .finish()
    }
}
