use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;
use switchboard_common::SessionId;

use super::{SendHandle, Session};
use crate::ack::{AckCorrelator, AckReceiver};
use crate::error::TransportError;
use crate::gateway::packet::Packet;
use crate::namespace::Namespace;

/// A session's membership in one namespace.
///
/// Only [`Session::join`] creates these. The client points back at its
/// session weakly and never keeps it alive.
pub struct NamespaceClient {
    session: Weak<Session>,
    session_id: SessionId,
    namespace: Arc<Namespace>,
    ack: Arc<dyn AckCorrelator>,
    connected: AtomicBool,
}

impl NamespaceClient {
    pub(super) fn new(
        session: Weak<Session>,
        session_id: SessionId,
        namespace: Arc<Namespace>,
        ack: Arc<dyn AckCorrelator>,
    ) -> Self {
        Self {
            session,
            session_id,
            namespace,
            ack,
            connected: AtomicBool::new(true),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// The owning session, unless it has already been released.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    pub fn ack_correlator(&self) -> &Arc<dyn AckCorrelator> {
        &self.ack
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Send a packet to this namespace on the peer.
    pub fn send(&self, mut packet: Packet) -> SendHandle {
        packet.nsp = self.namespace.name().to_string();
        match self.session() {
            Some(session) => session.send(packet),
            None => SendHandle::failed(TransportError::Closed),
        }
    }

    pub fn emit(&self, event: &str, data: Value) -> SendHandle {
        self.send(Packet::event(self.namespace.name(), event, data))
    }

    /// Emit an event the peer should acknowledge. The receiver yields the
    /// peer's reply, or an error if the session is torn down first.
    ///
    /// Nothing stays registered when the event cannot be written.
    pub fn emit_with_ack(&self, event: &str, data: Value) -> (SendHandle, AckReceiver) {
        let Some(session) = self.session() else {
            return (SendHandle::failed(TransportError::Closed), closed_receiver());
        };
        if !session.is_connected() {
            return (SendHandle::failed(TransportError::Disconnected), closed_receiver());
        }

        let (id, reply) = self.ack.register(&self.session_id);
        if !session.is_connected() {
            // Swept between the check and the registration; the registry may
            // already have released this session's acks.
            self.ack.release_session(&self.session_id);
            return (SendHandle::failed(TransportError::Disconnected), reply);
        }

        let mut packet = Packet::event(self.namespace.name(), event, data);
        packet.id = Some(id);
        let written = self.send(packet);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return (written, reply);
        };
        let (completer, handle) = SendHandle::channel();
        let ack = Arc::clone(&self.ack);
        let session_id = self.session_id.clone();
        runtime.spawn(async move {
            let result = written.await;
            if result.is_err() {
                ack.cancel(&session_id, id);
            }
            completer.complete(result);
        });
        (handle, reply)
    }

    /// Answer an ack-requesting event from the peer.
    pub fn ack(&self, id: u64, data: Value) -> SendHandle {
        self.send(Packet::ack(self.namespace.name(), id, data))
    }

    /// Leave this namespace, telling the peer first.
    pub fn disconnect(&self) -> SendHandle {
        let written = self.send(Packet::disconnect(self.namespace.name()));
        self.leave_namespace();
        written
    }

    /// Leave this namespace without telling the peer (e.g. the peer asked).
    pub fn leave_namespace(&self) {
        if self.mark_disconnected() {
            self.namespace.notify_disconnect(self);
        }
        if let Some(session) = self.session() {
            session.leave(self);
        }
    }

    /// Called by the owning session's sweep. Does not touch the session map.
    pub(super) fn on_force_disconnect(&self) {
        if self.mark_disconnected() {
            self.namespace.notify_disconnect(self);
        }
    }

    /// Flip the connected flag. Returns `true` for the caller that flipped it.
    fn mark_disconnected(&self) -> bool {
        self.connected
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A receiver whose sender is already gone.
fn closed_receiver() -> AckReceiver {
    tokio::sync::oneshot::channel().1
}

impl std::fmt::Debug for NamespaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceClient")
            .field("session_id", &self.session_id)
            .field("namespace", &self.namespace.name())
            .field("connected", &self.is_connected())
            .finish()
    }
}
