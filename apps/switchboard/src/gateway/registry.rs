//! Registry of live sessions. Acts as their disconnect hub.

use std::sync::Arc;

use dashmap::DashMap;
use switchboard_common::SessionId;

use crate::ack::AckCorrelator;
use crate::session::{DisconnectHub, HandshakeData, Session, TransportKind};
use crate::store::StoreFactory;

/// Shared registry of all gateway sessions.
///
/// Owns the only long-lived `Arc<Session>` of each connection. Removing a
/// session releases its pending acks and its store.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    ack: Arc<dyn AckCorrelator>,
    store_factory: Arc<dyn StoreFactory>,
}

impl SessionRegistry {
    pub fn new(ack: Arc<dyn AckCorrelator>, store_factory: Arc<dyn StoreFactory>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            ack,
            store_factory,
        })
    }

    /// Create and register a session for a completed handshake. The registry
    /// itself is the session's disconnect hub.
    pub fn create(self: &Arc<Self>, kind: TransportKind, handshake: HandshakeData) -> Arc<Session> {
        let hub: Arc<dyn DisconnectHub> = self.clone();
        let session = Session::new(
            SessionId::new(),
            kind,
            handshake,
            Arc::clone(&self.ack),
            hub,
            self.store_factory.as_ref(),
        );
        self.sessions.insert(session.id().clone(), session.clone());
        session
    }

    pub fn get(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Unregister a session. Returns `None` if it was already gone.
    pub fn remove(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(session_id)?;

        let dropped = self.ack.release_session(session_id);
        if dropped > 0 {
            tracing::debug!(session_id = %session_id, dropped, "pending acks released");
        }

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let factory = Arc::clone(&self.store_factory);
            let session_id = session_id.clone();
            runtime.spawn(async move {
                if let Err(err) = factory.release(&session_id).await {
                    tracing::warn!(session_id = %session_id, ?err, "failed to release session store");
                }
            });
        }

        Some(session)
    }

    /// Ids of every registered session, in no particular order.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl DisconnectHub for SessionRegistry {
    /// Every namespace left: close the connection and forget the session.
    ///
    /// The session is swept before it is unregistered, so packets still in
    /// the read buffer cannot join it again.
    fn on_disconnect(&self, session: &Session) {
        tracing::info!(session_id = %session.id(), "session has no namespaces left");
        session.on_transport_closed();
        if let Some(transport) = session.transport() {
            transport.close();
        }
        self.remove(session.id());
    }
}
