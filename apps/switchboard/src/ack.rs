//! Correlates outbound events that asked for a reply with the reply itself.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use switchboard_common::SessionId;
use tokio::sync::oneshot;

/// Receives the peer's reply to one ack-requesting event. Yields `Err` if the
/// session was released before the reply arrived.
pub type AckReceiver = oneshot::Receiver<Value>;

/// Pending request/response bookkeeping, keyed by session.
///
/// Sessions never call this directly; they hand it to every namespace client
/// so namespace code can register and resolve acknowledgments.
pub trait AckCorrelator: Send + Sync {
    /// Allocate an ack ID for `session_id` and return the receiver its reply
    /// will be delivered to.
    fn register(&self, session_id: &SessionId) -> (u64, AckReceiver);

    /// Deliver a reply. Returns `false` if nothing was waiting on `ack_id`.
    fn resolve(&self, session_id: &SessionId, ack_id: u64, data: Value) -> bool;

    /// Forget one pending ack, e.g. because its event was never written.
    /// Returns `false` if it was not pending.
    fn cancel(&self, session_id: &SessionId, ack_id: u64) -> bool;

    /// Drop every pending ack of a session. Returns how many were dropped.
    fn release_session(&self, session_id: &SessionId) -> usize;

    fn pending_count(&self, session_id: &SessionId) -> usize;
}

#[derive(Default)]
struct SessionAcks {
    next_id: u64,
    pending: HashMap<u64, oneshot::Sender<Value>>,
}

/// In-process correlator backed by `DashMap` with a `parking_lot::Mutex` per
/// session entry.
#[derive(Default)]
pub struct AckManager {
    sessions: DashMap<SessionId, Mutex<SessionAcks>>,
}

impl AckManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AckCorrelator for AckManager {
    fn register(&self, session_id: &SessionId) -> (u64, AckReceiver) {
        let entry = self.sessions.entry(session_id.clone()).or_default();
        let mut acks = entry.lock();
        acks.next_id += 1;
        let id = acks.next_id;
        let (tx, rx) = oneshot::channel();
        acks.pending.insert(id, tx);
        (id, rx)
    }

    fn resolve(&self, session_id: &SessionId, ack_id: u64, data: Value) -> bool {
        let Some(entry) = self.sessions.get(session_id) else {
            return false;
        };
        let Some(tx) = entry.lock().pending.remove(&ack_id) else {
            tracing::debug!(session_id = %session_id, ack_id, "ack for unknown id");
            return false;
        };
        // Receiver gone means the caller stopped waiting.
        tx.send(data).is_ok()
    }

    fn cancel(&self, session_id: &SessionId, ack_id: u64) -> bool {
        self.sessions
            .get(session_id)
            .map(|entry| entry.lock().pending.remove(&ack_id).is_some())
            .unwrap_or(false)
    }

    fn release_session(&self, session_id: &SessionId) -> usize {
        match self.sessions.remove(session_id) {
            Some((_, acks)) => acks.into_inner().pending.len(),
            None => 0,
        }
    }

    fn pending_count(&self, session_id: &SessionId) -> usize {
        self.sessions
            .get(session_id)
            .map(|entry| entry.lock().pending.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_per_session() {
        let acks = AckManager::new();
        let s1 = SessionId::from("s1");
        let s2 = SessionId::from("s2");

        let (a, _ra) = acks.register(&s1);
        let (b, _rb) = acks.register(&s1);
        let (c, _rc) = acks.register(&s2);

        assert_eq!((a, b, c), (1, 2, 1));
        assert_eq!(acks.pending_count(&s1), 2);
        assert_eq!(acks.pending_count(&s2), 1);
    }

    #[tokio::test]
    async fn resolve_delivers_reply_once() {
        let acks = AckManager::new();
        let sid = SessionId::from("s1");
        let (id, rx) = acks.register(&sid);

        assert!(acks.resolve(&sid, id, serde_json::json!({"ok": true})));
        assert_eq!(rx.await.unwrap(), serde_json::json!({"ok": true}));

        // Second reply for the same id has nothing to deliver to.
        assert!(!acks.resolve(&sid, id, Value::Null));
        assert_eq!(acks.pending_count(&sid), 0);
    }

    #[test]
    fn resolve_ignores_other_sessions() {
        let acks = AckManager::new();
        let (id, _rx) = acks.register(&SessionId::from("s1"));
        assert!(!acks.resolve(&SessionId::from("s2"), id, Value::Null));
    }

    #[tokio::test]
    async fn cancel_drops_only_that_ack() {
        let acks = AckManager::new();
        let sid = SessionId::from("s1");
        let (first, rx1) = acks.register(&sid);
        let (second, _rx2) = acks.register(&sid);

        assert!(acks.cancel(&sid, first));
        assert!(!acks.cancel(&sid, first));
        assert!(rx1.await.is_err());
        assert_eq!(acks.pending_count(&sid), 1);
        assert!(acks.resolve(&sid, second, Value::Null));
    }

    #[tokio::test]
    async fn release_session_closes_waiters() {
        let acks = AckManager::new();
        let sid = SessionId::from("s1");
        let (_, rx1) = acks.register(&sid);
        let (_, rx2) = acks.register(&sid);

        assert_eq!(acks.release_session(&sid), 2);
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
        assert_eq!(acks.release_session(&sid), 0);
    }
}
