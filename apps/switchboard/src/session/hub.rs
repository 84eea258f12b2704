use super::Session;

/// Receives the "last namespace left" signal for a session.
///
/// Invoked at most once per session, and only when an explicit leave empties
/// the session's namespace map. The transport-closed sweep never calls it.
/// The session's membership lock is held during the call; implementations may
/// read the session but should not block.
pub trait DisconnectHub: Send + Sync {
    fn on_disconnect(&self, session: &Session);
}
