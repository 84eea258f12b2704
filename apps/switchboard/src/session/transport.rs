//! The physical connection as seen by a session.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::gateway::packet::Packet;

/// A byte-level connection a session writes through.
///
/// Implementations may be swapped on a live session (e.g. polling upgraded to
/// a streaming socket); the session only ever holds the current one.
pub trait Transport: Send + Sync {
    /// Address of the remote peer.
    fn remote_addr(&self) -> SocketAddr;

    /// Queue a packet for writing. The returned handle resolves once the
    /// write has completed or failed.
    fn send(&self, packet: Packet) -> SendHandle;

    /// Close the underlying connection. Must be idempotent.
    fn close(&self);
}

/// Completion of a single outbound write.
///
/// Resolves to `Ok(())` once the transport flushed the packet. Dropping the
/// handle does not cancel the write.
#[must_use = "a SendHandle does nothing unless awaited"]
#[derive(Debug)]
pub struct SendHandle {
    state: SendState,
}

#[derive(Debug)]
enum SendState {
    Ready(Option<Result<(), TransportError>>),
    Pending(oneshot::Receiver<Result<(), TransportError>>),
}

impl SendHandle {
    /// A handle that is already resolved.
    pub fn ready(result: Result<(), TransportError>) -> Self {
        Self {
            state: SendState::Ready(Some(result)),
        }
    }

    /// A handle that resolves with `err` without touching any transport.
    pub fn failed(err: TransportError) -> Self {
        Self::ready(Err(err))
    }

    /// A pending handle plus the completer the writer resolves it with.
    pub fn channel() -> (SendCompleter, Self) {
        let (tx, rx) = oneshot::channel();
        (
            SendCompleter { tx },
            Self {
                state: SendState::Pending(rx),
            },
        )
    }
}

impl Future for SendHandle {
    type Output = Result<(), TransportError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            SendState::Ready(result) => Poll::Ready(result.take().unwrap_or(Err(TransportError::Closed))),
            // A completer dropped without resolving means the writer went away.
            SendState::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|r| r.unwrap_or(Err(TransportError::Closed))),
        }
    }
}

/// Write side of a pending `SendHandle`.
#[derive(Debug)]
pub struct SendCompleter {
    tx: oneshot::Sender<Result<(), TransportError>>,
}

impl SendCompleter {
    pub fn complete(self, result: Result<(), TransportError>) {
        // The caller may have dropped its handle; nothing to report then.
        let _ = self.tx.send(result);
    }
}
