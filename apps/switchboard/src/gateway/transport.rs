//! WebSocket implementation of the session transport.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::packet::Packet;
use crate::error::TransportError;
use crate::session::{SendCompleter, SendHandle, Transport};

type Outbound = (Packet, SendCompleter);

/// Writes packets to one WebSocket through a bounded queue drained by a
/// dedicated writer task.
pub struct WsTransport {
    remote: SocketAddr,
    tx: mpsc::Sender<Outbound>,
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl WsTransport {
    /// Start the writer task for `sink`. The task ends when the transport is
    /// closed or dropped, or when a write fails.
    pub fn spawn(
        remote: SocketAddr,
        sink: SplitSink<WebSocket, Message>,
        capacity: usize,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (close_tx, close_rx) = oneshot::channel();
        let writer = tokio::spawn(run_writer(remote, sink, rx, close_rx));
        let transport = Arc::new(Self {
            remote,
            tx,
            close_tx: Mutex::new(Some(close_tx)),
        });
        (transport, writer)
    }
}

impl Transport for WsTransport {
    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn send(&self, packet: Packet) -> SendHandle {
        let (completer, handle) = SendHandle::channel();
        match self.tx.try_send((packet, completer)) {
            Ok(()) => handle,
            Err(mpsc::error::TrySendError::Full((_, completer))) => {
                tracing::warn!(remote = %self.remote, "send queue full, dropping packet");
                completer.complete(Err(TransportError::Backpressure));
                handle
            }
            Err(mpsc::error::TrySendError::Closed((_, completer))) => {
                completer.complete(Err(TransportError::Closed));
                handle
            }
        }
    }

    fn close(&self) {
        if let Some(close_tx) = self.close_tx.lock().take() {
            let _ = close_tx.send(());
        }
    }
}

async fn run_writer(
    remote: SocketAddr,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    mut close_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            next = rx.recv() => {
                let Some((packet, completer)) = next else {
                    break;
                };
                if write_packet(remote, &mut sink, packet, completer).await.is_err() {
                    return;
                }
            }

            // Fires on close() and also when the transport is dropped.
            _ = &mut close_rx => {
                // Refuse new sends, then flush everything queued before the close.
                rx.close();
                while let Ok((packet, completer)) = rx.try_recv() {
                    if write_packet(remote, &mut sink, packet, completer).await.is_err() {
                        return;
                    }
                }
                break;
            }
        }
    }

    let close_msg = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: "".into(),
    }));
    let _ = sink.send(close_msg).await;
    let _ = sink.close().await;
    tracing::debug!(%remote, "ws writer closed");
}

/// Write one packet and resolve its handle. `Err` means the socket is gone.
async fn write_packet(
    remote: SocketAddr,
    sink: &mut SplitSink<WebSocket, Message>,
    packet: Packet,
    completer: SendCompleter,
) -> Result<(), ()> {
    let json = match serde_json::to_string(&packet) {
        Ok(json) => json,
        Err(e) => {
            completer.complete(Err(e.into()));
            return Ok(());
        }
    };
    if sink.send(Message::Text(json.into())).await.is_err() {
        tracing::debug!(%remote, "ws write failed");
        completer.complete(Err(TransportError::Closed));
        return Err(());
    }
    completer.complete(Ok(()));
    Ok(())
}
