//! WebSocket upgrade handler and per-connection read loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use tokio::time;

use crate::error::ApiError;
use crate::session::{HandshakeData, Session, TransportKind};
use crate::AppState;

use super::packet::{Packet, PacketKind};
use super::transport::WsTransport;

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = match params.iter().find(|(k, _)| k == "transport") {
        Some((_, v)) => v.parse::<TransportKind>().map_err(ApiError::bad_request)?,
        None => TransportKind::Websocket,
    };
    if kind != TransportKind::Websocket {
        return Err(ApiError::bad_request(format!(
            "transport {kind} is not served on this endpoint"
        )));
    }

    let handshake = HandshakeData::new(&headers, remote, uri.to_string(), params);
    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, kind, handshake)))
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    kind: TransportKind,
    handshake: HandshakeData,
) {
    let (sink, mut ws_rx) = socket.split();
    let remote = handshake.address();

    let session = state.sessions.create(kind, handshake);
    let (transport, mut writer) =
        WsTransport::spawn(remote, sink, state.config.send_queue_capacity);
    session.bind_transport(transport);

    tracing::info!(session_id = %session.id(), %remote, "gateway session established");

    let idle_timeout = Duration::from_secs(state.config.ping_timeout_secs);

    loop {
        let next = tokio::select! {
            msg = time::timeout(idle_timeout, ws_rx.next()) => msg,
            // Writer stopped: we closed the transport, or the socket broke.
            _ = &mut writer => break,
        };

        match next {
            Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<Packet>(&text) {
                Ok(packet) => handle_packet(&state, &session, packet),
                Err(e) => {
                    tracing::debug!(?e, session_id = %session.id(), "invalid packet");
                    let _ = session.send(Packet::error("", "Invalid packet"));
                }
            },
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => {
                tracing::debug!(?e, session_id = %session.id(), "ws read error");
                break;
            }
            Err(_elapsed) => {
                tracing::debug!(session_id = %session.id(), "idle timeout, closing connection");
                let _ = session.disconnect().await;
                break;
            }
        }
    }

    session.on_transport_closed();
    state.sessions.remove(session.id());
    if let Some(transport) = session.transport() {
        transport.close();
    }

    tracing::info!(session_id = %session.id(), "gateway session ended");
}

/// Apply one inbound packet to the session.
fn handle_packet(state: &AppState, session: &Arc<Session>, packet: Packet) {
    match packet.kind {
        PacketKind::Connect => {
            let Some(namespace) = state.namespaces.get(&packet.nsp) else {
                let _ = session.send(Packet::error(&packet.nsp, "Invalid namespace"));
                return;
            };
            let existed = session.lookup(namespace.name()).is_some();
            match session.join(&namespace) {
                Ok(client) => {
                    if !existed {
                        namespace.notify_connect(&client);
                    }
                    let _ = client.send(Packet::connect(namespace.name()));
                }
                Err(err) => {
                    tracing::debug!(%err, namespace = %packet.nsp, "join rejected");
                }
            }
        }
        PacketKind::Disconnect if packet.is_connection_disconnect() => {
            let _ = session.disconnect();
        }
        PacketKind::Disconnect => {
            if let Some(client) = session.lookup(&packet.nsp) {
                client.leave_namespace();
            }
        }
        PacketKind::Event => {
            let Some(client) = session.lookup(&packet.nsp) else {
                tracing::debug!(
                    session_id = %session.id(),
                    namespace = %packet.nsp,
                    "event for a namespace the session has not joined"
                );
                return;
            };
            let event = packet.event.as_deref().unwrap_or_default();
            client
                .namespace()
                .dispatch_event(&client, event, &packet.data, packet.id);
        }
        PacketKind::Ack => {
            let Some(id) = packet.id else {
                tracing::debug!(session_id = %session.id(), "ack without id");
                return;
            };
            session
                .ack_correlator()
                .resolve(session.id(), id, packet.data);
        }
        PacketKind::Error => {
            tracing::debug!(session_id = %session.id(), data = %packet.data, "peer reported error");
        }
    }
}
