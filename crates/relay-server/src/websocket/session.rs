//! One WebSocket connection, from upgrade to disconnect.

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use relay_core::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::connection::{ClientConnection, Outbound};
use super::hub::{DisconnectReason, HubEvent, HubHandle};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Drive a relay connection until either side closes.
///
/// 1. Registers an outbound queue of `outbound_buffer` frames with the hub
/// 2. Forwards inbound text/binary frames to the hub in arrival order
/// 3. Writes queued frames until the hub asks for a close, drops the queue,
///    or `shutdown` fires
/// 4. Reports the disconnect so the hub can release the nickname
#[instrument(skip_all, fields(conn_id = %id))]
pub async fn run_connection(
    socket: WebSocket,
    id: ConnectionId,
    hub: HubHandle,
    outbound_buffer: usize,
    shutdown: CancellationToken,
) {
    let (ws_tx, ws_rx) = socket.split();
    let (tx, rx) = mpsc::channel(outbound_buffer.max(1));

    let started = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    if hub.send(HubEvent::Connected(ClientConnection::new(id, tx))).await {
        let reason = tokio::select! {
            reason = read_loop(ws_rx, id, &hub) => reason,
            reason = write_loop(ws_tx, rx, &shutdown) => reason,
        };
        info!(reason = reason.as_str(), "client disconnected");
        let _ = hub.send(HubEvent::Disconnected { id, reason }).await;
        counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    } else {
        info!("hub stopped, dropping connection");
        counter!(WS_DISCONNECTIONS_TOTAL, "reason" => DisconnectReason::ServerClosed.as_str())
            .increment(1);
    }

    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    id: ConnectionId,
    hub: &HubHandle,
) -> DisconnectReason {
    while let Some(msg) = ws_rx.next().await {
        let event = match msg {
            Ok(Message::Text(text)) => HubEvent::Text {
                id,
                text: text.to_string(),
            },
            Ok(Message::Binary(data)) => HubEvent::Binary {
                id,
                len: data.len(),
            },
            // Pings are answered by the transport
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                debug!("client sent close frame");
                return DisconnectReason::ClientClosed;
            }
            Err(e) => {
                debug!(error = %e, "websocket read failed");
                return DisconnectReason::TransportError;
            }
        };
        if !hub.send(event).await {
            return DisconnectReason::ServerClosed;
        }
    }
    DisconnectReason::ClientClosed
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    shutdown: &CancellationToken,
) -> DisconnectReason {
    loop {
        let out = tokio::select! {
            out = rx.recv() => out,
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                None
            }
        };
        match out {
            Some(Outbound::Frame(json)) => {
                if let Err(e) = ws_tx.send(Message::Text(json.as_str().into())).await {
                    debug!(error = %e, "websocket write failed");
                    return DisconnectReason::TransportError;
                }
            }
            Some(Outbound::Close) | None => break,
        }
    }
    let _ = ws_tx.send(Message::Close(None)).await;
    DisconnectReason::ServerClosed
}
