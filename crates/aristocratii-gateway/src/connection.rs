use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use aristocratii_types::events::{ClientCommand, ServerEvent};

use crate::chat::ChatGateway;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve one socket until the client goes away, then drop it from every room.
///
/// Commands from a connection are handled strictly one after another; events
/// addressed to it are forwarded by a separate task.
pub async fn handle_connection(socket: WebSocket, gateway: ChatGateway) {
    let (mut sender, mut receiver) = socket.split();

    let dispatcher = gateway.dispatcher().clone();
    let (conn_id, mut events_rx) = dispatcher.register_connection().await;
    info!(
        "Connection {} opened ({} live)",
        conn_id,
        dispatcher.connection_count().await
    );

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward events addressed to this connection -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else { break };

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize event for {}: {}", conn_id, e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout on {} (missed {} pongs), dropping connection", conn_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_gateway = gateway.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => recv_gateway.handle_command(conn_id, cmd).await,
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            conn_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        recv_gateway
                            .dispatcher()
                            .send_to_connection(
                                conn_id,
                                ServerEvent::Error {
                                    command: None,
                                    reason: format!("malformed command: {}", e),
                                },
                            )
                            .await;
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish, then for the other to actually stop so
    // no command is still running when the connection is removed
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    let left = dispatcher.disconnect(conn_id).await;
    info!("Connection {} closed, left {} rooms", conn_id, left.len());
}
