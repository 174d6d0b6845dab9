//! WebSocket upgrade handler: per-room relay of peer states

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::AppError;
use crate::matchmaking::RoomError;
use crate::util::rate_limit::PeerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{decode_client_msg, ClientMsg, PeerState, RoomState, RoomStatus, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room_id: Uuid,
    pub player_id: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Only entrants of an open room may attach
    let room = match state.rooms.room(query.room_id) {
        Some(room) => room,
        None => return AppError::from(RoomError::NotFound(query.room_id)).into_response(),
    };
    if !room.has_player(&query.player_id) {
        warn!(room_id = %query.room_id, player_id = %query.player_id, "Socket for player not in room");
        return AppError::BadRequest("player is not in this room".to_string()).into_response();
    }

    info!(room_id = %query.room_id, player_id = %query.player_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, query.room_id, query.player_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, room_id: Uuid, player_id: String, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id: player_id.clone(),
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    let (Some(room_rx), Some((peer_tx, peer_rx))) = (
        state.rooms.subscribe(room_id),
        state.rooms.peer_channel(room_id),
    ) else {
        debug!(room_id = %room_id, "Room closed before the socket attached");
        return;
    };

    run_session(&player_id, ws_sink, ws_stream, room_rx, peer_tx, peer_rx).await;

    state.rooms.leave(room_id, &player_id);
    info!(room_id = %room_id, player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: &str,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut room_rx: watch::Receiver<RoomState>,
    peer_tx: broadcast::Sender<PeerState>,
    mut peer_rx: broadcast::Receiver<PeerState>,
) {
    let rate_limiter = PeerRateLimiter::new();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMsg>();

    // Spawn writer task: room changes, peer states and replies -> WebSocket
    let writer_player_id = player_id.to_string();
    let writer_handle = tokio::spawn(async move {
        let initial = ServerMsg::RoomUpdate {
            room: room_rx.borrow_and_update().clone(),
        };
        if send_msg(&mut ws_sink, &initial).await.is_err() {
            return;
        }

        loop {
            let msg = tokio::select! {
                changed = room_rx.changed() => {
                    if changed.is_err() {
                        debug!(player_id = %writer_player_id, "Room channel closed");
                        break;
                    }
                    let room = room_rx.borrow_and_update().clone();
                    let closed = room.status == RoomStatus::Closed;
                    let msg = ServerMsg::RoomUpdate { room };
                    if closed {
                        let _ = send_msg(&mut ws_sink, &msg).await;
                        break;
                    }
                    msg
                }
                peer = peer_rx.recv() => match peer {
                    Ok(state) if state.player_id == writer_player_id => continue,
                    Ok(state) => ServerMsg::Peer { state },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(player_id = %writer_player_id, lagged_count = n, "Peer relay lagged");
                        // Newer states follow; nothing to resend
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %writer_player_id, "Peer channel closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> room relay
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_frame() {
                    debug!(player_id = %player_id, "Rate limited frame");
                    continue;
                }

                match decode_client_msg(&text) {
                    Some(ClientMsg::PeerState(mut peer_state)) => {
                        // Sockets may only speak for their own player
                        peer_state.player_id = player_id.to_string();
                        if peer_tx.send(peer_state).is_err() {
                            debug!(player_id = %player_id, "No peers listening");
                        }
                    }
                    Some(ClientMsg::Ping { t }) => {
                        let _ = reply_tx.send(ServerMsg::Pong { t });
                    }
                    None => {
                        debug!(player_id = %player_id, "Dropping malformed frame");
                        let _ = reply_tx.send(ServerMsg::Error {
                            code: "malformed_frame".to_string(),
                            message: "frame was not a valid peer state or ping".to_string(),
                        });
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }

        if writer_handle.is_finished() {
            break;
        }
    }

    // Make sure the writer's receivers are gone before the room is checked
    writer_handle.abort();
    let _ = writer_handle.await;
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
