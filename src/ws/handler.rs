//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameAction, GameError, RoomHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, DirectMsg, ServerMsg};

/// Room this connection is attached to
struct Binding {
    room: RoomHandle,
    player_id: Uuid,
    forwarder: JoinHandle<()>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Room broadcasts and direct replies share one outbound queue
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(256);
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let welcome = ServerMsg::Direct(DirectMsg::Welcome {
        server_time: unix_millis(),
    });
    if out_tx.send(welcome).await.is_err() {
        error!(conn_id = %conn_id, "Failed to send welcome");
        return;
    }

    let rate_limiter = ConnectionRateLimiter::new(state.config.ws_rate_limit);
    let mut binding: Option<Binding> = None;

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(conn_id = %conn_id, "Rate limited message");
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_message(&state, msg, &mut binding, &out_tx, conn_id).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        Some(error_msg("Invalid message"))
                    }
                };

                if let Some(reply) = reply {
                    if out_tx.send(reply).await.is_err() {
                        debug!(conn_id = %conn_id, "Outbound channel closed");
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Gameplay carries on without us; the room only learns we left
    if let Some(binding) = binding.take() {
        binding.forwarder.abort();
        binding.room.disconnected(binding.player_id).await;
    }

    writer_handle.abort();
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Route one parsed message. Returns the direct reply, if any.
async fn handle_message(
    state: &AppState,
    msg: ClientMsg,
    binding: &mut Option<Binding>,
    out_tx: &mpsc::Sender<ServerMsg>,
    conn_id: Uuid,
) -> Option<ServerMsg> {
    match msg {
        ClientMsg::Ping { t } => Some(ServerMsg::Direct(DirectMsg::Pong {
            t,
            server_time: unix_millis(),
        })),

        ClientMsg::CreateRoom {
            host_name,
            max_players,
            start_money,
        } => {
            if binding.is_some() {
                return Some(game_error(GameError::AlreadyInRoom));
            }
            match state.rooms.create_room(&host_name, max_players, start_money) {
                Ok((room, player_id, snapshot)) => {
                    let rx = room.subscribe();
                    *binding = Some(bind(room, player_id, rx, out_tx.clone(), conn_id));
                    Some(ServerMsg::Direct(DirectMsg::RoomCreated {
                        room: snapshot,
                        player_id,
                    }))
                }
                Err(e) => Some(game_error(e)),
            }
        }

        ClientMsg::JoinRoom {
            room_code,
            player_name,
        } => {
            if binding.is_some() {
                return Some(game_error(GameError::AlreadyInRoom));
            }
            let Some(room) = state.rooms.find_by_code(&room_code) else {
                return Some(game_error(GameError::RoomNotFound));
            };
            // Subscribe first so nothing after the join is missed
            let rx = room.subscribe();
            match room.join(player_name).await {
                Ok((player_id, snapshot)) => {
                    *binding = Some(bind(room, player_id, rx, out_tx.clone(), conn_id));
                    Some(ServerMsg::Direct(DirectMsg::RoomJoined {
                        room: snapshot,
                        player_id,
                    }))
                }
                Err(e) => Some(game_error(e)),
            }
        }

        ClientMsg::RejoinRoom {
            room_code,
            player_id,
        } => {
            if binding.is_some() {
                return Some(game_error(GameError::AlreadyInRoom));
            }
            let Some(room) = state.rooms.find_by_code(&room_code) else {
                return Some(game_error(GameError::RoomNotFound));
            };
            let rx = room.subscribe();
            match room.rejoin(player_id).await {
                Ok(snapshot) => {
                    *binding = Some(bind(room, player_id, rx, out_tx.clone(), conn_id));
                    Some(ServerMsg::Direct(DirectMsg::RoomJoined {
                        room: snapshot,
                        player_id,
                    }))
                }
                Err(e) => Some(game_error(e)),
            }
        }

        other => {
            let action = match GameAction::try_from(other) {
                Ok(action) => action,
                Err(_) => return None,
            };
            let Some(bound) = binding.as_ref() else {
                return Some(game_error(GameError::NotInRoom));
            };
            match bound.room.act(bound.player_id, action).await {
                Ok(()) => None,
                Err(e) => Some(game_error(e)),
            }
        }
    }
}

/// Attach the connection to a room and start forwarding its broadcasts
fn bind(
    room: RoomHandle,
    player_id: Uuid,
    mut rx: broadcast::Receiver<ServerMsg>,
    out_tx: mpsc::Sender<ServerMsg>,
    conn_id: Uuid,
) -> Binding {
    info!(
        conn_id = %conn_id,
        room_id = %room.id,
        player_id = %player_id,
        "Connection bound to room"
    );
    let forwarder = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        conn_id = %conn_id,
                        lagged_count = n,
                        "Client lagged, skipping {} room events", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Room channel closed");
                    break;
                }
            }
        }
    });

    Binding {
        room,
        player_id,
        forwarder,
    }
}

fn error_msg(message: &str) -> ServerMsg {
    ServerMsg::Direct(DirectMsg::Error {
        message: message.to_string(),
    })
}

fn game_error(e: GameError) -> ServerMsg {
    error_msg(&e.to_string())
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
