//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::GameError;
use crate::lobby::SessionManager;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let player_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, player_id, state))
}

/// The room a connection currently sits in, with its event forwarder
struct Seat {
    game_id: String,
    forwarder: JoinHandle<()>,
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: Uuid, state: AppState) {
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(64);

    // Writer task: direct replies and room broadcasts -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let sessions = state.sessions.clone();
    let rate_limiter = PlayerRateLimiter::new();
    let mut seat: Option<Seat> = None;

    // Reader loop: WebSocket -> session manager
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_command() {
                    warn!(player_id = %player_id, "Rate limited command");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        if let Some(reply) =
                            dispatch(&sessions, player_id, client_msg, &mut seat, &out_tx).await
                        {
                            if out_tx.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        let reply = ServerMsg::Error {
                            code: "bad_request".to_string(),
                            message: e.to_string(),
                        };
                        if out_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
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
    }

    // Disconnect ends whatever session the player was in
    if let Some(seat) = seat.take() {
        if let Err(e) = sessions.leave(&seat.game_id, player_id).await {
            debug!(player_id = %player_id, error = %e, "Session already gone on disconnect");
        }
        seat.forwarder.abort();
    }

    writer_handle.abort();
    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Apply one client message. Returns a direct reply for this socket, if any.
async fn dispatch(
    sessions: &Arc<SessionManager>,
    player_id: Uuid,
    msg: ClientMsg,
    seat: &mut Option<Seat>,
    out_tx: &mpsc::Sender<ServerMsg>,
) -> Option<ServerMsg> {
    let result = match msg {
        ClientMsg::CreateGame => {
            if is_seated(seat) {
                Err(GameError::InvalidState("already in a game"))
            } else {
                let game_id = sessions.create_session(player_id);
                take_seat(sessions, &game_id, seat, out_tx)
                    .map(|()| Some(ServerMsg::GameCreated { game_id }))
            }
        }
        ClientMsg::JoinGame { game_id } => {
            if is_seated(seat) {
                Err(GameError::InvalidState("already in a game"))
            } else {
                // Subscribe first so this socket also receives gameStart
                match take_seat(sessions, &game_id, seat, out_tx) {
                    Ok(()) => match sessions.join_session(&game_id, player_id).await {
                        Ok(()) => Ok(Some(ServerMsg::GameJoined { game_id })),
                        Err(e) => {
                            if let Some(seat) = seat.take() {
                                seat.forwarder.abort();
                            }
                            Err(e)
                        }
                    },
                    Err(e) => Err(e),
                }
            }
        }
        ClientMsg::PlacePlant {
            game_id,
            kind,
            x,
            y,
        } => sessions
            .place_plant(&game_id, player_id, kind, x, y)
            .await
            .map(|()| None),
        ClientMsg::PlaceZombie { game_id, kind, y } => sessions
            .place_zombie(&game_id, player_id, kind, y)
            .await
            .map(|()| None),
        ClientMsg::LeaveGame { game_id } => {
            let result = sessions.leave(&game_id, player_id).await.map(|_| None);
            if seat.as_ref().is_some_and(|s| s.game_id == game_id) {
                // Keep forwarding until the room closes so gameEnded reaches this socket
                seat.take();
            }
            result
        }
        ClientMsg::Ping { t } => Ok(Some(ServerMsg::Pong { t })),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            warn!(player_id = %player_id, code = e.code(), error = %e, "Command rejected");
            Some(ServerMsg::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            })
        }
    }
}

/// A seat whose room has closed no longer counts
fn is_seated(seat: &Option<Seat>) -> bool {
    seat.as_ref().is_some_and(|s| !s.forwarder.is_finished())
}

/// Start forwarding a room's broadcasts to this socket
fn take_seat(
    sessions: &SessionManager,
    game_id: &str,
    seat: &mut Option<Seat>,
    out_tx: &mpsc::Sender<ServerMsg>,
) -> Result<(), GameError> {
    let mut events = sessions.subscribe(game_id)?;
    let out_tx = out_tx.clone();
    let room_id = game_id.to_string();

    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) => {
                    if out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(session_id = %room_id, lagged = n, "Client lagged, skipping updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    *seat = Some(Seat {
        game_id: game_id.to_string(),
        forwarder,
    });
    Ok(())
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
