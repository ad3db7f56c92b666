use std::path::PathBuf;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use doodly_shared::codec::{self, Frame, WireFormat};
use doodly_shared::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Rejection;
use crate::logic::{apply_client_message, leave_room, Connection};
use crate::registry::PeerSender;
use crate::state::AppState;

pub fn app_router(state: AppState, public_dir: PathBuf) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/rooms", get(rooms_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn rooms_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.rooms.list().await)
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (format_tx, format_rx) = watch::channel(WireFormat::Json);
    let mut conn = Connection::new(Uuid::new_v4().to_string(), tx.clone());
    info!(conn = %conn.id, "ws connected");

    let updates = state.rooms.subscribe();
    let _ = tx.send(ServerMessage::RoomList {
        rooms: state.rooms.list().await,
    });
    let list_task = tokio::spawn(forward_room_list(updates, tx));

    let conn_id = conn.id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let format = *format_rx.borrow();
            let frame = match codec::encode(&message, format) {
                Ok(Frame::Text(text)) => Message::Text(text),
                Ok(Frame::Binary(payload)) => Message::Binary(payload),
                Err(error) => {
                    warn!(conn = %conn_id, %error, "failed to encode outbound message");
                    continue;
                }
            };
            if socket_sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut close_frame = None;

    while let Some(Ok(message)) = socket_receiver.next().await {
        let decoded = match message {
            Message::Text(text) => {
                format_tx.send_replace(WireFormat::Json);
                codec::decode_text::<ClientMessage>(&text)
            }
            Message::Binary(data) => {
                format_tx.send_replace(WireFormat::Binary);
                codec::decode_binary::<ClientMessage>(&data)
            }
            Message::Close(frame) => {
                close_frame = frame;
                break;
            }
            _ => continue,
        };
        let result = match decoded {
            Ok(client_message) => apply_client_message(&state, &mut conn, client_message).await,
            Err(error) => Err(Rejection::Undecodable(error.to_string())),
        };
        if let Err(rejection) = result {
            debug!(conn = %conn.id, %rejection, "rejected client message");
            let _ = conn.sender.send(ServerMessage::Rejected {
                reason: rejection.to_string(),
            });
        }
    }

    let room_id = conn.room_id().map(str::to_string);
    leave_room(&state, &mut conn).await;
    info!(conn = %conn.id, room = ?room_id, "ws disconnected");
    if let Some(frame) = &close_frame {
        debug!(
            conn = %conn.id,
            code = frame.code,
            reason = %frame.reason,
            "ws close frame"
        );
    }
    list_task.abort();
    send_task.abort();
}

async fn forward_room_list(mut updates: broadcast::Receiver<Vec<String>>, tx: PeerSender) {
    loop {
        match updates.recv().await {
            Ok(rooms) => {
                if tx.send(ServerMessage::RoomList { rooms }).is_err() {
                    break;
                }
            }
            // Every update carries the full list, so skipped ones are harmless.
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
