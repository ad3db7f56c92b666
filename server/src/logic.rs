use doodly_shared::{ClientMessage, Point, ServerMessage};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Rejection;
use crate::registry::{PeerSender, RoomHandle};
use crate::room::{StrokeDraft, StrokeKind};
use crate::state::AppState;

pub const MAX_ROOM_ID_LEN: usize = 64;
pub const MAX_STROKE_ID_LEN: usize = 64;
pub const MAX_COLOR_LEN: usize = 32;

struct JoinedRoom {
    room_id: String,
    handle: RoomHandle,
}

/// Per-socket state: identity, outbound channel and the room it is in.
pub struct Connection {
    pub id: String,
    pub sender: PeerSender,
    joined: Option<JoinedRoom>,
}

impl Connection {
    pub fn new(id: impl Into<String>, sender: PeerSender) -> Self {
        Self {
            id: id.into(),
            sender,
            joined: None,
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        self.joined.as_ref().map(|joined| joined.room_id.as_str())
    }

    fn room_for(&self, room_id: &str) -> Result<RoomHandle, Rejection> {
        let joined = self.joined.as_ref().ok_or(Rejection::NotJoined)?;
        if joined.room_id != room_id {
            return Err(Rejection::RoomMismatch {
                joined: joined.room_id.clone(),
                requested: room_id.to_string(),
            });
        }
        Ok(joined.handle.clone())
    }
}

pub async fn apply_client_message(
    state: &AppState,
    conn: &mut Connection,
    message: ClientMessage,
) -> Result<(), Rejection> {
    match message {
        ClientMessage::Join { room_id, name } => {
            let room_id = sanitize_room_id(room_id)?;
            join_room(state, conn, room_id, name.as_deref()).await;
            Ok(())
        }
        ClientMessage::StrokeFull {
            room_id,
            stroke_id,
            color,
            width,
            points,
        } => {
            let handle = conn.room_for(&room_id)?;
            let stroke_id = match stroke_id.filter(|id| !id.is_empty()) {
                Some(id) => sanitize_stroke_id(id)?,
                None => Uuid::new_v4().to_string(),
            };
            let draft = StrokeDraft {
                kind: StrokeKind::Full,
                stroke_id,
                color: color.map(sanitize_color),
                width: sanitize_width(width),
                points: sanitize_points(points, state.config.max_points)?,
            };
            commit_stroke(&handle, &conn.id, draft).await
        }
        ClientMessage::StrokeChunk {
            room_id,
            stroke_id,
            color,
            width,
            points,
            is_final,
        } => {
            let handle = conn.room_for(&room_id)?;
            let draft = StrokeDraft {
                kind: StrokeKind::Chunk { is_final },
                stroke_id: sanitize_stroke_id(stroke_id)?,
                color: color.map(sanitize_color),
                width: sanitize_width(width),
                points: sanitize_points(points, state.config.max_points)?,
            };
            commit_stroke(&handle, &conn.id, draft).await
        }
        ClientMessage::Undo { room_id } => {
            let handle = conn.room_for(&room_id)?;
            let mut session = handle.write().await;
            match session.room.undo(&conn.id)? {
                Some(entry) => {
                    debug!(
                        room = %room_id,
                        seq = entry.sequence,
                        redo_depth = session.room.log().undo_depth(),
                        "undo"
                    );
                    session.broadcast_all(ServerMessage::Op { entry });
                }
                None => debug!(room = %room_id, conn = %conn.id, "nothing to undo"),
            }
            Ok(())
        }
        ClientMessage::Redo { room_id } => {
            let handle = conn.room_for(&room_id)?;
            let mut session = handle.write().await;
            match session.room.redo(&conn.id)? {
                Some(entry) => {
                    debug!(
                        room = %room_id,
                        seq = entry.sequence,
                        redo_depth = session.room.log().undo_depth(),
                        "redo"
                    );
                    session.broadcast_all(ServerMessage::Op { entry });
                }
                None => debug!(room = %room_id, conn = %conn.id, "nothing to redo"),
            }
            Ok(())
        }
        ClientMessage::Cursor { room_id, x, y } => {
            let handle = conn.room_for(&room_id)?;
            if !(Point { x, y }).is_finite() {
                return Err(Rejection::NonFinitePoint);
            }
            handle.write().await.broadcast_except(
                &conn.id,
                ServerMessage::Cursor {
                    author_id: conn.id.clone(),
                    x,
                    y,
                },
            );
            Ok(())
        }
        ClientMessage::Chat { room_id, message } => {
            let handle = conn.room_for(&room_id)?;
            let message = message.trim();
            if message.is_empty() {
                return Err(Rejection::EmptyMessage);
            }
            let message = message
                .chars()
                .take(state.config.max_chat_len)
                .collect::<String>();
            let mut session = handle.write().await;
            let author_name = session
                .room
                .client(&conn.id)
                .map(|client| client.name.clone())
                .ok_or(Rejection::NotJoined)?;
            session.broadcast_all(ServerMessage::Chat {
                author_name,
                message,
                timestamp: chrono::Utc::now().timestamp_millis(),
            });
            Ok(())
        }
        ClientMessage::RequestState { room_id } => {
            let handle = conn.room_for(&room_id)?;
            let session = handle.read().await;
            let snapshot = session.room.snapshot();
            // Sent under the lock so no later op can overtake the snapshot.
            let _ = conn.sender.send(ServerMessage::State { snapshot });
            Ok(())
        }
        ClientMessage::Leave { room_id } => {
            conn.room_for(&room_id)?;
            leave_room(state, conn).await;
            Ok(())
        }
    }
}

async fn join_room(state: &AppState, conn: &mut Connection, room_id: String, name: Option<&str>) {
    // Joining the current room again only repeats the welcome.
    if let Some(joined) = conn.joined.as_ref().filter(|joined| joined.room_id == room_id) {
        let session = joined.handle.read().await;
        if let Some(client) = session.room.client(&conn.id).cloned() {
            let _ = conn.sender.send(ServerMessage::Joined {
                connection_id: conn.id.clone(),
                room_id,
                client,
                snapshot: session.room.snapshot(),
            });
            return;
        }
    }
    if conn.joined.is_some() {
        leave_room(state, conn).await;
    }
    let (handle, mut session) = state.rooms.lock_open(&room_id).await;
    let client = session.room.join(&conn.id, name);
    session.add_peer(&conn.id, conn.sender.clone());
    let snapshot = session.room.snapshot();
    session.send_to(
        &conn.id,
        ServerMessage::Joined {
            connection_id: conn.id.clone(),
            room_id: room_id.clone(),
            client: client.clone(),
            snapshot,
        },
    );
    let clients = session.room.clients();
    session.broadcast_all(ServerMessage::Clients {
        room_id: room_id.clone(),
        clients,
    });
    info!(
        room = %room_id,
        conn = %conn.id,
        name = %client.name,
        members = session.room.member_count(),
        peers = session.peer_count(),
        "client joined"
    );
    drop(session);
    conn.joined = Some(JoinedRoom { room_id, handle });
}

/// Takes the connection out of its room, reclaiming the room if it was the
/// last member. Emptiness is decided under the room lock.
pub async fn leave_room(state: &AppState, conn: &mut Connection) {
    let Some(joined) = conn.joined.take() else {
        return;
    };
    let mut session = joined.handle.clone().write_owned().await;
    session.remove_peer(&conn.id);
    if let Some(departure) = session.room.leave(&conn.id) {
        info!(
            room = %joined.room_id,
            conn = %conn.id,
            name = %departure.client.name,
            now_empty = departure.now_empty,
            "client left"
        );
    }
    if !session.room.is_empty() {
        let clients = session.room.clients();
        session.broadcast_all(ServerMessage::Clients {
            room_id: joined.room_id.clone(),
            clients,
        });
    }
    state.rooms.release(&joined.handle, session).await;
}

async fn commit_stroke(
    handle: &RoomHandle,
    connection_id: &str,
    draft: StrokeDraft,
) -> Result<(), Rejection> {
    let mut session = handle.write().await;
    let entry = session.room.commit_stroke(connection_id, draft)?;
    session.broadcast_all(ServerMessage::Op { entry });
    Ok(())
}

fn sanitize_room_id(room_id: String) -> Result<String, Rejection> {
    let room_id = room_id.trim();
    if room_id.is_empty() {
        return Err(Rejection::EmptyRoomId);
    }
    if room_id.len() > MAX_ROOM_ID_LEN {
        return Err(Rejection::RoomIdTooLong(MAX_ROOM_ID_LEN));
    }
    Ok(room_id.to_string())
}

fn sanitize_stroke_id(id: String) -> Result<String, Rejection> {
    if id.is_empty() {
        return Err(Rejection::MissingStrokeId);
    }
    if id.len() > MAX_STROKE_ID_LEN {
        return Err(Rejection::StrokeIdTooLong(MAX_STROKE_ID_LEN));
    }
    Ok(id)
}

fn sanitize_points(points: Vec<Point>, max_points: usize) -> Result<Vec<Point>, Rejection> {
    if points.is_empty() {
        return Err(Rejection::EmptyPoints);
    }
    if points.len() > max_points {
        return Err(Rejection::TooManyPoints(max_points));
    }
    if !points.iter().all(|point| point.is_finite()) {
        return Err(Rejection::NonFinitePoint);
    }
    Ok(points)
}

/// Cuts colors down to `MAX_COLOR_LEN` bytes, backing off to a char boundary.
fn sanitize_color(mut color: String) -> String {
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    color
}

fn sanitize_width(width: f32) -> f32 {
    let width = if width.is_finite() { width } else { 6.0 };
    width.clamp(1.0, 60.0)
}
