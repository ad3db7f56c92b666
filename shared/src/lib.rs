use std::collections::BTreeSet;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod replay;

/// Position of an entry in a room's operation log. Issued from 1 upwards.
pub type Seq = u64;

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct Stroke {
    pub stroke_id: String,
    pub author_id: String,
    pub author_name: String,
    pub color: String,
    pub width: f32,
    pub points: Vec<Point>,
}

/// Everything that can be recorded in a room log. Cursor and chat traffic is
/// transient and never takes a sequence number.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    StrokeFull(Stroke),
    StrokeChunk {
        #[serde(flatten)]
        stroke: Stroke,
        is_final: bool,
    },
    Undo {
        target_seq: Seq,
        author_id: String,
        author_name: String,
    },
    Redo {
        target_seq: Seq,
        author_id: String,
        author_name: String,
    },
}

impl Operation {
    pub fn is_stroke(&self) -> bool {
        self.stroke().is_some()
    }

    pub fn stroke(&self) -> Option<&Stroke> {
        match self {
            Operation::StrokeFull(stroke) | Operation::StrokeChunk { stroke, .. } => Some(stroke),
            Operation::Undo { .. } | Operation::Redo { .. } => None,
        }
    }

    pub fn target_seq(&self) -> Option<Seq> {
        match self {
            Operation::Undo { target_seq, .. } | Operation::Redo { target_seq, .. } => {
                Some(*target_seq)
            }
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct LogEntry {
    #[serde(rename = "seq")]
    pub sequence: Seq,
    pub op: Operation,
}

/// Full room state handed to joining and resyncing clients. Rendering the
/// entries of `log` whose sequence is in `active`, in log order, yields the
/// visible canvas.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Default)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub sequence: Seq,
    pub log: Vec<LogEntry>,
    pub active: BTreeSet<Seq>,
    pub clients: Vec<Client>,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        room_id: String,
        #[serde(default)]
        name: Option<String>,
    },
    StrokeFull {
        room_id: String,
        #[serde(default)]
        stroke_id: Option<String>,
        #[serde(default)]
        color: Option<String>,
        width: f32,
        points: Vec<Point>,
    },
    StrokeChunk {
        room_id: String,
        stroke_id: String,
        #[serde(default)]
        color: Option<String>,
        width: f32,
        points: Vec<Point>,
        is_final: bool,
    },
    Undo {
        room_id: String,
    },
    Redo {
        room_id: String,
    },
    Cursor {
        room_id: String,
        x: f32,
        y: f32,
    },
    Chat {
        room_id: String,
        message: String,
    },
    #[serde(alias = "reconnect")]
    RequestState {
        room_id: String,
    },
    Leave {
        room_id: String,
    },
}

impl ClientMessage {
    pub fn room_id(&self) -> &str {
        match self {
            ClientMessage::Join { room_id, .. }
            | ClientMessage::StrokeFull { room_id, .. }
            | ClientMessage::StrokeChunk { room_id, .. }
            | ClientMessage::Undo { room_id }
            | ClientMessage::Redo { room_id }
            | ClientMessage::Cursor { room_id, .. }
            | ClientMessage::Chat { room_id, .. }
            | ClientMessage::RequestState { room_id }
            | ClientMessage::Leave { room_id } => room_id,
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        connection_id: String,
        room_id: String,
        client: Client,
        snapshot: RoomSnapshot,
    },
    Clients {
        room_id: String,
        clients: Vec<Client>,
    },
    Op {
        entry: LogEntry,
    },
    Cursor {
        author_id: String,
        x: f32,
        y: f32,
    },
    Chat {
        author_name: String,
        message: String,
        timestamp: i64,
    },
    State {
        snapshot: RoomSnapshot,
    },
    RoomList {
        rooms: Vec<String>,
    },
    Rejected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stroke_chunk_flattens_stroke_fields() {
        let entry = LogEntry {
            sequence: 4,
            op: Operation::StrokeChunk {
                stroke: Stroke {
                    stroke_id: "s1".into(),
                    author_id: "a".into(),
                    author_name: "Ann".into(),
                    color: "#3498db".into(),
                    width: 4.0,
                    points: vec![Point { x: 0.5, y: 0.25 }],
                },
                is_final: true,
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["seq"], 4);
        assert_eq!(value["op"]["type"], "stroke_chunk");
        assert_eq!(value["op"]["stroke_id"], "s1");
        assert_eq!(value["op"]["is_final"], true);
    }

    #[test]
    fn reconnect_is_an_alias_for_request_state() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"reconnect","room_id":"r1"}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::RequestState {
                room_id: "r1".into()
            }
        );
    }

    #[test]
    fn join_name_is_optional() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"join","room_id":"r1"}"#).unwrap();
        assert_eq!(message.room_id(), "r1");
        assert!(matches!(message, ClientMessage::Join { name: None, .. }));
    }

    #[test]
    fn undo_is_not_a_stroke() {
        let op = Operation::Undo {
            target_seq: 3,
            author_id: "a".into(),
            author_name: "Ann".into(),
        };
        assert!(!op.is_stroke());
        assert_eq!(op.target_seq(), Some(3));
    }
}
