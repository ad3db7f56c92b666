use thiserror::Error;

/// Why an inbound event was dropped. A rejected event never changes room
/// state and is never broadcast.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("join a room first")]
    NotJoined,
    #[error("connection is in room {joined}, not {requested}")]
    RoomMismatch { joined: String, requested: String },
    #[error("room id is empty")]
    EmptyRoomId,
    #[error("room id longer than {0} bytes")]
    RoomIdTooLong(usize),
    #[error("stroke has no points")]
    EmptyPoints,
    #[error("stroke has more than {0} points")]
    TooManyPoints(usize),
    #[error("stroke contains a non-finite coordinate")]
    NonFinitePoint,
    #[error("stroke id is missing")]
    MissingStrokeId,
    #[error("stroke id longer than {0} bytes")]
    StrokeIdTooLong(usize),
    #[error("message is empty")]
    EmptyMessage,
    #[error("room log is full ({0} entries)")]
    LogFull(usize),
    #[error("undecodable frame: {0}")]
    Undecodable(String),
}
