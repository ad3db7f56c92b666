use std::sync::Arc;

use doodly_shared::{Client, LogEntry, Operation, Point, RoomSnapshot, Stroke};

use crate::clients::ClientRegistry;
use crate::config::ServerConfig;
use crate::error::Rejection;
use crate::oplog::OperationLog;
use crate::palette::ColorAllocator;

pub enum StrokeKind {
    Full,
    Chunk { is_final: bool },
}

/// A stroke as submitted by a client, already validated but not yet
/// attributed to its author.
pub struct StrokeDraft {
    pub kind: StrokeKind,
    pub stroke_id: String,
    pub color: Option<String>,
    pub width: f32,
    pub points: Vec<Point>,
}

pub struct Departure {
    pub client: Client,
    pub now_empty: bool,
}

/// One drawing session: its members and its log. Callers serialize access.
pub struct Room {
    id: String,
    clients: ClientRegistry,
    log: OperationLog,
    config: Arc<ServerConfig>,
}

impl Room {
    pub fn new(id: impl Into<String>, config: Arc<ServerConfig>) -> Self {
        Self {
            id: id.into(),
            clients: ClientRegistry::new(ColorAllocator::new(config.palette.clone())),
            log: OperationLog::new(),
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn join(&mut self, connection_id: &str, requested_name: Option<&str>) -> Client {
        self.clients.add(connection_id, requested_name)
    }

    pub fn leave(&mut self, connection_id: &str) -> Option<Departure> {
        let client = self.clients.remove(connection_id)?;
        Some(Departure {
            client,
            now_empty: self.clients.is_empty(),
        })
    }

    pub fn client(&self, connection_id: &str) -> Option<&Client> {
        self.clients.get(connection_id)
    }

    pub fn clients(&self) -> Vec<Client> {
        self.clients.list()
    }

    pub fn member_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn commit_stroke(
        &mut self,
        connection_id: &str,
        draft: StrokeDraft,
    ) -> Result<LogEntry, Rejection> {
        self.ensure_capacity()?;
        let author = self.member(connection_id)?;
        let color = draft
            .color
            .filter(|color| !color.is_empty())
            .unwrap_or_else(|| author.color.clone());
        let stroke = Stroke {
            stroke_id: draft.stroke_id,
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            color,
            width: draft.width,
            points: draft.points,
        };
        let op = match draft.kind {
            StrokeKind::Full => Operation::StrokeFull(stroke),
            StrokeKind::Chunk { is_final } => Operation::StrokeChunk { stroke, is_final },
        };
        Ok(self.log.append_stroke(op))
    }

    pub fn undo(&mut self, connection_id: &str) -> Result<Option<LogEntry>, Rejection> {
        self.ensure_capacity()?;
        let author = self.member(connection_id)?.clone();
        Ok(self.log.undo(&author.id, &author.name))
    }

    pub fn redo(&mut self, connection_id: &str) -> Result<Option<LogEntry>, Rejection> {
        self.ensure_capacity()?;
        let author = self.member(connection_id)?.clone();
        Ok(self.log.redo(&author.id, &author.name))
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            sequence: self.log.sequence(),
            log: self.log.entries().to_vec(),
            active: self.log.active().clone(),
            clients: self.clients.list(),
        }
    }

    fn member(&self, connection_id: &str) -> Result<&Client, Rejection> {
        self.clients.get(connection_id).ok_or(Rejection::NotJoined)
    }

    fn ensure_capacity(&self) -> Result<(), Rejection> {
        if self.log.len() >= self.config.max_log_entries {
            return Err(Rejection::LogFull(self.config.max_log_entries));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doodly_shared::replay::Replica;

    fn room() -> Room {
        Room::new("r1", Arc::new(ServerConfig::default()))
    }

    fn draft(points: &[(f32, f32)]) -> StrokeDraft {
        StrokeDraft {
            kind: StrokeKind::Full,
            stroke_id: "s".into(),
            color: Some("#e74c3c".into()),
            width: 4.0,
            points: points.iter().map(|&(x, y)| Point { x, y }).collect(),
        }
    }

    #[test]
    fn late_joiner_scenario() {
        let mut room = room();
        room.join("a", Some("Ann"));
        let entry = room.commit_stroke("a", draft(&[(0.0, 0.0), (1.0, 1.0)])).unwrap();
        assert_eq!(entry.sequence, 1);

        room.join("b", Some("Bob"));
        let snapshot = room.snapshot();
        assert_eq!(snapshot.log.len(), 1);
        assert_eq!(snapshot.active.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(snapshot.clients.len(), 2);

        let undo = room.undo("a").unwrap().unwrap();
        assert_eq!(undo.sequence, 2);
        assert_eq!(undo.op.target_seq(), Some(1));
        assert!(room.log().active().is_empty());

        let redo = room.redo("a").unwrap().unwrap();
        assert_eq!(redo.sequence, 3);
        assert_eq!(redo.op.target_seq(), Some(1));
        assert_eq!(room.log().active().len(), 1);
    }

    #[test]
    fn strokes_are_attributed_to_their_author() {
        let mut room = room();
        let ann = room.join("a", Some("Ann"));
        let mut stroke = draft(&[(0.5, 0.5)]);
        stroke.color = Some(String::new());
        let entry = room.commit_stroke("a", stroke).unwrap();
        let stroke = entry.op.stroke().unwrap();
        assert_eq!(stroke.author_id, "a");
        assert_eq!(stroke.author_name, "Ann");
        assert_eq!(stroke.color, ann.color);
    }

    #[test]
    fn strangers_cannot_draw_or_undo() {
        let mut room = room();
        assert_eq!(
            room.commit_stroke("x", draft(&[(0.0, 0.0)])).unwrap_err(),
            Rejection::NotJoined
        );
        assert_eq!(room.undo("x").unwrap_err(), Rejection::NotJoined);
        assert_eq!(room.log().sequence(), 0);
    }

    #[test]
    fn full_log_rejects_new_entries() {
        let config = ServerConfig {
            max_log_entries: 2,
            ..ServerConfig::default()
        };
        let mut room = Room::new("r1", Arc::new(config));
        room.join("a", None);
        room.commit_stroke("a", draft(&[(0.0, 0.0)])).unwrap();
        room.commit_stroke("a", draft(&[(0.0, 0.0)])).unwrap();
        assert_eq!(
            room.commit_stroke("a", draft(&[(0.0, 0.0)])).unwrap_err(),
            Rejection::LogFull(2)
        );
        assert_eq!(room.undo("a").unwrap_err(), Rejection::LogFull(2));
        assert_eq!(room.log().sequence(), 2);
    }

    #[test]
    fn leave_reports_when_the_room_empties() {
        let mut room = room();
        room.join("a", None);
        room.join("b", None);
        assert!(!room.leave("a").unwrap().now_empty);
        assert!(room.leave("a").is_none());
        assert!(room.leave("b").unwrap().now_empty);
        assert!(room.is_empty());
    }

    #[test]
    fn snapshot_replay_matches_live_state() {
        let mut room = room();
        room.join("a", None);
        room.join("b", None);
        for i in 0..6 {
            let who = if i % 2 == 0 { "a" } else { "b" };
            room.commit_stroke(who, draft(&[(0.1, 0.1)])).unwrap();
        }
        room.undo("a").unwrap();
        room.undo("b").unwrap();
        room.redo("a").unwrap();
        room.undo("a").unwrap();

        let snapshot = room.snapshot();
        let visible_from_snapshot = snapshot
            .log
            .iter()
            .filter(|entry| snapshot.active.contains(&entry.sequence))
            .map(|entry| entry.sequence)
            .collect::<Vec<_>>();

        let mut replica = Replica::new();
        for entry in &snapshot.log {
            replica.apply(entry.clone());
        }
        let replayed = replica
            .visible_strokes()
            .map(|entry| entry.sequence)
            .collect::<Vec<_>>();

        let live = room.log().active().iter().copied().collect::<Vec<_>>();
        assert_eq!(visible_from_snapshot, live);
        assert_eq!(replayed, live);
        assert_eq!(live, vec![1, 2, 3, 4]);
    }
}
