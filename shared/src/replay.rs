use std::collections::BTreeSet;

use crate::{LogEntry, Operation, RoomSnapshot, Seq};

/// Result of feeding one broadcast entry into a [`Replica`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// Already seen; sequence numbers are never reused so this is a duplicate.
    Stale,
    /// Entries between `expected` and `found` were missed. The replica is left
    /// untouched and must be rebuilt from a fresh snapshot.
    Gap { expected: Seq, found: Seq },
}

/// Consumer-side copy of a room log that tracks which strokes are visible.
#[derive(Clone, Debug, Default)]
pub struct Replica {
    last_sequence: Seq,
    log: Vec<LogEntry>,
    active: BTreeSet<Seq>,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &RoomSnapshot) -> Self {
        Self {
            last_sequence: snapshot.sequence,
            log: snapshot.log.clone(),
            active: snapshot.active.clone(),
        }
    }

    pub fn last_sequence(&self) -> Seq {
        self.last_sequence
    }

    pub fn active(&self) -> &BTreeSet<Seq> {
        &self.active
    }

    pub fn apply(&mut self, entry: LogEntry) -> Applied {
        let expected = self.last_sequence + 1;
        if entry.sequence < expected {
            return Applied::Stale;
        }
        if entry.sequence > expected {
            return Applied::Gap {
                expected,
                found: entry.sequence,
            };
        }
        match &entry.op {
            Operation::StrokeFull(_) | Operation::StrokeChunk { .. } => {
                self.active.insert(entry.sequence);
            }
            Operation::Undo { target_seq, .. } => {
                self.active.remove(target_seq);
            }
            Operation::Redo { target_seq, .. } => {
                self.active.insert(*target_seq);
            }
        }
        self.last_sequence = entry.sequence;
        self.log.push(entry);
        Applied::Applied
    }

    pub fn visible_strokes(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.log
            .iter()
            .filter(|entry| entry.op.is_stroke() && self.active.contains(&entry.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Point, Stroke};

    fn stroke(sequence: Seq) -> LogEntry {
        LogEntry {
            sequence,
            op: Operation::StrokeFull(Stroke {
                stroke_id: format!("s{sequence}"),
                author_id: "a".into(),
                author_name: "Ann".into(),
                color: "#1abc9c".into(),
                width: 4.0,
                points: vec![Point { x: 0.0, y: 0.0 }],
            }),
        }
    }

    fn undo(sequence: Seq, target_seq: Seq) -> LogEntry {
        LogEntry {
            sequence,
            op: Operation::Undo {
                target_seq,
                author_id: "a".into(),
                author_name: "Ann".into(),
            },
        }
    }

    fn redo(sequence: Seq, target_seq: Seq) -> LogEntry {
        LogEntry {
            sequence,
            op: Operation::Redo {
                target_seq,
                author_id: "b".into(),
                author_name: "Bob".into(),
            },
        }
    }

    #[test]
    fn undo_and_redo_toggle_visibility() {
        let mut replica = Replica::new();
        assert_eq!(replica.apply(stroke(1)), Applied::Applied);
        assert_eq!(replica.apply(stroke(2)), Applied::Applied);
        assert_eq!(replica.apply(undo(3, 2)), Applied::Applied);
        let visible: Vec<Seq> = replica.visible_strokes().map(|e| e.sequence).collect();
        assert_eq!(visible, vec![1]);

        assert_eq!(replica.apply(redo(4, 2)), Applied::Applied);
        let visible: Vec<Seq> = replica.visible_strokes().map(|e| e.sequence).collect();
        assert_eq!(visible, vec![1, 2]);
        assert_eq!(replica.last_sequence(), 4);
    }

    #[test]
    fn gaps_are_reported_without_mutation() {
        let mut replica = Replica::new();
        replica.apply(stroke(1));
        assert_eq!(
            replica.apply(stroke(3)),
            Applied::Gap {
                expected: 2,
                found: 3
            }
        );
        assert_eq!(replica.last_sequence(), 1);
        assert_eq!(replica.active().len(), 1);
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut replica = Replica::new();
        replica.apply(stroke(1));
        assert_eq!(replica.apply(stroke(1)), Applied::Stale);
        assert_eq!(replica.visible_strokes().count(), 1);
    }

    #[test]
    fn snapshot_resumes_the_stream() {
        let snapshot = RoomSnapshot {
            room_id: "r1".into(),
            sequence: 2,
            log: vec![stroke(1), undo(2, 1)],
            active: BTreeSet::new(),
            clients: Vec::new(),
        };
        let mut replica = Replica::from_snapshot(&snapshot);
        assert_eq!(replica.visible_strokes().count(), 0);
        assert_eq!(replica.apply(redo(3, 1)), Applied::Applied);
        assert_eq!(replica.visible_strokes().count(), 1);
    }
}
