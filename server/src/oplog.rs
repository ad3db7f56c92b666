use std::collections::BTreeSet;

use doodly_shared::{LogEntry, Operation, Seq};

/// Append-only room history plus the visibility state derived from it.
///
/// Every issued sequence number lands in `entries`, so the entry for `seq`
/// always lives at index `seq - 1`. `active` only ever holds sequences of
/// stroke entries and `undo_stack` only holds sequences missing from
/// `active`.
#[derive(Debug, Default)]
pub struct OperationLog {
    sequence: Seq,
    entries: Vec<LogEntry>,
    active: BTreeSet<Seq>,
    undo_stack: Vec<Seq>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(&self) -> Seq {
        self.sequence
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn active(&self) -> &BTreeSet<Seq> {
        &self.active
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, sequence: Seq) -> Option<&LogEntry> {
        let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }

    /// Records a stroke and makes it visible.
    ///
    /// Committing a stroke discards pending redo targets: once someone draws,
    /// strokes undone earlier can no longer be brought back with redo.
    pub fn append_stroke(&mut self, op: Operation) -> LogEntry {
        debug_assert!(op.is_stroke());
        let entry = self.push(op);
        self.active.insert(entry.sequence);
        self.undo_stack.clear();
        entry
    }

    /// Hides the most recent visible stroke, whoever drew it.
    ///
    /// Since `active` only contains stroke sequences and the log is ordered by
    /// sequence, its largest member is the first visible stroke found when
    /// walking the log backwards.
    pub fn undo(&mut self, author_id: &str, author_name: &str) -> Option<LogEntry> {
        let target_seq = *self.active.iter().next_back()?;
        debug_assert!(self.get(target_seq).is_some_and(|e| e.op.is_stroke()));
        self.active.remove(&target_seq);
        self.undo_stack.push(target_seq);
        Some(self.push(Operation::Undo {
            target_seq,
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
        }))
    }

    /// Restores the most recently undone stroke. The redo entry is logged even
    /// if the target is somehow visible already, so replicas stay in step.
    pub fn redo(&mut self, author_id: &str, author_name: &str) -> Option<LogEntry> {
        let target_seq = self.undo_stack.pop()?;
        self.active.insert(target_seq);
        Some(self.push(Operation::Redo {
            target_seq,
            author_id: author_id.to_string(),
            author_name: author_name.to_string(),
        }))
    }

    fn push(&mut self, op: Operation) -> LogEntry {
        self.sequence += 1;
        let entry = LogEntry {
            sequence: self.sequence,
            op,
        };
        self.entries.push(entry.clone());
        entry
    }
}
