use crate::model::{JournalEntry, Ms, Operation};

/// Global undo stack. Last pushed, first undone; no redo.
///
/// Unbounded: depth is exported as a gauge instead of capped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    next_seq: u64,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Operation, at: Ms) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(JournalEntry { seq, at, op });
        seq
    }

    pub fn pop(&mut self) -> Option<JournalEntry> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
