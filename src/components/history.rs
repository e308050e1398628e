use std::collections::VecDeque;

use crate::canvas::PixelBuffer;

/// Label of the entry every stack starts with.
pub const START_LABEL: &str = "Start";

/// One recorded buffer state.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub label: String,
    pub snapshot: PixelBuffer,
}

// ============================================================================
// HISTORY STACK - linear undo/redo log of buffer snapshots
// ============================================================================

/// Snapshot log with a cursor.
///
/// Never empty. A new stack holds one [`START_LABEL`] entry; once a limit
/// is exceeded the oldest entries are dropped, `Start` included. Pushing
/// after an undo discards everything past the cursor.
#[derive(Clone, Debug)]
pub struct HistoryStack {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    /// 0 = unbounded.
    max_entries: usize,
}

impl HistoryStack {
    pub fn new(start: PixelBuffer) -> Self {
        Self::with_limit(start, 0)
    }

    pub fn with_limit(start: PixelBuffer, max_entries: usize) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(HistoryEntry {
            label: START_LABEL.to_string(),
            snapshot: start,
        });
        Self {
            entries,
            cursor: 0,
            max_entries,
        }
    }

    /// Drop every entry past the cursor.
    pub fn truncate_future(&mut self) {
        self.entries.truncate(self.cursor + 1);
    }

    /// Append a snapshot after the cursor and move the cursor onto it.
    pub fn push(&mut self, label: String, snapshot: PixelBuffer) {
        self.truncate_future();
        self.entries.push_back(HistoryEntry { label, snapshot });
        self.cursor = self.entries.len() - 1;
        self.prune();
    }

    /// Move the cursor back one entry and return its snapshot.
    /// `None` at the first entry.
    pub fn step_back(&mut self) -> Option<&PixelBuffer> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor].snapshot)
    }

    /// Move the cursor forward one entry and return its snapshot.
    /// `None` at the last entry.
    pub fn step_forward(&mut self) -> Option<&PixelBuffer> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor].snapshot)
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Labels oldest first.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn memory_usage(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.snapshot.memory_bytes() + e.label.len())
            .sum()
    }

    /// Drop the oldest entries while over the limit, keeping at least one.
    fn prune(&mut self) {
        if self.max_entries == 0 {
            return;
        }
        while self.entries.len() > self.max_entries.max(1) && self.cursor > 0 {
            self.entries.pop_front();
            self.cursor -= 1;
        }
    }
}
