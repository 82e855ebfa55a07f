//! Snapshot-based undo/redo.
//!
//! Linear history: committing after an undo discards the redo branch.

use mindmap_core::GraphSnapshot;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub label: String,
    pub snapshot: GraphSnapshot,
}

/// Bounded stack of snapshots with a movable pointer.
///
/// The entry under the pointer is the state the last commit, undo or redo
/// left behind.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    position: usize,
    max_size: usize,
}

impl History {
    /// Starts a history whose only entry is `initial`.
    pub fn new(max_size: usize, initial: GraphSnapshot) -> Self {
        Self {
            entries: vec![HistoryEntry {
                label: "initial".to_string(),
                snapshot: initial,
            }],
            position: 0,
            max_size: max_size.max(1),
        }
    }

    pub fn commit(&mut self, label: impl Into<String>, snapshot: GraphSnapshot) {
        self.entries.truncate(self.position + 1);
        self.entries.push(HistoryEntry {
            label: label.into(),
            snapshot,
        });

        if self.entries.len() > self.max_size {
            // The window slides; the pointer already sits on the new top.
            self.entries.remove(0);
        } else {
            self.position += 1;
        }
    }

    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        self.entries.get(self.position)
    }

    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if self.position + 1 >= self.entries.len() {
            return None;
        }
        self.position += 1;
        self.entries.get(self.position)
    }

    /// Forgets everything and starts over from `initial`.
    pub fn reset(&mut self, initial: GraphSnapshot) {
        *self = Self::new(self.max_size, initial);
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position + 1 < self.entries.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.position)
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.can_undo()
            .then(|| self.entries[self.position].label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.entries
            .get(self.position + 1)
            .map(|e| e.label.as_str())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}
