use crate::shape::Shape;

/// Committed session state: the shape list and the configured run length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub shapes: Vec<Shape>,
    pub timer_duration: u32,
}

/// Undo/redo stacks of full snapshots. The top of the undo stack is always
/// the current committed state, so undo never drains the last entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct History {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
}

impl History {
    pub fn commit(&mut self, snapshot: Snapshot) {
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
    }

    /// Moves the current state to the redo stack and returns the state to
    /// restore, or `None` if only the baseline is left.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        let current = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        self.undo_stack.last()
    }

    pub fn redo(&mut self) -> Option<&Snapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(next);
        self.undo_stack.last()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
