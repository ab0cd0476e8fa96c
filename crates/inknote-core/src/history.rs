//! Undo/redo stacks of semantic edit commands.

use crate::model::Stroke;

/// Maximum history depth; exceeding it silently discards the oldest entry.
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Add,
    Delete,
}

impl CommandKind {
    fn inverse(self) -> Self {
        match self {
            CommandKind::Add => CommandKind::Delete,
            CommandKind::Delete => CommandKind::Add,
        }
    }
}

/// One recorded edit: the full strokes added or removed. Applying the
/// inverse restores exactly these strokes, never a partial set.
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub strokes: Vec<Stroke>,
}

impl Command {
    pub fn add(strokes: Vec<Stroke>) -> Self {
        Self {
            kind: CommandKind::Add,
            strokes,
        }
    }

    pub fn delete(strokes: Vec<Stroke>) -> Self {
        Self {
            kind: CommandKind::Delete,
            strokes,
        }
    }
}

/// Linear undo/redo history.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Command>,
    redo: Vec<Command>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new edit. Clears the redo stack (linear history) and caps
    /// the undo stack at [`MAX_HISTORY`].
    pub fn record(&mut self, command: Command) {
        self.redo.clear();
        self.undo.push(command);
        if self.undo.len() > MAX_HISTORY {
            self.undo.remove(0);
        }
    }

    /// Pop the most recent edit for the caller to invert. The inverse is
    /// pushed onto the redo stack.
    pub fn undo(&mut self) -> Option<Command> {
        let cmd = self.undo.pop()?;
        self.redo.push(Command {
            kind: cmd.kind.inverse(),
            strokes: cmd.strokes.clone(),
        });
        Some(cmd)
    }

    /// Pop the most recent undone edit for the caller to re-apply. The
    /// inverse goes back onto the undo stack.
    pub fn redo(&mut self) -> Option<Command> {
        let cmd = self.redo.pop()?;
        self.undo.push(Command {
            kind: cmd.kind.inverse(),
            strokes: cmd.strokes.clone(),
        });
        Some(cmd)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    #[cfg(test)]
    fn undo_depth(&self) -> usize {
        self.undo.len()
    }
}
