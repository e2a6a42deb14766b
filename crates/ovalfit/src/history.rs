//! Bounded undo/redo stack of reversible scene commands.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::conic::EllipseParams;
use crate::scene::EllipseId;
use crate::session::EditingPolicy;

/// A reversible change to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Command {
    /// A committed gesture changed one ellipse.
    Edit {
        id: EllipseId,
        before: EllipseParams,
        after: EllipseParams,
    },
    /// An ellipse was inserted at `index` in paint order.
    Add {
        id: EllipseId,
        index: usize,
        params: EllipseParams,
        policy: EditingPolicy,
    },
    /// An ellipse was removed from `index` in paint order.
    Remove {
        id: EllipseId,
        index: usize,
        params: EllipseParams,
        policy: EditingPolicy,
    },
}

impl Command {
    /// The command that reverts this one.
    pub fn inverse(&self) -> Self {
        match *self {
            Self::Edit { id, before, after } => Self::Edit {
                id,
                before: after,
                after: before,
            },
            Self::Add {
                id,
                index,
                params,
                policy,
            } => Self::Remove {
                id,
                index,
                params,
                policy,
            },
            Self::Remove {
                id,
                index,
                params,
                policy,
            } => Self::Add {
                id,
                index,
                params,
                policy,
            },
        }
    }

    /// Ellipse the command refers to.
    pub fn id(&self) -> EllipseId {
        match *self {
            Self::Edit { id, .. } | Self::Add { id, .. } | Self::Remove { id, .. } => id,
        }
    }
}

/// Undo/redo manager holding forward commands.
///
/// Undoing a command applies its [`Command::inverse`]; redoing applies the
/// command itself. Popping only takes the command out: the caller applies it
/// and then hands the command as actually applied to [`Self::push_redo`] or
/// [`Self::push_undo`], or puts it back where it came from on failure.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    undo_stack: VecDeque<Command>,
    redo_stack: VecDeque<Command>,
    max_depth: usize,
}

impl EditHistory {
    /// Create a history keeping at most `max_depth` entries per stack.
    pub fn new_with_capacity(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_depth),
            redo_stack: VecDeque::with_capacity(max_depth),
            max_depth,
        }
    }

    /// Record a freshly applied command. Clears the redo stack.
    pub fn record(&mut self, command: Command) {
        push_bounded(&mut self.undo_stack, command, self.max_depth);
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Take the most recent command. The caller applies its inverse.
    pub fn pop_undo(&mut self) -> Option<Command> {
        self.undo_stack.pop_back()
    }

    /// Take the most recently undone command. The caller applies it.
    pub fn pop_redo(&mut self) -> Option<Command> {
        self.redo_stack.pop_back()
    }

    /// Push onto the undo stack without touching the redo stack.
    pub fn push_undo(&mut self, command: Command) {
        push_bounded(&mut self.undo_stack, command, self.max_depth);
    }

    /// Push onto the redo stack.
    pub fn push_redo(&mut self, command: Command) {
        push_bounded(&mut self.redo_stack, command, self.max_depth);
    }

    /// Number of undoable commands.
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redoable commands.
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded(stack: &mut VecDeque<Command>, command: Command, max_depth: usize) {
    if max_depth == 0 {
        return;
    }
    if stack.len() >= max_depth {
        stack.pop_front();
    }
    stack.push_back(command);
}
