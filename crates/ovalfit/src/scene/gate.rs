//! Cooperative undo/redo blocking while gestures are in flight.

use super::EllipseId;

/// Registry of ellipses with a gesture in flight.
///
/// History navigation is available only while the registry is empty, so an
/// undo can never race with an uncommitted delta.
#[derive(Debug, Clone, Default)]
pub struct UndoGate {
    active: Vec<EllipseId>,
}

impl UndoGate {
    /// Register `holder` as having started a gesture.
    pub fn acquire(&mut self, holder: EllipseId) {
        self.active.push(holder);
        tracing::debug!("undo gate acquired by {} ({} active)", holder, self.active.len());
    }

    /// Drop one registration of `holder`. Returns false if it held none.
    pub fn release(&mut self, holder: EllipseId) -> bool {
        let Some(pos) = self.active.iter().position(|&h| h == holder) else {
            tracing::warn!("undo gate released by {} which does not hold it", holder);
            return false;
        };
        self.active.remove(pos);
        tracing::debug!("undo gate released by {} ({} active)", holder, self.active.len());
        true
    }

    pub fn is_blocked(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
