//! Collection of editable ellipses with undo/redo.
//!
//! [`Scene`] is the coordinating layer around the fitting and session cores:
//! it turns finished strokes into ellipses, routes gestures to the right
//! [`EllipseEditSession`], blocks history navigation while any gesture is in
//! flight, and records every discrete change in an [`EditHistory`].

mod gate;

pub use gate::UndoGate;

use serde::{Deserialize, Serialize};

use crate::conic::{fit_ellipse_with, EllipseParams, FitConfig, FitError, Point};
use crate::history::{Command, EditHistory};
use crate::session::{EditingPolicy, EllipseEditSession, GestureDelta, GestureKind, SessionError};

/// Stable identity of an ellipse within a scene. Survives remove/undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EllipseId(pub u64);

impl std::fmt::Display for EllipseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scene-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Settings of the stroke fit.
    pub fit: FitConfig,
    /// Maximum number of undo (and redo) steps kept.
    pub history_depth: usize,
    /// `semi_major` of ellipses created without a stroke.
    pub default_semi_major: f64,
    /// `semi_minor` of ellipses created without a stroke.
    pub default_semi_minor: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fit: FitConfig::default(),
            history_depth: 100,
            default_semi_major: 100.0,
            default_semi_minor: 50.0,
        }
    }
}

/// Errors raised by [`Scene`] operations. None of them change the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    /// No ellipse with this id.
    UnknownEllipse(EllipseId),
    /// Parameters with non-positive axes or non-finite values.
    InvalidEllipse(EllipseParams),
    /// The stroke could not be fitted.
    Fit(FitError),
    /// The session rejected the operation.
    Session(SessionError),
    /// Undo/redo requested while gestures are in flight.
    HistoryBlocked {
        /// Number of gestures in flight.
        active: usize,
    },
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEllipse(id) => write!(f, "unknown ellipse {}", id),
            Self::InvalidEllipse(e) => write!(f, "invalid ellipse parameters: {:?}", e),
            Self::Fit(e) => write!(f, "fit failed: {}", e),
            Self::Session(e) => write!(f, "{}", e),
            Self::HistoryBlocked { active } => {
                write!(f, "history blocked by {} active gesture(s)", active)
            }
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fit(e) => Some(e),
            Self::Session(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FitError> for SceneError {
    fn from(e: FitError) -> Self {
        Self::Fit(e)
    }
}

impl From<SessionError> for SceneError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: EllipseId,
    session: EllipseEditSession,
}

/// Ellipses in paint order (last is topmost) plus their shared history.
#[derive(Debug, Clone)]
pub struct Scene {
    config: SceneConfig,
    entries: Vec<Entry>,
    next_id: u64,
    history: EditHistory,
    gate: UndoGate,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            history: EditHistory::new_with_capacity(config.history_depth),
            config,
            entries: Vec::new(),
            next_id: 1,
            gate: UndoGate::default(),
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn gate(&self) -> &UndoGate {
        &self.gate
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in paint order.
    pub fn ids(&self) -> Vec<EllipseId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Session of an ellipse.
    pub fn session(&self, id: EllipseId) -> Option<&EllipseEditSession> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.session)
    }

    /// Committed geometry of an ellipse.
    pub fn get(&self, id: EllipseId) -> Option<EllipseParams> {
        self.session(id).map(|s| *s.committed())
    }

    /// Committed geometry of every ellipse, in paint order.
    pub fn ellipses(&self) -> Vec<(EllipseId, EllipseParams)> {
        self.entries
            .iter()
            .map(|e| (e.id, *e.session.committed()))
            .collect()
    }

    /// Fit a finished stroke and add the resulting ellipse.
    ///
    /// A failed fit leaves the scene and its history untouched.
    pub fn fit_stroke(&mut self, points: &[Point]) -> Result<EllipseId, SceneError> {
        let params = fit_ellipse_with(points, &self.config.fit).map_err(|e| {
            tracing::debug!("discarding stroke of {} points: {}", points.len(), e);
            SceneError::Fit(e)
        })?;
        self.add_ellipse(params)
    }

    /// Add an ellipse on top of the others (undoable).
    pub fn add_ellipse(&mut self, params: EllipseParams) -> Result<EllipseId, SceneError> {
        if !params.is_valid() {
            return Err(SceneError::InvalidEllipse(params));
        }
        let id = EllipseId(self.next_id);
        let index = self.entries.len();
        let policy = EditingPolicy::default();
        self.insert_entry(id, index, params, policy)?;
        self.next_id += 1;
        self.history.record(Command::Add {
            id,
            index,
            params,
            policy,
        });
        tracing::info!("added ellipse {}", id);
        Ok(id)
    }

    /// Add an axis-aligned ellipse with the configured default size at `at`.
    pub fn add_default_ellipse(&mut self, at: Point) -> Result<EllipseId, SceneError> {
        self.add_ellipse(EllipseParams::new(
            at,
            self.config.default_semi_major,
            self.config.default_semi_minor,
            0.0,
        ))
    }

    /// Remove an ellipse (undoable). Refused while it has a gesture in flight.
    pub fn remove_ellipse(&mut self, id: EllipseId) -> Result<EllipseParams, SceneError> {
        let index = self.index_of(id)?;
        let session = &self.entries[index].session;
        if let Some(active) = session.active_gesture() {
            return Err(SessionError::Busy { active }.into());
        }
        let params = *session.committed();
        let policy = session.policy();
        self.entries.remove(index);
        self.history.record(Command::Remove {
            id,
            index,
            params,
            policy,
        });
        tracing::info!("removed ellipse {}", id);
        Ok(params)
    }

    /// Advance the editing policy of one ellipse (tap).
    pub fn toggle_policy(&mut self, id: EllipseId) -> Result<EditingPolicy, SceneError> {
        Ok(self.session_mut(id)?.toggle_policy())
    }

    /// Deselect every ellipse (tap on the background).
    pub fn reset_policies(&mut self) {
        for entry in &mut self.entries {
            entry.session.set_policy(EditingPolicy::Unselected);
        }
    }

    /// Start a gesture on an ellipse and block history navigation.
    pub fn begin(&mut self, id: EllipseId, kind: GestureKind) -> Result<(), SceneError> {
        self.session_mut(id)?.begin(kind)?;
        self.gate.acquire(id);
        Ok(())
    }

    /// Feed one gesture sample.
    pub fn update(&mut self, id: EllipseId, delta: GestureDelta) -> Result<(), SceneError> {
        self.session_mut(id)?.update(delta)?;
        Ok(())
    }

    /// Commit a gesture, record it, and release the history block.
    ///
    /// Returns the pre-commit geometry.
    pub fn commit(&mut self, id: EllipseId, kind: GestureKind) -> Result<EllipseParams, SceneError> {
        let session = self.session_mut(id)?;
        let before = session.commit(kind)?;
        let after = *session.committed();
        self.gate.release(id);
        self.history.record(Command::Edit { id, before, after });
        Ok(before)
    }

    /// Cancel a gesture and release the history block.
    pub fn cancel(&mut self, id: EllipseId, kind: GestureKind) -> Result<(), SceneError> {
        self.session_mut(id)?.cancel(kind)?;
        self.gate.release(id);
        Ok(())
    }

    /// Whether an undo is possible right now.
    pub fn can_undo(&self) -> bool {
        !self.gate.is_blocked() && self.history.can_undo()
    }

    /// Whether a redo is possible right now.
    pub fn can_redo(&self) -> bool {
        !self.gate.is_blocked() && self.history.can_redo()
    }

    /// Revert the most recent command. `Ok(false)` if there is none.
    pub fn undo(&mut self) -> Result<bool, SceneError> {
        self.ensure_unblocked()?;
        let Some(command) = self.history.pop_undo() else {
            tracing::warn!("nothing to undo");
            return Ok(false);
        };
        match self.apply(command.inverse()) {
            Ok(applied) => {
                self.history.push_redo(applied.inverse());
                Ok(true)
            }
            Err(e) => {
                self.history.push_undo(command);
                Err(e)
            }
        }
    }

    /// Re-apply the most recently undone command. `Ok(false)` if there is none.
    pub fn redo(&mut self) -> Result<bool, SceneError> {
        self.ensure_unblocked()?;
        let Some(command) = self.history.pop_redo() else {
            tracing::warn!("nothing to redo");
            return Ok(false);
        };
        match self.apply(command) {
            Ok(applied) => {
                self.history.push_undo(applied);
                Ok(true)
            }
            Err(e) => {
                self.history.push_redo(command);
                Err(e)
            }
        }
    }

    /// Topmost ellipse containing `p`, using live geometry.
    pub fn hit_test(&self, p: &Point) -> Option<EllipseId> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.session.contains(p))
            .map(|e| e.id)
    }

    fn ensure_unblocked(&self) -> Result<(), SceneError> {
        if self.gate.is_blocked() {
            return Err(SceneError::HistoryBlocked {
                active: self.gate.active_count(),
            });
        }
        Ok(())
    }

    /// Apply a command and return it as actually applied. A removal
    /// captures the geometry and policy the ellipse had at that moment.
    fn apply(&mut self, command: Command) -> Result<Command, SceneError> {
        tracing::debug!("applying {:?}", command);
        match command {
            Command::Edit { id, after, .. } => {
                self.session_mut(id)?.restore(after)?;
                Ok(command)
            }
            Command::Add {
                id,
                index,
                params,
                policy,
            } => {
                self.insert_entry(id, index, params, policy)?;
                Ok(command)
            }
            Command::Remove { id, .. } => {
                let index = self.index_of(id)?;
                let session = self.entries.remove(index).session;
                Ok(Command::Remove {
                    id,
                    index,
                    params: *session.committed(),
                    policy: session.policy(),
                })
            }
        }
    }

    fn insert_entry(
        &mut self,
        id: EllipseId,
        index: usize,
        params: EllipseParams,
        policy: EditingPolicy,
    ) -> Result<(), SceneError> {
        let mut session = EllipseEditSession::new(params)?;
        session.set_policy(policy);
        let index = index.min(self.entries.len());
        self.entries.insert(index, Entry { id, session });
        Ok(())
    }

    fn index_of(&self, id: EllipseId) -> Result<usize, SceneError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(SceneError::UnknownEllipse(id))
    }

    fn session_mut(&mut self, id: EllipseId) -> Result<&mut EllipseEditSession, SceneError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| &mut e.session)
            .ok_or(SceneError::UnknownEllipse(id))
    }
}
