//! Gesture kinds, deltas, editing policy and session errors.

use serde::{Deserialize, Serialize};

use crate::conic::{EllipseParams, Vector};

/// The three continuous gestures an ellipse responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    /// Pan: moves the center.
    Translate,
    /// Two-finger rotation about the center.
    Rotate,
    /// Pinch: scales the semi-axes.
    ScaleAxes,
}

impl std::fmt::Display for GestureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Translate => "translate",
            Self::Rotate => "rotate",
            Self::ScaleAxes => "scale",
        };
        f.write_str(s)
    }
}

/// One incremental gesture sample, in caller units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureDelta {
    /// Displacement since the previous sample.
    Translate(Vector),
    /// Rotation in radians since the previous sample.
    Rotate(f64),
    /// Multiplicative pinch factor since the previous sample (1.0 = no change).
    Scale(f64),
}

impl GestureDelta {
    /// Gesture this sample belongs to.
    pub fn kind(&self) -> GestureKind {
        match self {
            Self::Translate(_) => GestureKind::Translate,
            Self::Rotate(_) => GestureKind::Rotate,
            Self::Scale(_) => GestureKind::ScaleAxes,
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        match *self {
            Self::Translate(v) => v.x.is_finite() && v.y.is_finite(),
            Self::Rotate(a) => a.is_finite(),
            Self::Scale(f) => f.is_finite() && f > 0.0,
        }
    }
}

/// Uncommitted transform accumulated during a gesture.
///
/// All-zero outside of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingDelta {
    /// Accumulated center displacement.
    pub translation: Vector,
    /// Accumulated rotation in radians.
    pub rotation: f64,
    /// Additive change of `semi_major`.
    pub scale_major: f64,
    /// Additive change of `semi_minor`.
    pub scale_minor: f64,
}

impl Default for PendingDelta {
    fn default() -> Self {
        Self {
            translation: Vector::zeros(),
            rotation: 0.0,
            scale_major: 0.0,
            scale_minor: 0.0,
        }
    }
}

impl PendingDelta {
    /// True when no transform is pending.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.translation.x.is_finite()
            && self.translation.y.is_finite()
            && self.rotation.is_finite()
            && self.scale_major.is_finite()
            && self.scale_minor.is_finite()
    }
}

/// Which axes a pinch edits, and whether the ellipse accepts gestures at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditingPolicy {
    /// Not selected: gestures are rejected.
    Unselected,
    /// Pinch scales both axes.
    #[default]
    BothAxes,
    /// Pinch scales only `semi_major`.
    MajorAxis,
    /// Pinch scales only `semi_minor`.
    MinorAxis,
}

impl EditingPolicy {
    /// Next policy in the tap cycle
    /// `Unselected → BothAxes → MajorAxis → MinorAxis → Unselected`.
    pub fn next(self) -> Self {
        match self {
            Self::Unselected => Self::BothAxes,
            Self::BothAxes => Self::MajorAxis,
            Self::MajorAxis => Self::MinorAxis,
            Self::MinorAxis => Self::Unselected,
        }
    }

    /// Whether gestures are accepted.
    pub fn is_selected(self) -> bool {
        self != Self::Unselected
    }

    pub(crate) fn scales_major(self) -> bool {
        matches!(self, Self::BothAxes | Self::MajorAxis)
    }

    pub(crate) fn scales_minor(self) -> bool {
        matches!(self, Self::BothAxes | Self::MinorAxis)
    }
}

/// Gesture state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No gesture in flight.
    Idle,
    /// A gesture of the given kind is in flight.
    InProgress(GestureKind),
}

/// Errors raised by [`super::EllipseEditSession`]. A failed call never
/// changes the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A different gesture is already in flight.
    GestureConflict {
        /// Gesture currently in flight.
        active: GestureKind,
        /// Gesture the caller asked for.
        requested: GestureKind,
    },
    /// No gesture is in flight.
    NotInProgress {
        /// Gesture the caller asked for.
        requested: GestureKind,
    },
    /// The committed geometry cannot be replaced during a gesture.
    Busy {
        /// Gesture currently in flight.
        active: GestureKind,
    },
    /// The ellipse is not selected for editing.
    NotSelected,
    /// Non-finite sample, non-positive pinch factor, or a sample that would
    /// overflow the accumulated delta.
    InvalidDelta {
        /// Gesture the sample was meant for.
        kind: GestureKind,
    },
    /// Committing would make a semi-axis non-positive.
    InvalidScale {
        /// `semi_major` the commit would have produced.
        semi_major: f64,
        /// `semi_minor` the commit would have produced.
        semi_minor: f64,
    },
    /// Non-finite values or non-positive axes; rejected on construction,
    /// restore and translate/rotate commits.
    InvalidGeometry(EllipseParams),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GestureConflict { active, requested } => write!(
                f,
                "gesture conflict: {} requested while {} is in progress",
                requested, active
            ),
            Self::NotInProgress { requested } => {
                write!(f, "no {} gesture in progress", requested)
            }
            Self::Busy { active } => write!(f, "{} gesture in progress", active),
            Self::NotSelected => f.write_str("ellipse is not selected"),
            Self::InvalidDelta { kind } => write!(f, "invalid {} delta", kind),
            Self::InvalidScale {
                semi_major,
                semi_minor,
            } => write!(
                f,
                "invalid scale: axes would become ({}, {})",
                semi_major, semi_minor
            ),
            Self::InvalidGeometry(e) => write!(f, "invalid ellipse geometry: {:?}", e),
        }
    }
}

impl std::error::Error for SessionError {}
