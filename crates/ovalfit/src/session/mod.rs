//! Interactive edit session for one ellipse.
//!
//! A session holds the committed geometry plus the deltas of the gesture in
//! flight. Each gesture runs `begin → update* → commit | cancel`; only one
//! gesture kind may be in flight at a time. A successful commit returns the
//! pre-commit geometry, which is all a caller needs to undo it through
//! [`EllipseEditSession::restore`].

mod types;

pub use types::{
    EditingPolicy, GestureDelta, GestureKind, PendingDelta, SessionError, SessionState,
};

use crate::conic::{ellipse_quadratic, normalize_rotation, EllipseParams, Point};

/// Committed ellipse geometry plus in-flight gesture deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct EllipseEditSession {
    committed: EllipseParams,
    pending: PendingDelta,
    state: SessionState,
    policy: EditingPolicy,
}

impl EllipseEditSession {
    /// Start a session from fitted or manually specified parameters.
    ///
    /// Fails with [`SessionError::InvalidGeometry`] unless the parameters are
    /// finite with positive axes; the rotation is brought into [0, π).
    pub fn new(committed: EllipseParams) -> Result<Self, SessionError> {
        Ok(Self {
            committed: checked(committed)?,
            pending: PendingDelta::default(),
            state: SessionState::Idle,
            policy: EditingPolicy::default(),
        })
    }

    /// Authoritative geometry; changes only on commit or restore.
    pub fn committed(&self) -> &EllipseParams {
        &self.committed
    }

    /// Deltas of the gesture in flight.
    pub fn pending(&self) -> &PendingDelta {
        &self.pending
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Gesture in flight, if any.
    pub fn active_gesture(&self) -> Option<GestureKind> {
        match self.state {
            SessionState::Idle => None,
            SessionState::InProgress(kind) => Some(kind),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    pub fn policy(&self) -> EditingPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: EditingPolicy) {
        self.policy = policy;
    }

    /// Advance the editing policy one step (tap on the ellipse).
    pub fn toggle_policy(&mut self) -> EditingPolicy {
        self.policy = self.policy.next();
        self.policy
    }

    /// Enter `InProgress(kind)` with zeroed deltas.
    pub fn begin(&mut self, kind: GestureKind) -> Result<(), SessionError> {
        if let SessionState::InProgress(active) = self.state {
            return Err(SessionError::GestureConflict {
                active,
                requested: kind,
            });
        }
        if !self.policy.is_selected() {
            return Err(SessionError::NotSelected);
        }
        self.pending = PendingDelta::default();
        self.state = SessionState::InProgress(kind);
        tracing::debug!("begin {} gesture", kind);
        Ok(())
    }

    /// Accumulate one gesture sample into the pending deltas.
    ///
    /// Pinch factors are turned into additive axis deltas relative to the
    /// committed axes: `scale += (factor − 1) · axis`, for each axis enabled
    /// by the editing policy.
    pub fn update(&mut self, delta: GestureDelta) -> Result<(), SessionError> {
        let kind = delta.kind();
        self.expect_in_progress(kind)?;
        if !delta.is_valid() {
            return Err(SessionError::InvalidDelta { kind });
        }

        let mut next = self.pending;
        match delta {
            GestureDelta::Translate(v) => next.translation += v,
            GestureDelta::Rotate(angle) => next.rotation += angle,
            GestureDelta::Scale(factor) => {
                if self.policy.scales_major() {
                    next.scale_major += (factor - 1.0) * self.committed.semi_major;
                }
                if self.policy.scales_minor() {
                    next.scale_minor += (factor - 1.0) * self.committed.semi_minor;
                }
            }
        }
        if !next.is_finite() {
            return Err(SessionError::InvalidDelta { kind });
        }
        self.pending = next;
        tracing::trace!("update {:?} -> pending {:?}", delta, self.pending);
        Ok(())
    }

    /// Fold the pending deltas into the committed geometry.
    ///
    /// Returns the pre-commit geometry. A scale commit that would leave an
    /// axis non-positive fails with [`SessionError::InvalidScale`], any other
    /// non-finite result with [`SessionError::InvalidGeometry`]. Either way the
    /// session is left untouched, still in progress.
    pub fn commit(&mut self, kind: GestureKind) -> Result<EllipseParams, SessionError> {
        self.expect_in_progress(kind)?;

        let before = self.committed;
        let after = match kind {
            GestureKind::Translate => before.translated(&self.pending.translation),
            GestureKind::Rotate => before.rotated(self.pending.rotation),
            GestureKind::ScaleAxes => {
                let semi_major = before.semi_major + self.pending.scale_major;
                let semi_minor = before.semi_minor + self.pending.scale_minor;
                if !(semi_major > 0.0 && semi_minor > 0.0)
                    || !semi_major.is_finite()
                    || !semi_minor.is_finite()
                {
                    return Err(SessionError::InvalidScale {
                        semi_major,
                        semi_minor,
                    });
                }
                before.with_axes(semi_major, semi_minor)
            }
        };
        if !after.is_valid() {
            return Err(SessionError::InvalidGeometry(after));
        }

        self.committed = after;
        self.pending = PendingDelta::default();
        self.state = SessionState::Idle;
        tracing::debug!("commit {} gesture: {:?} -> {:?}", kind, before, after);
        Ok(before)
    }

    /// Discard the pending deltas; committed geometry is untouched.
    pub fn cancel(&mut self, kind: GestureKind) -> Result<(), SessionError> {
        self.expect_in_progress(kind)?;
        self.pending = PendingDelta::default();
        self.state = SessionState::Idle;
        tracing::debug!("cancel {} gesture", kind);
        Ok(())
    }

    /// Replace the committed geometry with a captured snapshot (undo/redo).
    ///
    /// Returns the geometry that was replaced, so the caller can build the
    /// opposite operation. Snapshots taken from [`Self::commit`] are restored
    /// bit for bit.
    pub fn restore(&mut self, snapshot: EllipseParams) -> Result<EllipseParams, SessionError> {
        if let SessionState::InProgress(active) = self.state {
            return Err(SessionError::Busy { active });
        }
        let snapshot = checked(snapshot)?;
        Ok(std::mem::replace(&mut self.committed, snapshot))
    }

    /// Geometry as currently displayed: committed plus all pending deltas,
    /// without validation.
    pub fn live(&self) -> EllipseParams {
        let c = &self.committed;
        EllipseParams {
            center: c.center + self.pending.translation,
            semi_major: c.semi_major + self.pending.scale_major,
            semi_minor: c.semi_minor + self.pending.scale_minor,
            rotation: normalize_rotation(c.rotation + self.pending.rotation),
        }
    }

    /// Hit test against the live geometry: translate `p` into the ellipse
    /// frame, rotate by −(rotation + pending rotation), and test
    /// x²/a² + y²/b² ≤ 1.
    pub fn contains(&self, p: &Point) -> bool {
        let live = self.live();
        if !(live.semi_major > 0.0 && live.semi_minor > 0.0) {
            return false;
        }
        let local = nalgebra::Rotation2::new(-(self.committed.rotation + self.pending.rotation))
            * (p - live.center);
        ellipse_quadratic(local, live.semi_major, live.semi_minor) <= 1.0
    }

    fn expect_in_progress(&self, kind: GestureKind) -> Result<(), SessionError> {
        match self.state {
            SessionState::InProgress(active) if active == kind => Ok(()),
            SessionState::InProgress(active) => Err(SessionError::GestureConflict {
                active,
                requested: kind,
            }),
            SessionState::Idle => Err(SessionError::NotInProgress { requested: kind }),
        }
    }
}

/// Validate geometry and normalize its rotation. Rotations already in
/// [0, π) pass through unchanged.
fn checked(params: EllipseParams) -> Result<EllipseParams, SessionError> {
    if !params.is_valid() {
        return Err(SessionError::InvalidGeometry(params));
    }
    Ok(EllipseParams::new(
        params.center,
        params.semi_major,
        params.semi_minor,
        params.rotation,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conic::{Point, Vector};
    use crate::test_utils::make_test_ellipse;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn session() -> EllipseEditSession {
        EllipseEditSession::new(make_test_ellipse()).unwrap()
    }

    fn bits(e: &EllipseParams) -> [u64; 5] {
        [
            e.center.x.to_bits(),
            e.center.y.to_bits(),
            e.semi_major.to_bits(),
            e.semi_minor.to_bits(),
            e.rotation.to_bits(),
        ]
    }

    #[test]
    fn translate_commit_moves_center_and_returns_snapshot() {
        let mut s = session();
        s.begin(GestureKind::Translate).unwrap();
        s.update(GestureDelta::Translate(Vector::new(3.0, -1.0))).unwrap();
        s.update(GestureDelta::Translate(Vector::new(2.0, 4.0))).unwrap();
        assert_eq!(s.pending().translation, Vector::new(5.0, 3.0));

        let before = s.commit(GestureKind::Translate).unwrap();
        assert_eq!(before, make_test_ellipse());
        assert_eq!(s.committed().center, Point::new(105.0, 83.0));
        assert!(s.pending().is_zero());
        assert!(s.is_idle());
    }

    #[test]
    fn rotate_commit_normalizes_rotation() {
        let mut s = session();
        s.begin(GestureKind::Rotate).unwrap();
        s.update(GestureDelta::Rotate(PI)).unwrap();
        s.update(GestureDelta::Rotate(0.5)).unwrap();
        s.commit(GestureKind::Rotate).unwrap();
        assert_relative_eq!(s.committed().rotation, 0.8, epsilon = 1e-12);

        s.begin(GestureKind::Rotate).unwrap();
        s.update(GestureDelta::Rotate(-1.0)).unwrap();
        s.commit(GestureKind::Rotate).unwrap();
        assert_relative_eq!(s.committed().rotation, PI - 0.2, epsilon = 1e-12);
        assert!((0.0..PI).contains(&s.committed().rotation));
    }

    #[test]
    fn scale_uses_committed_axes_and_policy() {
        let mut s = session();
        s.begin(GestureKind::ScaleAxes).unwrap();
        s.update(GestureDelta::Scale(1.5)).unwrap();
        s.update(GestureDelta::Scale(1.5)).unwrap();
        // Each sample adds (factor − 1) · committed axis.
        assert_relative_eq!(s.pending().scale_major, 30.0);
        assert_relative_eq!(s.pending().scale_minor, 15.0);
        s.commit(GestureKind::ScaleAxes).unwrap();
        assert_relative_eq!(s.committed().semi_major, 60.0);
        assert_relative_eq!(s.committed().semi_minor, 30.0);

        s.set_policy(EditingPolicy::MajorAxis);
        s.begin(GestureKind::ScaleAxes).unwrap();
        s.update(GestureDelta::Scale(0.5)).unwrap();
        s.commit(GestureKind::ScaleAxes).unwrap();
        assert_relative_eq!(s.committed().semi_major, 30.0);
        assert_relative_eq!(s.committed().semi_minor, 30.0);

        s.set_policy(EditingPolicy::MinorAxis);
        s.begin(GestureKind::ScaleAxes).unwrap();
        s.update(GestureDelta::Scale(2.0)).unwrap();
        s.commit(GestureKind::ScaleAxes).unwrap();
        assert_relative_eq!(s.committed().semi_major, 30.0);
        assert_relative_eq!(s.committed().semi_minor, 60.0);
    }

    #[test]
    fn commit_then_restore_reproduces_prior_state() {
        let mut s = session();
        let gestures = [
            (GestureKind::Translate, GestureDelta::Translate(Vector::new(-7.5, 0.25))),
            (GestureKind::Rotate, GestureDelta::Rotate(2.9)),
            (GestureKind::ScaleAxes, GestureDelta::Scale(0.8)),
        ];

        let mut snapshots = Vec::new();
        for (kind, delta) in gestures {
            let expected = *s.committed();
            s.begin(kind).unwrap();
            for _ in 0..4 {
                s.update(delta).unwrap();
            }
            let before = s.commit(kind).unwrap();
            assert_eq!(bits(&before), bits(&expected));
            snapshots.push((before, *s.committed()));
        }

        // Undo in reverse order, then redo forward.
        for (before, after) in snapshots.iter().rev() {
            let replaced = s.restore(*before).unwrap();
            assert_eq!(bits(&replaced), bits(after));
            assert_eq!(bits(s.committed()), bits(before));
        }
        assert_eq!(bits(s.committed()), bits(&make_test_ellipse()));
        for (_, after) in &snapshots {
            s.restore(*after).unwrap();
        }
        assert_eq!(bits(s.committed()), bits(&snapshots[2].1));
    }

    #[test]
    fn cancel_leaves_committed_bit_for_bit() {
        let original = make_test_ellipse();
        let mut s = session();
        for (kind, delta) in [
            (GestureKind::Translate, GestureDelta::Translate(Vector::new(1e6, -3.3))),
            (GestureKind::Rotate, GestureDelta::Rotate(-12.0)),
            (GestureKind::ScaleAxes, GestureDelta::Scale(0.01)),
        ] {
            s.begin(kind).unwrap();
            for _ in 0..10 {
                s.update(delta).unwrap();
            }
            s.cancel(kind).unwrap();
            assert_eq!(bits(s.committed()), bits(&original));
            assert!(s.pending().is_zero());
            assert!(s.is_idle());
        }
    }

    #[test]
    fn shrinking_never_crosses_zero() {
        let mut s = session();
        for _ in 0..20 {
            s.begin(GestureKind::ScaleAxes).unwrap();
            s.update(GestureDelta::Scale(0.6)).unwrap();
            s.update(GestureDelta::Scale(0.7)).unwrap();
            s.commit(GestureKind::ScaleAxes).unwrap();
            assert!(s.committed().semi_major > 0.0);
            assert!(s.committed().semi_minor > 0.0);
        }

        let before = *s.committed();
        s.begin(GestureKind::ScaleAxes).unwrap();
        s.update(GestureDelta::Scale(0.5)).unwrap();
        s.update(GestureDelta::Scale(0.5)).unwrap();
        let pending = *s.pending();
        let err = s.commit(GestureKind::ScaleAxes).unwrap_err();
        assert!(matches!(err, SessionError::InvalidScale { .. }), "{err}");

        // Atomic failure: nothing changed, gesture still open.
        assert_eq!(bits(s.committed()), bits(&before));
        assert_eq!(*s.pending(), pending);
        assert_eq!(s.active_gesture(), Some(GestureKind::ScaleAxes));
        s.cancel(GestureKind::ScaleAxes).unwrap();
        assert_eq!(bits(s.committed()), bits(&before));
    }

    #[test]
    fn overshooting_shrink_is_rejected() {
        let mut s = session();
        s.set_policy(EditingPolicy::MinorAxis);
        s.begin(GestureKind::ScaleAxes).unwrap();
        for _ in 0..3 {
            s.update(GestureDelta::Scale(0.5)).unwrap();
        }
        assert_eq!(
            s.commit(GestureKind::ScaleAxes),
            Err(SessionError::InvalidScale {
                semi_major: 30.0,
                semi_minor: -7.5
            })
        );
    }

    #[test]
    fn conflicting_gestures_are_rejected() {
        let mut s = session();
        s.begin(GestureKind::Rotate).unwrap();
        s.update(GestureDelta::Rotate(0.1)).unwrap();
        let snapshot = s.clone();

        let conflict = SessionError::GestureConflict {
            active: GestureKind::Rotate,
            requested: GestureKind::Translate,
        };
        assert_eq!(s.begin(GestureKind::Translate), Err(conflict.clone()));
        assert_eq!(
            s.update(GestureDelta::Translate(Vector::new(1.0, 1.0))),
            Err(conflict.clone())
        );
        assert_eq!(s.commit(GestureKind::Translate), Err(conflict.clone()));
        assert_eq!(s.cancel(GestureKind::Translate), Err(conflict));
        assert_eq!(
            s.begin(GestureKind::Rotate),
            Err(SessionError::GestureConflict {
                active: GestureKind::Rotate,
                requested: GestureKind::Rotate
            })
        );
        assert_eq!(s, snapshot);
    }

    #[test]
    fn idle_session_rejects_update_commit_cancel() {
        let mut s = session();
        let idle = SessionError::NotInProgress {
            requested: GestureKind::ScaleAxes,
        };
        assert_eq!(s.update(GestureDelta::Scale(2.0)), Err(idle.clone()));
        assert_eq!(s.commit(GestureKind::ScaleAxes), Err(idle.clone()));
        assert_eq!(s.cancel(GestureKind::ScaleAxes), Err(idle));
        assert_eq!(s, session());
    }

    #[test]
    fn restore_is_refused_mid_gesture() {
        let mut s = session();
        s.begin(GestureKind::Translate).unwrap();
        let other = make_test_ellipse().translated(&Vector::new(1.0, 0.0));
        assert_eq!(
            s.restore(other),
            Err(SessionError::Busy {
                active: GestureKind::Translate
            })
        );
        assert_eq!(*s.committed(), make_test_ellipse());
    }

    #[test]
    fn invalid_deltas_are_rejected() {
        let mut s = session();
        s.begin(GestureKind::ScaleAxes).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(
                s.update(GestureDelta::Scale(bad)),
                Err(SessionError::InvalidDelta {
                    kind: GestureKind::ScaleAxes
                })
            );
        }
        assert!(s.pending().is_zero());
        s.cancel(GestureKind::ScaleAxes).unwrap();

        s.begin(GestureKind::Translate).unwrap();
        assert!(s
            .update(GestureDelta::Translate(Vector::new(f64::NAN, 0.0)))
            .is_err());
        assert!(s.pending().is_zero());
    }

    #[test]
    fn accumulated_overflow_is_rejected_per_sample() {
        let mut s = session();
        s.begin(GestureKind::Rotate).unwrap();
        s.update(GestureDelta::Rotate(1e308)).unwrap();
        assert_eq!(
            s.update(GestureDelta::Rotate(1e308)),
            Err(SessionError::InvalidDelta {
                kind: GestureKind::Rotate
            })
        );
        assert_eq!(s.pending().rotation, 1e308);
        s.commit(GestureKind::Rotate).unwrap();
        let rotation = s.committed().rotation;
        assert!((0.0..PI).contains(&rotation), "rotation {}", rotation);

        s.begin(GestureKind::Translate).unwrap();
        s.update(GestureDelta::Translate(Vector::new(1e308, 0.0))).unwrap();
        assert!(s
            .update(GestureDelta::Translate(Vector::new(1e308, 0.0)))
            .is_err());
        s.commit(GestureKind::Translate).unwrap();
        assert!(s.committed().is_valid());
    }

    #[test]
    fn non_finite_translate_commit_is_atomic() {
        let start = EllipseParams::new(Point::new(1e308, 0.0), 5.0, 3.0, 0.0);
        let mut s = EllipseEditSession::new(start).unwrap();
        s.begin(GestureKind::Translate).unwrap();
        s.update(GestureDelta::Translate(Vector::new(1e308, 0.0))).unwrap();

        let err = s.commit(GestureKind::Translate).unwrap_err();
        assert!(matches!(err, SessionError::InvalidGeometry(_)), "{err}");
        assert_eq!(bits(s.committed()), bits(&start));
        assert_eq!(s.active_gesture(), Some(GestureKind::Translate));
        s.cancel(GestureKind::Translate).unwrap();
        assert!(s.is_idle());
    }

    #[test]
    fn invalid_geometry_is_never_stored() {
        let broken = EllipseParams {
            center: Point::new(0.0, 0.0),
            semi_major: -3.0,
            semi_minor: 0.0,
            rotation: 9.0,
        };
        assert_eq!(
            EllipseEditSession::new(broken),
            Err(SessionError::InvalidGeometry(broken))
        );

        let mut s = session();
        assert_eq!(s.restore(broken), Err(SessionError::InvalidGeometry(broken)));
        let nan_center = EllipseParams {
            center: Point::new(f64::NAN, 1.0),
            ..make_test_ellipse()
        };
        assert!(s.restore(nan_center).is_err());
        assert_eq!(bits(s.committed()), bits(&make_test_ellipse()));

        // Valid axes with an out-of-range angle are stored normalized.
        let spun = EllipseParams {
            rotation: 9.0,
            ..make_test_ellipse()
        };
        s.restore(spun).unwrap();
        assert_relative_eq!(s.committed().rotation, 9.0 - 2.0 * PI, epsilon = 1e-12);
    }

    #[test]
    fn unselected_session_rejects_gestures() {
        let mut s = session();
        assert_eq!(s.toggle_policy(), EditingPolicy::MajorAxis);
        assert_eq!(s.toggle_policy(), EditingPolicy::MinorAxis);
        assert_eq!(s.toggle_policy(), EditingPolicy::Unselected);
        assert_eq!(s.begin(GestureKind::Rotate), Err(SessionError::NotSelected));
        assert!(s.is_idle());
        assert_eq!(s.toggle_policy(), EditingPolicy::BothAxes);
        s.begin(GestureKind::Rotate).unwrap();
    }

    #[test]
    fn live_geometry_includes_pending() {
        let mut s = session();
        s.begin(GestureKind::Translate).unwrap();
        s.update(GestureDelta::Translate(Vector::new(10.0, 0.0))).unwrap();
        let live = s.live();
        assert_eq!(live.center, Point::new(110.0, 80.0));
        assert_eq!(*s.committed(), make_test_ellipse());
    }

    #[test]
    fn containment_matches_canonical_test_without_pending() {
        let s = session();
        let e = *s.committed();
        for i in 0..=30 {
            for j in 0..=30 {
                let p = Point::new(60.0 + 80.0 * i as f64 / 30.0, 40.0 + 80.0 * j as f64 / 30.0);
                assert_eq!(s.contains(&p), e.contains(&p), "at {:?}", p);
            }
        }
    }

    #[test]
    fn containment_tracks_pending_rotation() {
        let e = EllipseParams::new(Point::new(0.0, 0.0), 10.0, 2.0, 0.0);
        let mut s = EllipseEditSession::new(e).unwrap();
        let on_x = Point::new(8.0, 0.0);
        let on_y = Point::new(0.0, 8.0);
        assert!(s.contains(&on_x));
        assert!(!s.contains(&on_y));

        s.begin(GestureKind::Rotate).unwrap();
        s.update(GestureDelta::Rotate(FRAC_PI_2)).unwrap();
        assert!(!s.contains(&on_x));
        assert!(s.contains(&on_y));

        s.cancel(GestureKind::Rotate).unwrap();
        assert!(s.contains(&on_x));
    }
}
