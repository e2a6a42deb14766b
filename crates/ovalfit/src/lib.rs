//! ovalfit — fit ellipses to hand-drawn strokes and edit them interactively.
//!
//! The crate has three layers:
//!
//! 1. **Conic** – direct least-squares ellipse fitting (ellipse-specific
//!    constraint 4AC − B² = 1) and conversion between the general conic and
//!    the canonical center/axes/rotation form.
//! 2. **Session** – one editable ellipse: committed geometry, the pending
//!    deltas of the gesture in flight, and the editing policy.
//! 3. **Scene** – many sessions in paint order, hit testing, and an undo/redo
//!    history that is blocked while any gesture is in flight.
//!
//! # Example
//! ```
//! use ovalfit::{GestureDelta, GestureKind, Point, Scene, Vector};
//!
//! let stroke: Vec<Point> = (0..32)
//!     .map(|i| {
//!         let t = i as f64 / 32.0 * std::f64::consts::TAU;
//!         Point::new(50.0 + 20.0 * t.cos(), 40.0 + 10.0 * t.sin())
//!     })
//!     .collect();
//!
//! let mut scene = Scene::default();
//! let id = scene.fit_stroke(&stroke).unwrap();
//!
//! scene.begin(id, GestureKind::Translate).unwrap();
//! scene.update(id, GestureDelta::Translate(Vector::new(5.0, 0.0))).unwrap();
//! scene.commit(id, GestureKind::Translate).unwrap();
//! assert!((scene.get(id).unwrap().center.x - 55.0).abs() < 1e-3);
//!
//! assert!(scene.undo().unwrap());
//! assert!((scene.get(id).unwrap().center.x - 50.0).abs() < 1e-3);
//! ```

mod conic;
mod history;
mod scene;
mod session;
#[cfg(test)]
mod test_utils;

pub use conic::{
    conic_to_ellipse, ellipse_to_conic, fit_conic, fit_ellipse, fit_ellipse_report,
    fit_ellipse_with, normalize_rotation, rms_sampson_distance, ConicCoeffs, DegenerateReason,
    EllipseParams, FitConfig, FitError, FitReport, Point, Vector, MIN_FIT_POINTS,
};
pub use history::{Command, EditHistory};
pub use scene::{EllipseId, Scene, SceneConfig, SceneError, UndoGate};
pub use session::{
    EditingPolicy, EllipseEditSession, GestureDelta, GestureKind, PendingDelta, SessionError,
    SessionState,
};
