//! Ellipse / conic fitting primitives.
//!
//! Implements:
//! - Direct least-squares conic fit (Fitzgibbon et al., "Direct Least Square Fitting of Ellipses", 1999).
//! - Conversion between general conic coefficients and canonical ellipse parameters.
//! - Containment and Sampson residuals against canonical parameters.

mod eigen;
mod fit;
mod types;

pub use fit::{
    fit_conic, fit_ellipse, fit_ellipse_report, fit_ellipse_with, rms_sampson_distance,
    MIN_FIT_POINTS,
};
pub(crate) use types::ellipse_quadratic;
pub use types::{
    conic_to_ellipse, ellipse_to_conic, normalize_rotation, ConicCoeffs, DegenerateReason,
    EllipseParams, FitConfig, FitError, FitReport, Point, Vector,
};
