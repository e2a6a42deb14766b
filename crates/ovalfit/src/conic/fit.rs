//! Direct least-squares ellipse fitting (Fitzgibbon et al., 1999).

use nalgebra::{DMatrix, Matrix6, Vector6};

use super::eigen::{constraint_matrix, ellipse_constraint, null_directions, solve_gep_6x6};
use super::types::{
    ConicCoeffs, DegenerateReason, EllipseParams, FitConfig, FitError, FitReport, Point, Vector,
};

/// A general conic has five degrees of freedom once its scale is fixed.
pub const MIN_FIT_POINTS: usize = 5;

/// Fit an ellipse with the default [`FitConfig`].
pub fn fit_ellipse(points: &[Point]) -> Result<EllipseParams, FitError> {
    fit_ellipse_with(points, &FitConfig::default())
}

/// Fit an ellipse to a set of 2D points using the direct least-squares method
/// of Fitzgibbon et al. (1999).
///
/// The method solves a constrained eigenvalue problem enforcing the ellipse
/// constraint 4AC − B² = 1 via the constraint matrix C, then converts the
/// selected conic to canonical parameters. The order of the samples does not
/// matter beyond last-bit floating point effects.
pub fn fit_ellipse_with(points: &[Point], config: &FitConfig) -> Result<EllipseParams, FitError> {
    let frame = Normalization::for_points(points, config)?;
    let coeffs = to_coeffs(&solve_in_frame(points, &frame, config)?);
    let local = coeffs.to_ellipse(config)?;
    let ellipse = frame.denormalize_ellipse(&local);

    tracing::debug!(
        "fit {} points: center=({:.3}, {:.3}) axes=({:.3}, {:.3}) rotation={:.4}",
        points.len(),
        ellipse.center.x,
        ellipse.center.y,
        ellipse.semi_major,
        ellipse.semi_minor,
        ellipse.rotation
    );
    Ok(ellipse)
}

/// Fit and return the conic coefficients in the input coordinate frame.
///
/// The coefficients are scaled so that the conic satisfies 4AC − B² > 0 but
/// are otherwise not normalized.
pub fn fit_conic(points: &[Point], config: &FitConfig) -> Result<ConicCoeffs, FitError> {
    let frame = Normalization::for_points(points, config)?;
    let coeffs = solve_in_frame(points, &frame, config)?;
    // Validate in the working frame, where F is well away from zero.
    to_coeffs(&coeffs).to_ellipse(config)?;
    Ok(ConicCoeffs(denormalize_conic(
        &coeffs,
        frame.mean.x,
        frame.mean.y,
        frame.scale,
    )))
}

/// Fit an ellipse and measure how well it explains the samples.
pub fn fit_ellipse_report(points: &[Point], config: &FitConfig) -> Result<FitReport, FitError> {
    let ellipse = fit_ellipse_with(points, config)?;
    Ok(FitReport {
        ellipse,
        rms_residual: rms_sampson_distance(&ellipse, points),
        n_points: points.len(),
    })
}

/// Compute RMS Sampson distance of points to an ellipse.
pub fn rms_sampson_distance(ellipse: &EllipseParams, points: &[Point]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = points
        .iter()
        .map(|p| {
            let d = ellipse.sampson_distance(p);
            d * d
        })
        .sum();
    (sum_sq / points.len() as f64).sqrt()
}

/// Similarity transform into the working frame: x' = s (x − mean).
#[derive(Debug, Clone, Copy)]
struct Normalization {
    mean: Point,
    scale: f64,
}

impl Normalization {
    /// Validate the samples and compute the working frame: centroid at the
    /// origin, mean distance from it ≈ √2. Identity when normalization is off.
    fn for_points(points: &[Point], config: &FitConfig) -> Result<Self, FitError> {
        let n = points.len();
        if n < MIN_FIT_POINTS {
            return Err(FitError::InsufficientPoints {
                needed: MIN_FIT_POINTS,
                got: n,
            });
        }
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(FitError::DegenerateFit(DegenerateReason::NonFiniteInput));
        }
        if !config.normalize {
            return Ok(Self {
                mean: Point::origin(),
                scale: 1.0,
            });
        }

        let nf = n as f64;
        let mean_x: f64 = points.iter().map(|p| p.x).sum::<f64>() / nf;
        let mean_y: f64 = points.iter().map(|p| p.y).sum::<f64>() / nf;

        let mean_dist: f64 = points
            .iter()
            .map(|p| ((p.x - mean_x).powi(2) + (p.y - mean_y).powi(2)).sqrt())
            .sum::<f64>()
            / nf;

        let scale = if mean_dist > 1e-15 {
            std::f64::consts::SQRT_2 / mean_dist
        } else {
            1.0
        };

        Ok(Self {
            mean: Point::new(mean_x, mean_y),
            scale,
        })
    }

    fn apply(&self, p: &Point) -> (f64, f64) {
        ((p.x - self.mean.x) * self.scale, (p.y - self.mean.y) * self.scale)
    }

    /// Map an ellipse fitted in the working frame back to input coordinates.
    fn denormalize_ellipse(&self, e: &EllipseParams) -> EllipseParams {
        let inv = 1.0 / self.scale;
        EllipseParams {
            center: self.mean + Vector::new(e.center.x, e.center.y) * inv,
            semi_major: e.semi_major * inv,
            semi_minor: e.semi_minor * inv,
            rotation: e.rotation,
        }
    }
}

/// Scatter matrix S = Dᵀ D of the design matrix D = [x², xy, y², x, y, 1]
/// built from working-frame coordinates.
fn scatter_matrix(points: &[Point], frame: &Normalization) -> Matrix6<f64> {
    let mut d = DMatrix::<f64>::zeros(points.len(), 6);
    for (i, p) in points.iter().enumerate() {
        let (x, y) = frame.apply(p);
        d[(i, 0)] = x * x;
        d[(i, 1)] = x * y;
        d[(i, 2)] = y * y;
        d[(i, 3)] = x;
        d[(i, 4)] = y;
        d[(i, 5)] = 1.0;
    }
    (d.transpose() * &d).fixed_view::<6, 6>(0, 0).into_owned()
}

/// Conic coefficients (working frame) of the constrained least-squares fit.
fn solve_in_frame(
    points: &[Point],
    frame: &Normalization,
    config: &FitConfig,
) -> Result<Vector6<f64>, FitError> {
    let s = scatter_matrix(points, frame);
    let (n_null, null_vec, max_ev) = null_directions(&s, config.singular_rel_tol);
    if !(max_ev.is_finite() && max_ev > 0.0) {
        return Err(FitError::DegenerateFit(DegenerateReason::SingularScatter));
    }

    if n_null > 1 {
        return Err(FitError::DegenerateFit(DegenerateReason::SingularScatter));
    }
    if let Some(v) = solve_gep_6x6(&s, &constraint_matrix(), config.eigen_rel_tol) {
        return Ok(v);
    }
    // Cholesky failed on a rank-deficient S. The single null direction is the
    // conic through every sample (five points in general position, or
    // noiseless samples of one curve).
    if n_null == 1 {
        tracing::trace!("scatter matrix not positive definite, using its null vector");
        return if ellipse_constraint(&null_vec) > 0.0 {
            Ok(null_vec)
        } else {
            Err(FitError::DegenerateFit(DegenerateReason::NotAnEllipse))
        };
    }
    Err(FitError::DegenerateFit(DegenerateReason::NoPositiveEigenvalue))
}

fn to_coeffs(v: &Vector6<f64>) -> ConicCoeffs {
    ConicCoeffs([v[0], v[1], v[2], v[3], v[4], v[5]])
}

/// Denormalize conic coefficients from normalized coordinates back to original.
///
/// If normalized coords are x' = s(x − mx), y' = s(y − my), then the conic
/// A'x'² + B'x'y' + C'y'² + D'x' + E'y' + F' = 0 transforms back via
/// substitution.
fn denormalize_conic(c: &Vector6<f64>, mx: f64, my: f64, s: f64) -> [f64; 6] {
    let [a_, b_, c_, d_, e_, f_] = [c[0], c[1], c[2], c[3], c[4], c[5]];
    let s2 = s * s;

    let a = a_ * s2;
    let b = b_ * s2;
    let c = c_ * s2;
    let d = -2.0 * a_ * s2 * mx - b_ * s2 * my + d_ * s;
    let e = -b_ * s2 * mx - 2.0 * c_ * s2 * my + e_ * s;
    let f =
        a_ * s2 * mx * mx + b_ * s2 * mx * my + c_ * s2 * my * my - d_ * s * mx - e_ * s * my + f_;

    [a, b, c, d, e, f]
}
