//! Core conic and ellipse types with conversions.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point2, Rotation2, Vector2};
use serde::{Deserialize, Serialize};

/// 2D sample or world position.
pub type Point = Point2<f64>;

/// 2D displacement.
pub type Vector = Vector2<f64>;

// ── Error type ─────────────────────────────────────────────────────────────

/// Why a fit was rejected as degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    /// A sample coordinate was NaN or infinite.
    NonFiniteInput,
    /// The scatter matrix has more than one null direction (collinear,
    /// duplicated or clustered samples).
    SingularScatter,
    /// No eigenpair satisfies the ellipse constraint.
    NoPositiveEigenvalue,
    /// The constant coefficient F vanishes, so the conic cannot be
    /// normalized by it.
    VanishingConstant,
    /// 4AC − B² is not positive: the conic is not an ellipse.
    NotAnEllipse,
    /// A semi-axis radicand is non-positive or the result is not finite.
    InvalidAxes,
}

impl std::fmt::Display for DegenerateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NonFiniteInput => "non-finite input coordinate",
            Self::SingularScatter => "singular scatter matrix",
            Self::NoPositiveEigenvalue => "no positive eigenvalue",
            Self::VanishingConstant => "vanishing constant coefficient",
            Self::NotAnEllipse => "conic is not an ellipse",
            Self::InvalidAxes => "invalid semi-axes",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during ellipse fitting.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Too few points to determine a conic.
    InsufficientPoints {
        /// Required minimum number of points.
        needed: usize,
        /// Provided number of points.
        got: usize,
    },
    /// The samples do not determine a proper ellipse.
    DegenerateFit(DegenerateReason),
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::DegenerateFit(reason) => write!(f, "degenerate fit: {}", reason),
        }
    }
}

impl std::error::Error for FitError {}

// ── Configuration ──────────────────────────────────────────────────────────

/// Numerical knobs of the direct fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Shift samples to their centroid and scale to mean radius √2 before
    /// fitting.
    pub normalize: bool,
    /// Eigenvalues of the scatter matrix below this fraction of the largest
    /// one count as null directions.
    pub singular_rel_tol: f64,
    /// Eigenvalues of the constrained system must exceed this fraction of the
    /// largest magnitude to count as positive.
    pub eigen_rel_tol: f64,
    /// |F| below this fraction of the largest coefficient is treated as zero.
    pub f_rel_tol: f64,
    /// 4AC − B² below this fraction of the squared quadratic scale is
    /// treated as zero.
    pub discriminant_tol: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            singular_rel_tol: 1e-12,
            eigen_rel_tol: 1e-9,
            f_rel_tol: 1e-12,
            discriminant_tol: 1e-14,
        }
    }
}

/// Fitted ellipse together with its residual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Canonical ellipse parameters.
    pub ellipse: EllipseParams,
    /// RMS Sampson distance of the samples to the fitted ellipse.
    pub rms_residual: f64,
    /// Number of samples used.
    pub n_points: usize,
}

// ── Types ──────────────────────────────────────────────────────────────────

/// General conic: A x² + B xy + C y² + D x + E y + F = 0
/// Stored as [A, B, C, D, E, F].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicCoeffs(pub [f64; 6]);

/// Canonical ellipse parameters.
///
/// `semi_major` is the semi-axis along `rotation`, `semi_minor` the one
/// perpendicular to it. Fits always return `semi_major >= semi_minor`; an
/// edit session scaling the axes independently may invert that ordering
/// without renaming the axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseParams {
    /// Ellipse center.
    pub center: Point,
    /// Semi-axis length along the rotation direction.
    pub semi_major: f64,
    /// Semi-axis length perpendicular to the rotation direction.
    pub semi_minor: f64,
    /// Angle of the `semi_major` axis from +x, in radians, within [0, π).
    pub rotation: f64,
}

impl ConicCoeffs {
    /// Evaluate the conic polynomial at a point.
    pub fn algebraic_distance(&self, x: f64, y: f64) -> f64 {
        let [a, b, c, d, e, f] = self.0;
        a * x * x + b * x * y + c * y * y + d * x + e * y + f
    }

    /// Check whether the quadratic part describes an ellipse (B² − 4AC < 0).
    pub fn is_ellipse(&self) -> bool {
        let [a, b, c, ..] = self.0;
        b * b - 4.0 * a * c < 0.0
    }

    /// Divide all coefficients by F.
    pub fn normalized_by_constant(&self, config: &FitConfig) -> Result<Self, FitError> {
        let [.., f] = self.0;
        let scale = self.0.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if !scale.is_finite() || f.abs() <= config.f_rel_tol * scale || f == 0.0 {
            return Err(FitError::DegenerateFit(DegenerateReason::VanishingConstant));
        }
        Ok(Self(self.0.map(|v| v / f)))
    }

    /// Convert to canonical ellipse parameters.
    pub fn to_ellipse(&self, config: &FitConfig) -> Result<EllipseParams, FitError> {
        conic_to_ellipse(self, config)
    }
}

impl EllipseParams {
    /// Build from raw values; the rotation is brought into [0, π).
    pub fn new(center: Point, semi_major: f64, semi_minor: f64, rotation: f64) -> Self {
        Self {
            center,
            semi_major,
            semi_minor,
            rotation: normalize_rotation(rotation),
        }
    }

    /// Check that all fields are finite and both axes are positive.
    pub fn is_valid(&self) -> bool {
        self.center.x.is_finite()
            && self.center.y.is_finite()
            && self.semi_major.is_finite()
            && self.semi_minor.is_finite()
            && self.rotation.is_finite()
            && self.semi_major > 0.0
            && self.semi_minor > 0.0
    }

    /// Unit vector along the `semi_major` axis.
    pub fn major_axis_dir(&self) -> Vector {
        Vector::new(self.rotation.cos(), self.rotation.sin())
    }

    /// Unit vector along the `semi_minor` axis.
    pub fn minor_axis_dir(&self) -> Vector {
        Vector::new(-self.rotation.sin(), self.rotation.cos())
    }

    /// Express `p` in the ellipse frame (origin at the center, x along the
    /// `semi_major` axis).
    pub fn to_local(&self, p: &Point) -> Vector {
        Rotation2::new(-self.rotation) * (p - self.center)
    }

    /// Inside-or-on test: x²/a² + y²/b² ≤ 1 in the ellipse frame.
    pub fn contains(&self, p: &Point) -> bool {
        let local = self.to_local(p);
        ellipse_quadratic(local, self.semi_major, self.semi_minor) <= 1.0
    }

    /// Copy shifted by `v`.
    pub fn translated(&self, v: &Vector) -> Self {
        Self {
            center: self.center + v,
            ..*self
        }
    }

    /// Copy rotated by `delta` radians about its center.
    pub fn rotated(&self, delta: f64) -> Self {
        Self {
            rotation: normalize_rotation(self.rotation + delta),
            ..*self
        }
    }

    /// Copy with replaced semi-axes.
    pub fn with_axes(&self, semi_major: f64, semi_minor: f64) -> Self {
        Self {
            semi_major,
            semi_minor,
            ..*self
        }
    }

    /// Convert back to conic coefficients.
    pub fn to_conic(&self) -> ConicCoeffs {
        ellipse_to_conic(self)
    }

    /// Sample `n` points on the ellipse boundary.
    pub fn sample_points(&self, n: usize) -> Vec<Point> {
        let cos_a = self.rotation.cos();
        let sin_a = self.rotation.sin();
        (0..n)
            .map(|i| {
                let t = 2.0 * PI * (i as f64) / (n as f64);
                let px = self.semi_major * t.cos();
                let py = self.semi_minor * t.sin();
                Point::new(
                    self.center.x + cos_a * px - sin_a * py,
                    self.center.y + sin_a * px + cos_a * py,
                )
            })
            .collect()
    }

    /// Approximate geometric distance from a point to the ellipse boundary.
    /// Uses the algebraic distance divided by the gradient magnitude as a
    /// first-order approximation (Sampson distance).
    pub fn sampson_distance(&self, p: &Point) -> f64 {
        let c = self.to_conic();
        let [ca, cb, cc, cd, ce, _cf] = c.0;
        let (x, y) = (p.x, p.y);
        let alg = c.algebraic_distance(x, y);
        let gx = 2.0 * ca * x + cb * y + cd;
        let gy = cb * x + 2.0 * cc * y + ce;
        let grad_mag_sq = gx * gx + gy * gy;
        if grad_mag_sq < 1e-30 {
            return alg.abs();
        }
        alg.abs() / grad_mag_sq.sqrt()
    }
}

/// x²/a² + y²/b² for a point already in the ellipse frame.
pub(crate) fn ellipse_quadratic(local: Vector, a: f64, b: f64) -> f64 {
    local.x * local.x / (a * a) + local.y * local.y / (b * b)
}

// ── Conversion: conic ↔ ellipse ────────────────────────────────────────────

/// Convert general conic coefficients to canonical ellipse parameters.
///
/// The conic is first divided through by F so that the canonical formulas
/// can assume a unit constant term.
pub fn conic_to_ellipse(c: &ConicCoeffs, config: &FitConfig) -> Result<EllipseParams, FitError> {
    let degenerate = FitError::DegenerateFit;
    let [a, b, c_coeff, d, e, _] = c.normalized_by_constant(config)?.0;

    let quad_scale = a.abs().max(b.abs()).max(c_coeff.abs());
    let denom = 4.0 * a * c_coeff - b * b;
    if !(denom > config.discriminant_tol * quad_scale * quad_scale) {
        return Err(degenerate(DegenerateReason::NotAnEllipse));
    }

    let cx = (b * e - 2.0 * c_coeff * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    // Direction of the eigenvector with the larger eigenvalue of the
    // quadratic part; the first semi-axis below lies along it.
    let angle = 0.5 * b.atan2(a - c_coeff);

    let numerator = 2.0 * (a * cx * cx + c_coeff * cy * cy + b * cx * cy - 1.0);
    let root = ((a - c_coeff).powi(2) + b * b).sqrt();
    let r_first = numerator / (a + c_coeff + root);
    let r_second = numerator / (a + c_coeff - root);
    if !(r_first > 0.0 && r_second > 0.0) {
        return Err(degenerate(DegenerateReason::InvalidAxes));
    }

    let semi_a = r_first.sqrt();
    let semi_b = r_second.sqrt();

    // Canonicalize so that semi_major >= semi_minor, adjusting angle accordingly
    let (semi_major, semi_minor, angle) = if semi_a >= semi_b {
        (semi_a, semi_b, angle)
    } else {
        (semi_b, semi_a, angle + FRAC_PI_2)
    };

    let ellipse = EllipseParams::new(Point::new(cx, cy), semi_major, semi_minor, angle);
    if !ellipse.is_valid() {
        return Err(degenerate(DegenerateReason::InvalidAxes));
    }
    Ok(ellipse)
}

/// Convert canonical ellipse parameters to general conic coefficients.
pub fn ellipse_to_conic(e: &EllipseParams) -> ConicCoeffs {
    let cos_a = e.rotation.cos();
    let sin_a = e.rotation.sin();
    let a2 = e.semi_major * e.semi_major;
    let b2 = e.semi_minor * e.semi_minor;
    let (x0, y0) = (e.center.x, e.center.y);

    let ca = cos_a * cos_a / a2 + sin_a * sin_a / b2;
    let cb = 2.0 * cos_a * sin_a * (1.0 / a2 - 1.0 / b2);
    let cc = sin_a * sin_a / a2 + cos_a * cos_a / b2;
    let cd = -2.0 * ca * x0 - cb * y0;
    let ce = -cb * x0 - 2.0 * cc * y0;
    let cf = ca * x0 * x0 + cb * x0 * y0 + cc * y0 * y0 - 1.0;

    ConicCoeffs([ca, cb, cc, cd, ce, cf])
}

/// Bring an angle into [0, π).
pub fn normalize_rotation(angle: f64) -> f64 {
    let r = angle.rem_euclid(PI);
    // rem_euclid can round tiny negative inputs up to exactly π
    if r >= PI {
        0.0
    } else {
        r
    }
}
