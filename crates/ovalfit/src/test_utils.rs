//! Shared test utilities for fitting and editing tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::conic::{EllipseParams, Point};

/// Reference ellipse used across the unit tests.
pub(crate) fn make_test_ellipse() -> EllipseParams {
    EllipseParams::new(Point::new(100.0, 80.0), 30.0, 15.0, 0.3)
}

/// Sample `n` boundary points and perturb both coordinates with Gaussian
/// noise of standard deviation `sigma` (Box–Muller, seeded).
pub(crate) fn sample_with_noise(e: &EllipseParams, n: usize, sigma: f64, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut gauss = || {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    };
    e.sample_points(n)
        .into_iter()
        .map(|p| Point::new(p.x + sigma * gauss(), p.y + sigma * gauss()))
        .collect()
}

/// Smallest difference between two orientations, modulo π.
pub(crate) fn angle_diff_mod_pi(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(PI);
    d.min(PI - d)
}
