//! Generalized eigenvalue solver for the 6×6 constrained conic system.

use nalgebra::{Cholesky, Matrix6, SymmetricEigen, Vector6};

/// Solve S⁻¹ C v = λ v and return the eigenvector of the smallest strictly
/// positive eigenvalue.
///
/// S⁻¹ C is not symmetric, but with S = L Lᵀ it is similar to the symmetric
/// matrix L⁻¹ C L⁻ᵀ: for an eigenvector w of the latter, v = L⁻ᵀ w is an
/// eigenvector of S⁻¹ C with the same eigenvalue. All eigenvalues are
/// therefore real, and because C has inertia (1, 2, 3) exactly one of them is
/// positive. The three structural zeros coming from the null space of C show
/// up as roundoff-sized values of either sign, so "positive" means above
/// `rel_tol` times the largest magnitude.
///
/// Returns `None` if S is not positive definite or no eigenvalue qualifies.
pub(crate) fn solve_gep_6x6(
    s: &Matrix6<f64>,
    c: &Matrix6<f64>,
    rel_tol: f64,
) -> Option<Vector6<f64>> {
    let chol = Cholesky::new(*s)?;
    let l_inv = chol.l().try_inverse()?;
    let m = l_inv * c * l_inv.transpose();
    // Symmetric in exact arithmetic; remove the roundoff asymmetry.
    let m = (m + m.transpose()) * 0.5;

    let eig = SymmetricEigen::new(m);
    let max_abs = eig
        .eigenvalues
        .iter()
        .fold(0.0f64, |acc, ev| acc.max(ev.abs()));
    if !max_abs.is_finite() || max_abs == 0.0 {
        return None;
    }
    let threshold = rel_tol * max_abs;

    let mut best: Option<(f64, usize)> = None;
    for (i, &ev) in eig.eigenvalues.iter().enumerate() {
        if ev > threshold && best.map_or(true, |(b, _)| ev < b) {
            best = Some((ev, i));
        }
    }
    let (ev, idx) = best?;
    tracing::trace!("selected constrained eigenvalue {:.3e} (max |λ| = {:.3e})", ev, max_abs);

    let w = eig.eigenvectors.column(idx).into_owned();
    let v = l_inv.transpose() * w;

    // vᵀ C v = λ vᵀ S v > 0 for the selected pair; a failure here means the
    // decomposition lost too much precision to trust.
    if ellipse_constraint(&v) <= 0.0 {
        return None;
    }
    Some(v)
}

/// Eigenvector of the smallest eigenvalue of a symmetric matrix, together
/// with the number of eigenvalues at or below `rel_tol` times the largest.
pub(crate) fn null_directions(s: &Matrix6<f64>, rel_tol: f64) -> (usize, Vector6<f64>, f64) {
    let eig = SymmetricEigen::new(*s);
    let max_ev = eig.eigenvalues.max();
    let threshold = rel_tol * max_ev;

    let mut count = 0;
    let mut min_idx = 0;
    for (i, &ev) in eig.eigenvalues.iter().enumerate() {
        if ev <= threshold {
            count += 1;
        }
        if ev < eig.eigenvalues[min_idx] {
            min_idx = i;
        }
    }
    (count, eig.eigenvectors.column(min_idx).into_owned(), max_ev)
}

/// 4AC − B² for coefficient vector [A, B, C, …].
pub(crate) fn ellipse_constraint(v: &Vector6<f64>) -> f64 {
    4.0 * v[0] * v[2] - v[1] * v[1]
}

/// Constraint matrix encoding 4AC − B² as vᵀ C v.
pub(crate) fn constraint_matrix() -> Matrix6<f64> {
    let mut c = Matrix6::zeros();
    c[(0, 2)] = 2.0;
    c[(2, 0)] = 2.0;
    c[(1, 1)] = -1.0;
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constraint_matrix_matches_discriminant() {
        let v = Vector6::new(1.5, 0.4, 2.0, -3.0, 0.7, 1.0);
        let c = constraint_matrix();
        let quad = (v.transpose() * c * v)[(0, 0)];
        assert_relative_eq!(quad, ellipse_constraint(&v), epsilon = 1e-12);
    }

    #[test]
    fn gep_eigenvector_satisfies_generalized_equation() {
        // Scatter of a well-conditioned random-ish design.
        let rows = [
            [0.9, 0.3, -0.2, 0.5, 0.1, 1.0],
            [-0.4, 0.8, 0.6, -0.3, 0.7, 1.0],
            [0.2, -0.9, 0.4, 0.8, -0.5, 1.0],
            [1.1, 0.1, 0.9, -0.6, -0.2, 1.0],
            [-0.7, -0.4, 0.3, 0.2, 0.9, 1.0],
            [0.5, 0.6, -0.8, -0.9, 0.3, 1.0],
            [0.3, -0.2, 1.2, 0.4, -0.8, 1.0],
        ];
        let mut s = Matrix6::zeros();
        for r in rows {
            let v = Vector6::from_row_slice(&r);
            s += v * v.transpose();
        }
        let c = constraint_matrix();
        let v = solve_gep_6x6(&s, &c, 1e-9).expect("positive eigenpair exists");

        // C v = λ S v with λ = vᵀCv / vᵀSv
        let cv = c * v;
        let sv = s * v;
        let lambda = v.dot(&cv) / v.dot(&sv);
        assert!(lambda > 0.0);
        for i in 0..6 {
            assert_relative_eq!(cv[i], lambda * sv[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn singular_scatter_has_no_cholesky_solution() {
        let v = Vector6::new(1.0, 0.0, 1.0, 0.0, 0.0, 1.0);
        let s = v * v.transpose();
        assert!(solve_gep_6x6(&s, &constraint_matrix(), 1e-9).is_none());
        let (count, _, _) = null_directions(&s, 1e-12);
        assert_eq!(count, 5);
    }
}
