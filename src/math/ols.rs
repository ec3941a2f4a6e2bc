//! Least-squares linear algebra for the nonlinear fitter.
//!
//! Each Levenberg–Marquardt iteration solves a small damped linear problem:
//!
//! ```text
//! minimize ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! where `J` is the σ-weighted Jacobian, `r` the σ-weighted residual and `D` a
//! diagonal scaling. We stack it as one tall least-squares system
//! `[J; √λ D] δ = [-r; 0]` and solve it with SVD rather than forming the
//! normal equations, which squares the condition number.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Levenberg–Marquardt step for damping `lambda` and diagonal scaling `scale`.
pub fn damped_step(
    jacobian: &DMatrix<f64>,
    residual: &DVector<f64>,
    lambda: f64,
    scale: &DVector<f64>,
) -> Option<DVector<f64>> {
    let (n, p) = jacobian.shape();
    let mut a = DMatrix::<f64>::zeros(n + p, p);
    let mut b = DVector::<f64>::zeros(n + p);

    a.rows_mut(0, n).copy_from(jacobian);
    b.rows_mut(0, n).copy_from(&(-residual));

    let sl = lambda.sqrt();
    for j in 0..p {
        a[(n + j, j)] = sl * scale[j];
    }

    solve_least_squares(&a, &b)
}

/// Pseudo-inverse of `JᵀJ` computed from the SVD of `J`.
///
/// Singular values below `ε · max(n, p) · s_max` are treated as zero, so
/// directions the data cannot constrain get zero (not infinite) variance.
pub fn jtj_pseudo_inverse(jacobian: &DMatrix<f64>) -> DMatrix<f64> {
    let (n, p) = jacobian.shape();
    let svd = jacobian.clone().svd(false, true);
    let mut out = DMatrix::<f64>::zeros(p, p);
    let Some(v_t) = svd.v_t else {
        return out;
    };

    let s_max = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let threshold = f64::EPSILON * n.max(p) as f64 * s_max;
    for (k, &s) in svd.singular_values.iter().enumerate() {
        if s <= threshold || s == 0.0 {
            continue;
        }
        let v = v_t.row(k).transpose();
        out += (&v * v.transpose()) / (s * s);
    }
    out
}
