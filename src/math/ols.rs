//! Small dense linear solves used by the nonlinear fitter.
//!
//! Every Levenberg-Marquardt iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ D) δ = -Jᵀr
//! ```
//!
//! for at most ten parameters. The matrix is symmetric positive definite when
//! the damping is positive, so Cholesky is tried first; SVD is the fallback
//! for the nearly singular systems produced by poorly identified parameters.
//! (Nalgebra's `QR::solve` is intended for square systems and will panic for
//! non-square matrices, so the rectangular case always goes through SVD.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-14, 1e-12, 1e-10] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `a · x = b` for a symmetric positive (semi-)definite `a`.
pub fn solve_symmetric(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    solve_least_squares(a, b)
}

/// Diagonal of the Moore-Penrose pseudo-inverse of a symmetric matrix.
///
/// Used for parameter variances: `diag((JᵀJ)⁺)`. Singular directions are
/// dropped instead of producing infinities.
pub fn pseudo_inverse_diagonal(a: &DMatrix<f64>) -> Option<Vec<f64>> {
    let n = a.nrows();
    if n == 0 {
        return Some(Vec::new());
    }
    let svd = a.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let eps = (max_sv * n as f64 * f64::EPSILON).max(f64::MIN_POSITIVE);
    let pinv = svd.pseudo_inverse(eps).ok()?;
    let diag: Vec<f64> = (0..n).map(|i| pinv[(i, i)]).collect();
    if diag.iter().all(|v| v.is_finite()) {
        Some(diag)
    } else {
        None
    }
}
