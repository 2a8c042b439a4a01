//! Bounded Levenberg-Marquardt nonlinear least squares.
//!
//! Minimizes `½ Σ r_i(x)²` over a box `lower ≤ x ≤ upper`:
//!
//! - Jacobian by forward differences (backward at an upper bound)
//! - Marquardt scaling: damping proportional to `diag(JᵀJ)`
//! - parameters sitting on a bound with the gradient pointing out of the box
//!   are held for that iteration; the step is solved for the rest and then
//!   projected back onto the box
//! - standard errors from `diag((JᵀJ)⁺) · SSR / (n - p)` at the solution
//!
//! Fixed parameters are the caller's business: only free parameters are passed
//! in, the residual closure re-inserts the fixed ones.

use nalgebra::{DMatrix, DVector};

use crate::math::ols::{pseudo_inverse_diagonal, solve_symmetric};

/// Relative finite-difference step (≈ √ε).
const FD_STEP: f64 = 1.5e-8;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative reduction of the cost below which the fit is converged.
    pub ftol: f64,
    /// Relative step size below which the fit is converged.
    pub xtol: f64,
    /// Infinity norm of the gradient below which the fit is converged.
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-10,
            gtol: 1e-14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmSolution {
    pub x: Vec<f64>,
    /// Standard errors of `x`; `NaN` when `n <= p`.
    pub stderr: Vec<f64>,
    /// Sum of squared residuals at `x`.
    pub ssr: f64,
    /// Number of residuals the fit was run on.
    pub n_residuals: usize,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LmError {
    /// Fewer residuals than free parameters.
    Underdetermined { n: usize, p: usize },
    /// The residuals are not finite at the starting point.
    NonFiniteStart,
    /// The Jacobian could not be evaluated.
    NonFiniteJacobian,
    NotConverged { iterations: usize },
}

impl std::fmt::Display for LmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LmError::Underdetermined { n, p } => {
                write!(f, "insufficient data: {n} points for {p} free parameters")
            }
            LmError::NonFiniteStart => write!(f, "model is not finite at the initial parameters"),
            LmError::NonFiniteJacobian => write!(f, "non-finite Jacobian during fit"),
            LmError::NotConverged { iterations } => {
                write!(f, "fit did not converge within {iterations} iterations")
            }
        }
    }
}

impl std::error::Error for LmError {}

/// Run bounded Levenberg-Marquardt starting at `x0`.
///
/// `x0` is clamped into `[lower, upper]` first. `residuals` must return the
/// same number of residuals for every parameter vector; non-finite residuals
/// mark a parameter vector as unusable.
pub fn levenberg_marquardt<F>(
    residuals: F,
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    opts: &LmOptions,
) -> Result<LmSolution, LmError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let p = x0.len();
    let mut x: Vec<f64> = x0
        .iter()
        .zip(lower.iter().zip(upper.iter()))
        .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
        .collect();

    let mut r = residuals(&x);
    let n = r.len();
    if n < p {
        return Err(LmError::Underdetermined { n, p });
    }
    let mut ssr = sum_sq(&r);
    if !ssr.is_finite() {
        return Err(LmError::NonFiniteStart);
    }

    if p == 0 {
        return Ok(LmSolution {
            x,
            stderr: Vec::new(),
            ssr,
            n_residuals: n,
            iterations: 0,
        });
    }

    let mut lambda = LAMBDA_INIT;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < opts.max_iterations {
        iterations += 1;

        let jac = jacobian(&residuals, &x, &r, lower, upper).ok_or(LmError::NonFiniteJacobian)?;
        let rv = DVector::from_column_slice(&r);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * rv;

        let active: Vec<usize> = (0..p)
            .filter(|&j| !pinned(x[j], grad[j], lower[j], upper[j]))
            .collect();
        if ssr == 0.0 || active.iter().all(|&j| grad[j].abs() <= opts.gtol) {
            converged = true;
            break;
        }

        let m = active.len();
        let rhs = DVector::from_iterator(m, active.iter().map(|&j| -grad[j]));
        let mut accepted = None;
        while lambda <= LAMBDA_MAX {
            let mut damped = DMatrix::from_fn(m, m, |a, b| jtj[(active[a], active[b])]);
            for (k, &j) in active.iter().enumerate() {
                damped[(k, k)] += lambda * jtj[(j, j)].max(1e-12);
            }
            let Some(delta) = solve_symmetric(&damped, &rhs) else {
                lambda *= 10.0;
                continue;
            };

            let mut x_new = x.clone();
            for (k, &j) in active.iter().enumerate() {
                x_new[j] = (x[j] + delta[k]).clamp(lower[j], upper[j]);
            }
            let r_new = residuals(&x_new);
            let ssr_new = sum_sq(&r_new);

            if ssr_new.is_finite() && ssr_new < ssr {
                lambda = (lambda / 10.0).max(LAMBDA_MIN);
                accepted = Some((x_new, r_new, ssr_new));
                break;
            }
            lambda *= 10.0;
        }

        let Some((x_new, r_new, ssr_new)) = accepted else {
            // No damping produces a decrease: we are at a minimum to working precision.
            converged = true;
            break;
        };

        let reduction = ssr - ssr_new;
        let step_small = x_new
            .iter()
            .zip(x.iter())
            .all(|(a, b)| (a - b).abs() <= opts.xtol * (b.abs() + opts.xtol));

        x = x_new;
        r = r_new;
        ssr = ssr_new;

        if reduction <= opts.ftol * ssr || step_small {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(LmError::NotConverged { iterations });
    }

    let stderr = standard_errors(&residuals, &x, &r, lower, upper, ssr);

    Ok(LmSolution {
        x,
        stderr,
        ssr,
        n_residuals: n,
        iterations,
    })
}

fn standard_errors<F>(
    residuals: &F,
    x: &[f64],
    r: &[f64],
    lower: &[f64],
    upper: &[f64],
    ssr: f64,
) -> Vec<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = r.len();
    let p = x.len();
    let nan = vec![f64::NAN; p];
    if n <= p {
        return nan;
    }
    let Some(jac) = jacobian(residuals, x, r, lower, upper) else {
        return nan;
    };
    let jtj = jac.transpose() * &jac;
    let Some(diag) = pseudo_inverse_diagonal(&jtj) else {
        return nan;
    };
    let sigma2 = ssr / (n - p) as f64;
    diag.iter().map(|d| (d.max(0.0) * sigma2).sqrt()).collect()
}

fn jacobian<F>(residuals: &F, x: &[f64], r0: &[f64], lower: &[f64], upper: &[f64]) -> Option<DMatrix<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = r0.len();
    let p = x.len();
    let mut jac = DMatrix::<f64>::zeros(n, p);
    let mut xh = x.to_vec();

    for j in 0..p {
        let mut h = FD_STEP * x[j].abs().max(1.0);
        if x[j] + h > upper[j] {
            h = -h;
        }
        if x[j] + h < lower[j] {
            // Box narrower than the step: fall back to whatever room is left.
            h = upper[j] - x[j];
            if h == 0.0 {
                continue;
            }
        }
        xh[j] = x[j] + h;
        let rh = residuals(&xh);
        xh[j] = x[j];
        if rh.len() != n {
            return None;
        }
        for i in 0..n {
            let d = (rh[i] - r0[i]) / h;
            if !d.is_finite() {
                return None;
            }
            jac[(i, j)] = d;
        }
    }

    Some(jac)
}

/// On a bound, with descent (`-grad`) leading out of the box.
fn pinned(x: f64, grad: f64, lower: f64, upper: f64) -> bool {
    (x <= lower && grad > 0.0) || (x >= upper && grad < 0.0)
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}
