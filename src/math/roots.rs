//! Bracketed Newton root finding for monotone functions.
//!
//! The force models are defined implicitly (distance as a function of force),
//! so every force prediction needs a root solve. The solver combines Newton
//! steps with bisection: Newton is taken only when it stays inside the current
//! bracket and shrinks the step fast enough, otherwise the bracket is halved.

/// Find `x` in `[lo, hi]` with `f(x) = 0` for an increasing `f`.
///
/// `f` returns `(value, derivative)`. Roots outside the bracket are clamped to
/// the nearest end. Non-finite evaluations inside the bracket are treated as
/// "too far right" and shrink the bracket from above.
///
/// Returns `None` when either bracket end evaluates to a non-finite value.
pub fn solve_increasing<F>(f: F, lo: f64, hi: f64, tol: f64, max_iter: usize) -> Option<f64>
where
    F: Fn(f64) -> (f64, f64),
{
    if !(lo.is_finite() && hi.is_finite() && hi > lo) {
        return None;
    }

    let (f_lo, _) = f(lo);
    let (f_hi, _) = f(hi);
    if !(f_lo.is_finite() && f_hi.is_finite()) {
        return None;
    }
    if f_lo >= 0.0 {
        return Some(lo);
    }
    if f_hi <= 0.0 {
        return Some(hi);
    }

    let mut lo = lo;
    let mut hi = hi;
    let mut x = 0.5 * (lo + hi);
    let mut dx_old = hi - lo;
    let mut dx = dx_old;

    for _ in 0..max_iter {
        let (fx, dfx) = f(x);
        if !fx.is_finite() {
            hi = x;
            x = 0.5 * (lo + hi);
            continue;
        }
        if fx == 0.0 {
            return Some(x);
        }
        if fx < 0.0 {
            lo = x;
        } else {
            hi = x;
        }

        let newton = if dfx.is_finite() && dfx > 0.0 {
            let step = fx / dfx;
            let candidate = x - step;
            let inside = candidate > lo && candidate < hi;
            let fast = (2.0 * fx).abs() <= (dx_old * dfx).abs();
            (inside && fast).then_some(step)
        } else {
            None
        };

        dx_old = dx;
        match newton {
            Some(step) => {
                dx = step;
                x -= step;
            }
            None => {
                dx = 0.5 * (hi - lo);
                x = lo + dx;
            }
        }

        if dx.abs() <= tol || hi - lo <= tol {
            return Some(x);
        }
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cube_root() {
        let root = solve_increasing(|x| (x * x * x - 27.0, 3.0 * x * x), 0.0, 10.0, 1e-14, 100).unwrap();
        assert!((root - 3.0).abs() < 1e-12, "got {root}");
    }

    #[test]
    fn clamps_to_bracket_ends() {
        let below = solve_increasing(|x| (x + 5.0, 1.0), 0.0, 1.0, 1e-12, 50).unwrap();
        assert_eq!(below, 0.0);
        let above = solve_increasing(|x| (x - 5.0, 1.0), 0.0, 1.0, 1e-12, 50).unwrap();
        assert_eq!(above, 1.0);
    }

    #[test]
    fn survives_non_finite_interior() {
        // Undefined above 2.0; root at 1.5.
        let f = |x: f64| {
            if x > 2.0 && x < 9.0 {
                (f64::NAN, f64::NAN)
            } else {
                (x - 1.5, 1.0)
            }
        };
        let root = solve_increasing(f, 0.0, 10.0, 1e-12, 200).unwrap();
        assert!((root - 1.5).abs() < 1e-9, "got {root}");
    }

    #[test]
    fn rejects_invalid_bracket() {
        assert!(solve_increasing(|x| (x, 1.0), 1.0, 1.0, 1e-12, 10).is_none());
        assert!(solve_increasing(|_| (f64::NAN, 1.0), 0.0, 1.0, 1e-12, 10).is_none());
    }
}
