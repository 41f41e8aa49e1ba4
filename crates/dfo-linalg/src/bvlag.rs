//! Geometry-improvement search along chords of the interpolation set.
//!
//! Seeks a step `d` from the best interpolation point that gives a large
//! modulus of a designated Lagrange polynomial, by searching the lines that
//! join the best point to every other interpolation point. Along such a
//! chord the polynomial is a univariate quadratic fixed by its values at the
//! two points and its slope at the base, so each line search is closed form.

use crate::{Matrix, Vector};
use dfo_core::Real;

/// Maximize the modulus of the `klag`-th Lagrange polynomial along the
/// chords of the interpolation set.
///
/// * `xpt` — interpolation point displacements, one per row.
/// * `kopt` — index of the base (best) point.
/// * `klag` — index of the polynomial, and of the point to be replaced.
/// * `glag` — gradient of the polynomial at the base point.
/// * `xl`, `xu` — bounds on the displacements.
/// * `delta` — trust-region radius for the step.
/// * `alpha` — diagonal coefficient of the denominator of the updating
///   formula associated with `klag`, used to weigh candidate steps.
///
/// Returns the selected step from the base point.
#[allow(clippy::too_many_arguments)]
pub fn bvlag(
    xpt: &Matrix,
    kopt: usize,
    klag: usize,
    glag: &Vector,
    xl: &Vector,
    xu: &Vector,
    delta: Real,
    alpha: Real,
) -> Vector {
    let (npt, n) = xpt.shape();
    let xopt = xpt.row(kopt).transpose();
    let mut best_step = Vector::zeros(n);
    let mut best_score = -1.0_f64;
    for k in 0..npt {
        if k == kopt {
            continue;
        }
        let s = xpt.row(k).transpose() - &xopt;
        let distsq = s.norm_squared();
        if distsq <= Real::EPSILON * delta * delta {
            continue;
        }
        // The polynomial along the chord is a*t² + b*t, anchored by its
        // slope at the base point and its value at the far point.
        let b = glag.dot(&s);
        let a = if k == klag { 1.0 } else { 0.0 } - b;

        // Admissible range of t from the trust region and the bounds.
        let mut thi = delta / distsq.sqrt();
        let mut tlo = -thi;
        for i in 0..n {
            if s[i] > 0.0 {
                thi = thi.min((xu[i] - xopt[i]) / s[i]);
                tlo = tlo.max((xl[i] - xopt[i]) / s[i]);
            } else if s[i] < 0.0 {
                thi = thi.min((xl[i] - xopt[i]) / s[i]);
                tlo = tlo.max((xu[i] - xopt[i]) / s[i]);
            }
        }
        if thi < tlo {
            continue;
        }

        let mut consider = |t: Real| {
            let lam = (a * t + b) * t;
            let wiggle = t * (1.0 - t) * distsq;
            let score = lam * lam * (lam * lam + 0.5 * alpha.abs() * wiggle * wiggle);
            if score > best_score {
                best_score = score;
                best_step = t * &s;
            }
        };
        consider(tlo);
        consider(thi);
        if a != 0.0 {
            let tv = -b / (2.0 * a);
            if tv > tlo && tv < thi {
                consider(tv);
            }
        }
    }
    // Guard against roundoff pushing the trial outside the box.
    for i in 0..n {
        best_step[i] = best_step[i].max(xl[i] - xopt[i]).min(xu[i] - xopt[i]);
    }
    best_step
}
