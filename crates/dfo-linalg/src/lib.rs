//! # dfo-linalg
//!
//! Dense linear-algebra subproblems consumed by the trust-region core:
//! bound- and linearly-constrained truncated conjugate gradients, the convex
//! piecewise-quadratic projector used for normal steps, geometry-improvement
//! searches on Lagrange polynomials, nonnegative least squares, and plane
//! rotations.
//!
//! Every solver works on displacements `d` from a base point `xopt` that is
//! assumed feasible for the bound constraints, and returns a step that keeps
//! `xopt + d` inside the bounds and `‖d‖` within the trust-region radius.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use dfo_core::Real;
use nalgebra::{DMatrix, DVector};

mod bvcs;
mod bvlag;
mod bvtcg;
mod cpqp;
mod givens;
mod lctcg;
mod nnls;

pub use bvcs::bvcs;
pub use bvlag::bvlag;
pub use bvtcg::bvtcg;
pub use cpqp::cpqp;
pub use givens::{givens, Axis};
pub use lctcg::lctcg;
pub use nnls::nnls;

/// Dynamically-sized column vector of `Real` values.
pub type Vector = DVector<Real>;

/// Dynamically-sized dense matrix of `Real` values.
pub type Matrix = DMatrix<Real>;

/// Clip `x` into the box `[xl, xu]` componentwise.
pub(crate) fn clip(x: &mut Vector, xl: &Vector, xu: &Vector) {
    for i in 0..x.len() {
        x[i] = x[i].max(xl[i]).min(xu[i]);
    }
}

/// Largest `t >= 0` such that `xopt + d + t * p` stays inside `[xl, xu]`,
/// together with the index of the first component to hit its bound, if any.
pub(crate) fn bound_step(
    xopt: &Vector,
    d: &Vector,
    p: &Vector,
    xl: &Vector,
    xu: &Vector,
) -> (Real, Option<usize>) {
    let mut tmax = Real::INFINITY;
    let mut hit = None;
    for i in 0..xopt.len() {
        let xi = xopt[i] + d[i];
        let t = if p[i] > 0.0 {
            (xu[i] - xi) / p[i]
        } else if p[i] < 0.0 {
            (xl[i] - xi) / p[i]
        } else {
            continue;
        };
        let t = t.max(0.0);
        if t < tmax {
            tmax = t;
            hit = Some(i);
        }
    }
    (tmax, hit)
}

/// Largest `t >= 0` such that `‖d + t * p‖ <= delta`.
///
/// Solves the quadratic `‖d‖² + 2 t d·p + t² ‖p‖² = delta²` for its
/// nonnegative root; returns zero when `p` vanishes or `d` already lies
/// outside the ball.
pub(crate) fn radius_step(d: &Vector, p: &Vector, delta: Real) -> Real {
    let dd = d.dot(d);
    let dp = d.dot(p);
    let pp = p.dot(p);
    let slack = delta * delta - dd;
    if pp <= 0.0 || slack <= 0.0 {
        return 0.0;
    }
    let disc = (dp * dp + pp * slack).sqrt();
    // Numerically stable root of t² pp + 2 t dp − slack = 0.
    if dp <= 0.0 {
        (disc - dp) / pp
    } else {
        slack / (disc + dp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_step_from_center() {
        let d = Vector::zeros(2);
        let p = Vector::from_column_slice(&[3.0, 4.0]);
        let t = radius_step(&d, &p, 10.0);
        assert!((t - 2.0).abs() < 1e-12);
    }

    #[test]
    fn bound_step_picks_binding_component() {
        let xopt = Vector::from_column_slice(&[0.0, 0.0]);
        let d = Vector::zeros(2);
        let p = Vector::from_column_slice(&[1.0, 2.0]);
        let xl = Vector::from_column_slice(&[-1.0, -1.0]);
        let xu = Vector::from_column_slice(&[5.0, 1.0]);
        let (t, hit) = bound_step(&xopt, &d, &p, &xl, &xu);
        assert!((t - 0.5).abs() < 1e-12);
        assert_eq!(hit, Some(1));
    }
}
