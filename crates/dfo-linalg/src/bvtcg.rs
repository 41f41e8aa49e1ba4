//! Bound-constrained trust-region subproblem by truncated conjugate
//! gradients.
//!
//! Minimizes `q(d) = g·d + ½ d·H d` subject to `xl <= xopt + d <= xu` and
//! `‖d‖ <= delta`, with the Hessian available only through products. The
//! conjugate-gradient iteration is restarted in the reduced space whenever a
//! bound becomes active, and stops on the trust-region boundary.

use crate::{bound_step, radius_step, Vector};
use dfo_core::Real;

/// Minimize a quadratic over the intersection of a box and a ball.
///
/// * `xopt` — base point, feasible for the bounds.
/// * `gq` — gradient of the quadratic at `xopt`.
/// * `hessp` — product of the Hessian with an arbitrary vector.
/// * `xl`, `xu` — bound constraints on `xopt + d`.
/// * `delta` — trust-region radius.
///
/// Returns a step `d` with `q(d) <= q(0)`, `xopt + d` within the bounds and
/// `‖d‖ <= delta`.
pub fn bvtcg(
    xopt: &Vector,
    gq: &Vector,
    hessp: &dyn Fn(&Vector) -> Vector,
    xl: &Vector,
    xu: &Vector,
    delta: Real,
) -> Vector {
    let n = xopt.len();
    let mut d = Vector::zeros(n);
    let mut free = vec![true; n];
    // Components already sitting on a bound with the gradient pushing
    // outwards cannot move; fix them from the start. Infinite bounds are
    // excluded from the tolerance scale.
    let bscale = xl
        .iter()
        .chain(xu.iter())
        .filter(|v| v.is_finite())
        .fold(1.0_f64, |a, &b| a.max(b.abs()));
    let btol = 10.0 * Real::EPSILON * (n as Real) * bscale;
    for i in 0..n {
        if (xopt[i] - xl[i] <= btol && gq[i] >= 0.0) || (xu[i] - xopt[i] <= btol && gq[i] <= 0.0) {
            free[i] = false;
        }
    }

    let gtol = 1e-10 * gq.norm().max(1.0);
    let mut restarts = 0;
    'outer: while restarts <= n {
        restarts += 1;
        // Steepest-descent residual in the free subspace.
        let mut r = -(gq + hessp(&d));
        mask(&mut r, &free);
        if r.norm() <= gtol {
            break;
        }
        let mut p = r.clone();
        let mut rr = r.dot(&r);
        for _ in 0..2 * n {
            let mut hp = hessp(&p);
            mask(&mut hp, &free);
            let php = p.dot(&hp);
            let alpha_tr = radius_step(&d, &p, delta);
            let (alpha_bd, hit) = bound_step(xopt, &d, &p, xl, xu);
            let alpha_cg = if php > 0.0 { rr / php } else { Real::INFINITY };
            let alpha = alpha_cg.min(alpha_tr).min(alpha_bd);
            if !alpha.is_finite() || alpha <= 0.0 {
                break 'outer;
            }
            d.axpy(alpha, &p, 1.0);
            if alpha == alpha_tr && alpha < alpha_bd.min(alpha_cg) {
                // The trust-region boundary is reached; no further descent
                // is available within the ball.
                break 'outer;
            }
            if alpha == alpha_bd && alpha < alpha_cg {
                // A bound became active: pin the binding component exactly
                // and restart the iteration in the reduced space.
                if let Some(i) = hit {
                    d[i] = if p[i] > 0.0 { xu[i] - xopt[i] } else { xl[i] - xopt[i] };
                    free[i] = false;
                }
                continue 'outer;
            }
            if alpha_cg <= alpha_tr.min(alpha_bd) {
                r.axpy(-alpha, &hp, 1.0);
                mask(&mut r, &free);
                let rr_new = r.dot(&r);
                if rr_new.sqrt() <= gtol {
                    break 'outer;
                }
                let beta = rr_new / rr;
                rr = rr_new;
                p = &r + beta * &p;
                mask(&mut p, &free);
            } else {
                break 'outer;
            }
        }
        break;
    }
    d
}

fn mask(v: &mut Vector, free: &[bool]) {
    for (i, &f) in free.iter().enumerate() {
        if !f {
            v[i] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Matrix;

    fn quad(h: &Matrix, g: &Vector, d: &Vector) -> Real {
        g.dot(d) + 0.5 * d.dot(&(h * d))
    }

    #[test]
    fn interior_minimum_of_convex_quadratic() {
        // q(d) = g·d + ½‖d‖², minimum at d = -g, well inside box and ball.
        let n = 3;
        let xopt = Vector::zeros(n);
        let g = Vector::from_column_slice(&[1.0, -2.0, 0.5]);
        let h = Matrix::identity(n, n);
        let hp = |v: &Vector| v.clone();
        let xl = Vector::from_element(n, -10.0);
        let xu = Vector::from_element(n, 10.0);
        let d = bvtcg(&xopt, &g, &hp, &xl, &xu, 100.0);
        for i in 0..n {
            assert!((d[i] + g[i]).abs() < 1e-8, "d[{i}] = {}", d[i]);
        }
        assert!(quad(&h, &g, &d) < 0.0);
    }

    #[test]
    fn stops_on_trust_region_boundary() {
        let n = 2;
        let xopt = Vector::zeros(n);
        let g = Vector::from_column_slice(&[-1.0, 0.0]);
        let hp = |_: &Vector| Vector::zeros(2);
        let xl = Vector::from_element(n, -10.0);
        let xu = Vector::from_element(n, 10.0);
        let d = bvtcg(&xopt, &g, &hp, &xl, &xu, 1.5);
        assert!((d.norm() - 1.5).abs() < 1e-10);
        assert!(d[0] > 0.0);
    }

    #[test]
    fn respects_bounds() {
        let n = 2;
        let xopt = Vector::from_column_slice(&[0.5, 0.0]);
        let g = Vector::from_column_slice(&[-1.0, -1.0]);
        let hp = |v: &Vector| v.clone();
        let xl = Vector::from_element(n, -1.0);
        let xu = Vector::from_element(n, 1.0);
        let d = bvtcg(&xopt, &g, &hp, &xl, &xu, 10.0);
        for i in 0..n {
            let x = xopt[i] + d[i];
            assert!(x >= xl[i] - 1e-12 && x <= xu[i] + 1e-12, "x[{i}] = {x}");
        }
        // The first component is capped by its upper bound.
        assert!((xopt[0] + d[0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn never_increases_the_quadratic() {
        let n = 4;
        let xopt = Vector::zeros(n);
        let g = Vector::from_column_slice(&[3.0, -1.0, 2.0, 0.1]);
        let h = Matrix::from_diagonal(&Vector::from_column_slice(&[1.0, 4.0, 0.5, 2.0]));
        let hm = h.clone();
        let hp = move |v: &Vector| &hm * v;
        let xl = Vector::from_element(n, -0.4);
        let xu = Vector::from_element(n, 0.4);
        let d = bvtcg(&xopt, &g, &hp, &xl, &xu, 0.7);
        assert!(d.norm() <= 0.7 + 1e-12);
        assert!(quad(&h, &g, &d) <= 0.0);
    }
}
