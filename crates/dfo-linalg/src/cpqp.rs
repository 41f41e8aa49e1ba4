//! Convex piecewise-quadratic penalty minimization in a box and a ball.
//!
//! Computes the normal step of a composite-step method: it reduces the
//! violations of the linearized constraints
//!
//! `F(d) = ½ ‖max(0, A_ub (xopt + d) − b_ub)‖² + ½ ‖A_eq (xopt + d) − b_eq‖²`
//!
//! subject to `xl <= xopt + d <= xu` and `‖d‖ <= delta`, by a projected
//! gradient iteration with monotone backtracking. The objective is convex
//! with a piecewise-linear gradient, so a Lipschitz step size with an Armijo
//! safeguard converges without curvature information.

use crate::{clip, Matrix, Vector};
use dfo_core::Real;

/// Minimize the squared violation of linearized constraints over the
/// intersection of a box and a ball centered at the origin of steps.
#[allow(clippy::too_many_arguments)]
pub fn cpqp(
    xopt: &Vector,
    aub: &Matrix,
    bub: &Vector,
    aeq: &Matrix,
    beq: &Vector,
    xl: &Vector,
    xu: &Vector,
    delta: Real,
) -> Vector {
    let n = xopt.len();
    let mut d = Vector::zeros(n);
    if aub.nrows() + aeq.nrows() == 0 || delta <= 0.0 {
        return d;
    }
    let rub = aub * xopt - bub;
    let req = aeq * xopt - beq;

    // Lipschitz constant of the gradient: ‖A_ub‖² + ‖A_eq‖² in Frobenius
    // norm bounds the spectral norms from above.
    let lip = aub.norm_squared() + aeq.norm_squared();
    if lip <= 0.0 {
        return d;
    }
    let step0 = 1.0 / lip;

    let value = |d: &Vector| -> Real {
        let vub = (&rub + aub * d).map(|v| v.max(0.0));
        let veq = &req + aeq * d;
        0.5 * (vub.norm_squared() + veq.norm_squared())
    };
    let gradient = |d: &Vector| -> Vector {
        let vub = (&rub + aub * d).map(|v| v.max(0.0));
        let veq = &req + aeq * d;
        aub.transpose() * vub + aeq.transpose() * veq
    };
    let project = |d: &mut Vector| {
        // Alternate clipping to the box and shrinking into the ball; two
        // passes leave the iterate inside both sets for feasible boxes that
        // contain the origin of steps.
        for _ in 0..2 {
            let mut x = xopt + &*d;
            clip(&mut x, xl, xu);
            *d = x - xopt;
            let nrm = d.norm();
            if nrm > delta {
                *d *= delta / nrm;
            }
        }
    };

    let mut fval = value(&d);
    let ftol = 10.0 * Real::EPSILON * fval.max(1.0);
    for _ in 0..100 {
        let g = gradient(&d);
        let mut t = step0;
        let mut improved = false;
        // Armijo backtracking on the projected-gradient arc.
        for _ in 0..30 {
            let mut trial = &d - t * &g;
            project(&mut trial);
            let ftrial = value(&trial);
            let decrease = fval - ftrial;
            let gap = (&trial - &d).norm_squared();
            if decrease >= 1e-4 * gap / t.max(Real::EPSILON) {
                if decrease > ftol {
                    improved = true;
                }
                d = trial;
                fval = ftrial;
                break;
            }
            t *= 0.5;
        }
        if !improved || fval <= ftol {
            break;
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_equality_violation_when_reachable() {
        // A_eq = [1 1], b_eq = 1, xopt = 0: the violation vanishes on the
        // line d0 + d1 = 1, reachable within the ball.
        let n = 2;
        let xopt = Vector::zeros(n);
        let aub = Matrix::zeros(0, n);
        let bub = Vector::zeros(0);
        let aeq = Matrix::from_row_slice(1, n, &[1.0, 1.0]);
        let beq = Vector::from_column_slice(&[1.0]);
        let xl = Vector::from_element(n, -10.0);
        let xu = Vector::from_element(n, 10.0);
        let d = cpqp(&xopt, &aub, &bub, &aeq, &beq, &xl, &xu, 2.0);
        assert!((d[0] + d[1] - 1.0).abs() < 1e-6, "residual = {}", d[0] + d[1] - 1.0);
        assert!(d.norm() <= 2.0 + 1e-12);
    }

    #[test]
    fn reduces_inequality_violation_within_radius() {
        // -d0 - d1 <= -1 violated at the origin; a short radius limits how
        // much of the violation can be removed, but it must shrink.
        let n = 2;
        let xopt = Vector::zeros(n);
        let aub = Matrix::from_row_slice(1, n, &[-1.0, -1.0]);
        let bub = Vector::from_column_slice(&[-1.0]);
        let aeq = Matrix::zeros(0, n);
        let beq = Vector::zeros(0);
        let xl = Vector::from_element(n, -10.0);
        let xu = Vector::from_element(n, 10.0);
        let d = cpqp(&xopt, &aub, &bub, &aeq, &beq, &xl, &xu, 0.2);
        let before: Real = 1.0;
        let after = (-d[0] - d[1] + 1.0).max(0.0);
        assert!(after < before);
        assert!(d.norm() <= 0.2 + 1e-12);
    }

    #[test]
    fn satisfied_constraints_yield_zero_step() {
        let n = 2;
        let xopt = Vector::zeros(n);
        let aub = Matrix::from_row_slice(1, n, &[1.0, 0.0]);
        let bub = Vector::from_column_slice(&[5.0]);
        let aeq = Matrix::zeros(0, n);
        let beq = Vector::zeros(0);
        let xl = Vector::from_element(n, -1.0);
        let xu = Vector::from_element(n, 1.0);
        let d = cpqp(&xopt, &aub, &bub, &aeq, &beq, &xl, &xu, 1.0);
        assert!(d.norm() < 1e-12);
    }

    #[test]
    fn respects_the_box() {
        let n = 2;
        let xopt = Vector::from_column_slice(&[0.4, 0.0]);
        let aub = Matrix::zeros(0, n);
        let bub = Vector::zeros(0);
        let aeq = Matrix::from_row_slice(1, n, &[1.0, 0.0]);
        let beq = Vector::from_column_slice(&[5.0]);
        let xl = Vector::from_element(n, -0.5);
        let xu = Vector::from_element(n, 0.5);
        let d = cpqp(&xopt, &aub, &bub, &aeq, &beq, &xl, &xu, 3.0);
        let x = &xopt + &d;
        assert!(x[0] <= 0.5 + 1e-12);
        assert!(x[1].abs() <= 0.5 + 1e-12);
        // Moves towards the unreachable target as far as the box allows.
        assert!((x[0] - 0.5).abs() < 1e-6);
    }
}
