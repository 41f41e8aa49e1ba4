//! Nonnegative least squares with a free tail.
//!
//! Solves `min ‖A x − b‖₂` subject to `x[0..mineq] >= 0`, the remaining
//! components being unconstrained, by the Lawson–Hanson active-set method.
//! The unconstrained tail is kept in the passive set permanently.

use crate::{Matrix, Vector};
use dfo_core::Real;

/// Solve `min ‖A x − b‖₂` subject to `x[i] >= 0` for `i < mineq`.
///
/// Components with index at least `mineq` are unconstrained. The method is
/// the classical active-set iteration, with each passive-set least-squares
/// solve performed by a singular value decomposition so that rank-deficient
/// subproblems are handled by the pseudo-inverse.
pub fn nnls(a: &Matrix, b: &Vector, mineq: usize) -> Vector {
    let n = a.ncols();
    let mineq = mineq.min(n);
    let mut x = Vector::zeros(n);
    if n == 0 {
        return x;
    }
    let amax = a.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
    let tol = 10.0 * Real::EPSILON * (a.nrows().max(n) as Real) * amax.max(1.0);
    let mut passive = vec![false; n];
    for flag in passive.iter_mut().skip(mineq) {
        *flag = true;
    }

    // The unconstrained tail belongs to the passive set from the start.
    if mineq < n {
        solve_passive(a, b, &mut passive, mineq, tol, &mut x);
    }

    for _ in 0..3 * n.max(1) {
        let r = b - a * &x;
        let w = a.transpose() * r;
        let mut jmax = None;
        let mut wmax = tol;
        for j in 0..mineq {
            if !passive[j] && w[j] > wmax {
                wmax = w[j];
                jmax = Some(j);
            }
        }
        let Some(j) = jmax else { break };
        passive[j] = true;
        solve_passive(a, b, &mut passive, mineq, tol, &mut x);
    }
    x
}

/// Inner loop of the active-set method: solve the least-squares problem over
/// the passive columns, stepping back towards the previous iterate whenever a
/// constrained passive component turns nonpositive.
fn solve_passive(
    a: &Matrix,
    b: &Vector,
    passive: &mut [bool],
    mineq: usize,
    tol: Real,
    x: &mut Vector,
) {
    let n = a.ncols();
    loop {
        let cols: Vec<usize> = (0..n).filter(|&j| passive[j]).collect();
        if cols.is_empty() {
            return;
        }
        let sub = a.select_columns(cols.iter());
        let svd = sub.svd(true, true);
        let zs = match svd.solve(b, Real::EPSILON * tol.max(1.0)) {
            Ok(z) => z,
            Err(_) => return,
        };
        let mut z = Vector::zeros(n);
        for (idx, &j) in cols.iter().enumerate() {
            z[j] = zs[idx];
        }

        let feasible = cols.iter().all(|&j| j >= mineq || z[j] > 0.0);
        if feasible {
            x.copy_from(&z);
            return;
        }

        // Interpolate between x and z to stay on the boundary of the
        // nonnegative orthant, then drop the components that vanished.
        let mut alpha = 1.0_f64;
        for &j in &cols {
            if j < mineq && z[j] <= 0.0 && x[j] - z[j] > 0.0 {
                alpha = alpha.min(x[j] / (x[j] - z[j]));
            }
        }
        for j in 0..n {
            x[j] += alpha * (z[j] - x[j]);
        }
        for &j in &cols {
            if j < mineq && x[j].abs() <= tol {
                x[j] = 0.0;
                passive[j] = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_tail_matches_least_squares() {
        // min ‖A x − b‖ with both components free reduces to plain least
        // squares: A = I, b = (-1, 2) → x = b.
        let a = Matrix::identity(2, 2);
        let b = Vector::from_column_slice(&[-1.0, 2.0]);
        let x = nnls(&a, &b, 0);
        assert!((x[0] + 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn clamps_negative_component_to_zero() {
        let a = Matrix::identity(2, 2);
        let b = Vector::from_column_slice(&[-1.0, 2.0]);
        let x = nnls(&a, &b, 2);
        assert!(x[0].abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn mixed_constrained_and_free() {
        // First column constrained, second free. b lies in the span with a
        // negative coefficient on the first column, so that one is zeroed.
        let a = Matrix::from_row_slice(3, 2, &[1.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let b = Vector::from_column_slice(&[-1.0, 1.0, 1.0]);
        let x = nnls(&a, &b, 1);
        assert!(x[0] >= 0.0);
        // With x[0] = 0, the free column fits b in least squares:
        // min (x1+1)² + 2(x1-1)² → x1 = 1/3.
        assert!(x[0].abs() < 1e-10);
        assert!((x[1] - 1.0 / 3.0).abs() < 1e-8);
    }

    #[test]
    fn classic_lawson_hanson_example() {
        let a = Matrix::from_row_slice(4, 3, &[
            1.0, 1.0, 1.0, //
            2.0, 1.0, 0.0, //
            0.0, 1.0, 2.0, //
            1.0, 0.0, 1.0,
        ]);
        let xtrue = Vector::from_column_slice(&[0.5, 0.0, 1.5]);
        let b = &a * &xtrue;
        let x = nnls(&a, &b, 3);
        for i in 0..3 {
            assert!((x[i] - xtrue[i]).abs() < 1e-8, "x[{i}] = {}", x[i]);
        }
    }
}
