//! Quadratic functions stored in split form.
//!
//! A model keeps its gradient `gq` at the current expansion point, implicit
//! Hessian weights `pq` indexed by the interpolation points, and an optional
//! explicit Hessian `hq`. The full Hessian is
//! `hq + Σₖ pqₖ xptₖ xptₖᵀ`, which makes the incremental update of a model
//! after an interpolation-point swap a rank-one affair. The freedom left by
//! the interpolation conditions is taken up by minimizing the update of the
//! Hessian matrix in Frobenius norm.

use dfo_core::Real;
use dfo_linalg::{Matrix, Vector};

/// Product of `Ω = Z J Zᵀ` with the `k`-th coordinate vector, where `J` is
/// the signature diagonal with `idz` leading `-1` entries.
pub fn omega_column(zmat: &Matrix, idz: usize, k: usize) -> Vector {
    let mut temp = zmat.row(k).transpose();
    for j in 0..idz {
        temp[j] = -temp[j];
    }
    zmat * temp
}

/// Product of `Ω = Z J Zᵀ` with an arbitrary vector.
pub fn omega_product(zmat: &Matrix, idz: usize, v: &Vector) -> Vector {
    let mut temp = zmat.tr_mul(v);
    for j in 0..idz {
        temp[j] = -temp[j];
    }
    zmat * temp
}

/// How a model is refreshed after an interpolation-point swap.
///
/// The standard and the alternative model of a function differ only in this
/// rule: the standard model absorbs the swap incrementally, keeping its
/// Hessian change least in Frobenius norm relative to the previous model,
/// while the alternative model is rebuilt from scratch from the fresh value
/// vector, keeping its Hessian itself least in Frobenius norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRule {
    /// Absorb the single-point change into the existing model.
    Incremental,
    /// Reinterpolate the full value vector from scratch.
    Rebuild,
}

/// A quadratic multivariate function in split form.
///
/// The constant term is not maintained: the value at the expansion point
/// `xpt[kopt, :]` is zero by convention, and callers add the function value
/// at the expansion point themselves.
#[derive(Debug, Clone)]
pub struct Quadratic {
    gq: Vector,
    pq: Vector,
    hq: Option<Matrix>,
}

impl Quadratic {
    /// Build the least-Frobenius-norm interpolant of the values `fval` from
    /// the factored inverse KKT matrix.
    ///
    /// The gradient at the origin of the displacements is
    /// `B[0..npt, :]ᵀ fval` and the implicit Hessian weights are `Ω fval`.
    /// The expansion point is the origin; call [`shift_expansion_point`]
    /// to move it to the current best point.
    ///
    /// [`shift_expansion_point`]: Quadratic::shift_expansion_point
    pub fn new(bmat: &Matrix, zmat: &Matrix, idz: usize, fval: &Vector) -> Self {
        let npt = zmat.nrows();
        Self {
            gq: bmat.rows(0, npt).tr_mul(fval),
            pq: omega_product(zmat, idz, fval),
            hq: None,
        }
    }

    /// Build the `k`-th Lagrange polynomial of the interpolation set: the
    /// interpolant of the coordinate vector `e_k`.
    pub fn lagrange(bmat: &Matrix, zmat: &Matrix, idz: usize, k: usize) -> Self {
        Self {
            gq: bmat.row(k).transpose(),
            pq: omega_column(zmat, idz, k),
            hq: None,
        }
    }

    /// Stored gradient at the expansion point.
    pub fn gq(&self) -> &Vector {
        &self.gq
    }

    /// Stored implicit Hessian weights.
    pub fn pq(&self) -> &Vector {
        &self.pq
    }

    /// Evaluate the function at `x`, relative to its value at the expansion
    /// point `xpt[kopt, :]`.
    pub fn value(&self, x: &Vector, xpt: &Matrix, kopt: usize) -> Real {
        let dx = x - xpt.row(kopt).transpose();
        let xd = xpt * &dx;
        let mut qx = self.gq.dot(&dx) + 0.5 * self.pq.dot(&xd.component_mul(&xd));
        if let Some(hq) = &self.hq {
            qx += 0.5 * dx.dot(&(hq * &dx));
        }
        qx
    }

    /// Gradient at `x`.
    pub fn grad(&self, x: &Vector, xpt: &Matrix, kopt: usize) -> Vector {
        &self.gq + self.hessp(&(x - xpt.row(kopt).transpose()), xpt)
    }

    /// Dense Hessian matrix.
    ///
    /// Requires a matrix product over the interpolation points; prefer
    /// [`hessp`](Quadratic::hessp) when only products are needed.
    pub fn hess(&self, xpt: &Matrix) -> Matrix {
        let mut scaled = xpt.clone();
        for k in 0..xpt.nrows() {
            scaled.row_mut(k).scale_mut(self.pq[k]);
        }
        let mut h = xpt.tr_mul(&scaled);
        if let Some(hq) = &self.hq {
            h += hq;
        }
        h
    }

    /// Product of the Hessian matrix with `x`.
    pub fn hessp(&self, x: &Vector, xpt: &Matrix) -> Vector {
        let w = (xpt * x).component_mul(&self.pq);
        let mut hx = xpt.tr_mul(&w);
        if let Some(hq) = &self.hq {
            hx += hq * x;
        }
        hx
    }

    /// Curvature `x·H x` at `x`.
    pub fn curv(&self, x: &Vector, xpt: &Matrix) -> Real {
        let w = xpt * x;
        let mut cx = self.pq.dot(&w.component_mul(&w));
        if let Some(hq) = &self.hq {
            cx += x.dot(&(hq * x));
        }
        cx
    }

    /// Move the expansion point by `step`.
    ///
    /// Must be called whenever the index around which the function is
    /// defined changes, so that the stored gradient matches the new point.
    pub fn shift_expansion_point(&mut self, step: &Vector, xpt: &Matrix) {
        let h = self.hessp(step, xpt);
        self.gq += h;
    }

    /// Re-expand the function when the origin of the displacements moves to
    /// `xpt[kopt, :]`.
    ///
    /// The implicit part of the Hessian refers to the point coordinates, so
    /// a translation of the points leaks a symmetric rank-two correction
    /// into the explicit part.
    pub fn shift_interpolation_points(&mut self, xpt: &Matrix, kopt: usize) {
        let n = xpt.ncols();
        let xopt = xpt.row(kopt).transpose();
        let w = xpt.tr_mul(&self.pq) - 0.5 * self.pq.sum() * &xopt;
        let hq = self
            .hq
            .get_or_insert_with(|| Matrix::zeros(n, n));
        hq.ger(1.0, &w, &xopt, 1.0);
        hq.ger(1.0, &xopt, &w, 1.0);
    }

    /// Absorb the replacement of interpolation point `knew` into the model.
    ///
    /// * `xpt` — point matrix with the new point already in row `knew`.
    /// * `kopt` — index of the expansion point.
    /// * `xold` — coordinates the replaced point used to have.
    /// * `bmat`, `zmat`, `idz` — factorization updated for the swap.
    /// * `diff` — new function value minus the previous model prediction at
    ///   the new point.
    pub fn update(
        &mut self,
        xpt: &Matrix,
        kopt: usize,
        xold: &Vector,
        bmat: &Matrix,
        zmat: &Matrix,
        idz: usize,
        knew: usize,
        diff: Real,
    ) {
        let n = xpt.ncols();
        // The outgoing point's implicit weight becomes explicit curvature.
        let omega = omega_column(zmat, idz, knew);
        let hq = self
            .hq
            .get_or_insert_with(|| Matrix::zeros(n, n));
        hq.ger(self.pq[knew], xold, xold, 1.0);
        self.pq[knew] = 0.0;
        self.pq.axpy(diff, &omega, 1.0);

        let w = (xpt * xpt.row(kopt).transpose()).component_mul(&omega);
        let gup = bmat.row(knew).transpose() + xpt.tr_mul(&w);
        self.gq.axpy(diff, &gup, 1.0);
    }

    /// Largest interpolation error `|q(xpt[k]) + fval[kopt] − fval[k]|`
    /// over the interpolation points.
    pub fn interpolation_error(&self, xpt: &Matrix, fval: &Vector, kopt: usize) -> Real {
        let mut diff = 0.0_f64;
        for k in 0..xpt.nrows() {
            let qx = self.value(&xpt.row(k).transpose(), xpt, kopt);
            diff = diff.max((qx + fval[kopt] - fval[k]).abs());
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_xpt() -> Matrix {
        Matrix::from_row_slice(5, 2, &[
            0.0, 0.0, //
            0.5, 0.0, //
            0.0, 0.5, //
            -0.5, 0.0, //
            0.0, -0.5,
        ])
    }

    #[test]
    fn value_vanishes_at_expansion_point() {
        let xpt = sample_xpt();
        let q = Quadratic {
            gq: Vector::from_column_slice(&[1.0, -2.0]),
            pq: Vector::from_column_slice(&[0.1, 0.2, -0.3, 0.4, 0.0]),
            hq: None,
        };
        for kopt in 0..xpt.nrows() {
            let x = xpt.row(kopt).transpose();
            assert_relative_eq!(q.value(&x, &xpt, kopt), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn hessp_matches_dense_hessian() {
        let xpt = sample_xpt();
        let mut q = Quadratic {
            gq: Vector::from_column_slice(&[0.3, 0.7]),
            pq: Vector::from_column_slice(&[1.0, -0.5, 0.25, 0.0, 2.0]),
            hq: None,
        };
        // Force an explicit part as well.
        q.shift_interpolation_points(&xpt, 1);
        let h = q.hess(&xpt);
        let x = Vector::from_column_slice(&[0.4, -1.1]);
        let hx = q.hessp(&x, &xpt);
        let dense = &h * &x;
        assert_relative_eq!(hx[0], dense[0], epsilon = 1e-12);
        assert_relative_eq!(hx[1], dense[1], epsilon = 1e-12);
        assert_relative_eq!(q.curv(&x, &xpt), x.dot(&dense), epsilon = 1e-12);
    }

    #[test]
    fn gradient_by_finite_differences() {
        let xpt = sample_xpt();
        let q = Quadratic {
            gq: Vector::from_column_slice(&[0.5, -0.25]),
            pq: Vector::from_column_slice(&[0.6, -0.1, 0.3, 0.2, -0.4]),
            hq: None,
        };
        let x = Vector::from_column_slice(&[0.2, 0.1]);
        let g = q.grad(&x, &xpt, 0);
        let h = 1e-6;
        for i in 0..2 {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[i] += h;
            xm[i] -= h;
            let fd = (q.value(&xp, &xpt, 0) - q.value(&xm, &xpt, 0)) / (2.0 * h);
            assert_relative_eq!(g[i], fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn expansion_point_shift_preserves_the_function() {
        let xpt = sample_xpt();
        let mut q = Quadratic {
            gq: Vector::from_column_slice(&[1.0, 1.0]),
            pq: Vector::from_column_slice(&[0.2, 0.1, -0.2, 0.3, 0.15]),
            hq: None,
        };
        let x = Vector::from_column_slice(&[0.3, -0.2]);
        let before = q.value(&x, &xpt, 0) - q.value(&xpt.row(2).transpose(), &xpt, 0);
        let step = xpt.row(2).transpose() - xpt.row(0).transpose();
        q.shift_expansion_point(&step, &xpt);
        let after = q.value(&x, &xpt, 2);
        assert_relative_eq!(before, after, epsilon = 1e-12);
    }
}
