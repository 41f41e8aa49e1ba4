//! Factored inverse KKT matrix of the interpolation system.
//!
//! The inverse of the KKT matrix of interpolation is carried in factored
//! form: `bmat` holds its last `n` columns, `zmat` a rank factorization of
//! its leading `npt × npt` block, and `idz` counts the columns of `zmat`
//! that carry a negative sign in the signature diagonal
//! `J = diag(−1, …, −1, +1, …, +1)`, so that the leading block equals
//! `Z J Zᵀ`. Interpolating function values through this matrix yields the
//! quadratic whose Hessian change from the previous model is least in
//! Frobenius norm.
//!
//! Although the theoretical value of `idz` is always zero, it absorbs the
//! numerical difficulties raised by ill-conditioned interpolation sets.

use dfo_core::{Error, Real, Result};
use dfo_linalg::{givens, Axis, Matrix, Vector};

/// The factored inverse KKT matrix `(bmat, zmat, idz)`.
#[derive(Debug, Clone)]
pub struct KktFactors {
    /// Last `n` columns of the inverse KKT matrix, shape `(npt + n, n)`.
    pub(crate) bmat: Matrix,
    /// Rank factor of the leading `npt` block, shape `(npt, npt − n − 1)`.
    pub(crate) zmat: Matrix,
    /// Number of "negative" leading columns of `zmat`.
    pub(crate) idz: usize,
}

impl KktFactors {
    /// Zero-initialized factors for `npt` points in dimension `n`.
    ///
    /// The nonzero entries of the initial factorization are written by the
    /// model container while it lays out the initial interpolation set,
    /// since they depend on the chosen point geometry.
    pub fn zeros(npt: usize, n: usize) -> Self {
        Self {
            bmat: Matrix::zeros(npt + n, n),
            zmat: Matrix::zeros(npt, npt - n - 1),
            idz: 0,
        }
    }

    /// Last `n` columns of the inverse KKT matrix.
    pub fn bmat(&self) -> &Matrix {
        &self.bmat
    }

    /// Rank factor of the leading block.
    pub fn zmat(&self) -> &Matrix {
        &self.zmat
    }

    /// Number of negative columns of `zmat`.
    pub fn idz(&self) -> usize {
        self.idz
    }

    /// Number of interpolation points.
    pub fn npt(&self) -> usize {
        self.zmat.nrows()
    }

    /// Dimension of the decision variables.
    pub fn dim(&self) -> usize {
        self.bmat.ncols()
    }

    /// Evaluate the Lagrange polynomials and the scalar β at the trial
    /// point `xpt[kopt, :] + step`.
    ///
    /// The first `npt` components of the returned vector are the values of
    /// the Lagrange polynomials associated with the interpolation points at
    /// the trial point; the remaining `n` components are not meaningful on
    /// their own but enter the updating formulae.
    pub fn lagrange_values(&self, xpt: &Matrix, kopt: usize, step: &Vector) -> (Real, Vector) {
        let npt = self.npt();
        let n = self.dim();
        let xopt = xpt.row(kopt).transpose();
        let stepsq = step.norm_squared();
        let xoptsq = xopt.norm_squared();
        let stx = step.dot(&xopt);
        let xstep = xpt * step;
        let xxopt = xpt * &xopt;
        let check = xstep.component_mul(&(0.5 * &xstep + xxopt));
        let mut temp = self.zmat.tr_mul(&check);
        for j in 0..self.idz {
            temp[j] = -temp[j];
        }
        let mut beta = 0.0_f64;
        for j in 0..temp.len() {
            if j < self.idz {
                beta += temp[j] * temp[j];
            } else {
                beta -= temp[j] * temp[j];
            }
        }
        let mut vlag = Vector::zeros(npt + n);
        let head = self.bmat.rows(0, npt) * step + &self.zmat * temp;
        for k in 0..npt {
            vlag[k] = head[k];
        }
        vlag[kopt] += 1.0;
        let tail = self.bmat.rows(0, npt).tr_mul(&check);
        let mut bsp = tail.dot(step);
        let tail = tail + self.bmat.rows(npt, n) * step;
        for j in 0..n {
            vlag[npt + j] = tail[j];
        }
        bsp += tail.dot(step);
        beta += stx * stx + stepsq * (xoptsq + 2.0 * stx + 0.5 * stepsq) - bsp;
        (beta, vlag)
    }

    /// Diagonal entries `α_k = (Z J Zᵀ)_{kk}` of the leading block.
    pub fn leading_diagonal(&self) -> Vector {
        let npt = self.npt();
        let mut alpha = Vector::zeros(npt);
        for k in 0..npt {
            let mut acc = 0.0;
            for j in 0..self.zmat.ncols() {
                let z = self.zmat[(k, j)];
                if j < self.idz {
                    acc -= z * z;
                } else {
                    acc += z * z;
                }
            }
            alpha[k] = acc;
        }
        alpha
    }

    /// Pick the interpolation point to remove for the trial point described
    /// by `(beta, vlag)`: the index maximizing `|σ_k| ‖xpt_k − xopt‖⁴` with
    /// `σ_k = α_k β + vlag_k²`.
    pub fn choose_removal(
        &self,
        beta: Real,
        vlag: &Vector,
        xpt: &Matrix,
        kopt: usize,
    ) -> usize {
        let npt = self.npt();
        let alpha = self.leading_diagonal();
        let xopt = xpt.row(kopt).transpose();
        let mut knew = 0;
        let mut best = -1.0_f64;
        for k in 0..npt {
            let sigma = vlag[k] * vlag[k] + beta * alpha[k];
            let dsq = (xpt.row(k).transpose() - &xopt).norm_squared();
            let weight = sigma.abs() * dsq * dsq;
            if weight > best {
                best = weight;
                knew = k;
            }
        }
        knew
    }

    /// Replace the `knew`-th interpolation point by the trial point whose
    /// `(beta, vlag)` were computed with [`lagrange_values`].
    ///
    /// Fails with [`Error::NumericBreakdown`] when the denominator of the
    /// updating formula underflows; the Givens rotations applied before the
    /// check rotate columns within a signature block and leave the
    /// represented matrix unchanged, so the factorization remains valid.
    ///
    /// [`lagrange_values`]: KktFactors::lagrange_values
    pub fn update(&mut self, knew: usize, beta: Real, vlag: &mut Vector) -> Result<()> {
        let npt = self.npt();
        let n = self.dim();
        let ncolz = npt - n - 1;

        // Zero the knew-th row of zmat except for the columns at positions
        // 0 and idz, preserving the split between negative and positive
        // columns.
        let mut jdz = 0;
        for j in 1..ncolz {
            if j == self.idz {
                jdz = self.idz;
            } else if self.zmat[(knew, j)].abs() > 0.0 {
                let cval = self.zmat[(knew, jdz)];
                let sval = self.zmat[(knew, j)];
                givens(&mut self.zmat, cval, sval, j, jdz, Axis::Columns);
                self.zmat[(knew, j)] = 0.0;
            }
        }

        // Denominator of the updating formula.
        let scala = if self.idz == 0 {
            self.zmat[(knew, 0)]
        } else {
            -self.zmat[(knew, 0)]
        };
        let scalb = if jdz == 0 { 0.0 } else { self.zmat[(knew, jdz)] };
        let omega = scala * self.zmat.column(0) + scalb * self.zmat.column(jdz);
        let alpha = omega[knew];
        let tau = vlag[knew];
        let sigma = alpha * beta + tau * tau;
        vlag[knew] -= 1.0;
        let bmax = self.bmat.iter().fold(1.0_f64, |a, &v| a.max(v.abs()));
        let zmax = self.zmat.iter().fold(1.0_f64, |a, &v| a.max(v.abs()));
        if sigma.abs() < Real::MIN_POSITIVE * bmax.max(zmax) {
            return Err(Error::NumericBreakdown);
        }

        // Update zmat. The flag reduce records whether the number of
        // negative columns must be decreased by one.
        let mut reduce = false;
        let hval = sigma.abs().sqrt();
        if jdz == 0 {
            let scala = tau / hval;
            let scalb = self.zmat[(knew, 0)] / hval;
            for k in 0..npt {
                self.zmat[(k, 0)] = scala * self.zmat[(k, 0)] - scalb * vlag[k];
            }
            if sigma < 0.0 {
                if self.idz == 0 {
                    self.idz = 1;
                } else {
                    reduce = true;
                }
            }
        } else {
            let kdz = if beta >= 0.0 { jdz } else { 0 };
            let jdz = jdz - kdz;
            let tempa = self.zmat[(knew, jdz)] * beta / sigma;
            let tempb = self.zmat[(knew, jdz)] * tau / sigma;
            let temp = self.zmat[(knew, kdz)];
            let scala = 1.0 / (beta.abs() * temp * temp + tau * tau).sqrt();
            let scalb = scala * hval;
            for k in 0..npt {
                self.zmat[(k, kdz)] = scala * (tau * self.zmat[(k, kdz)] - temp * vlag[k]);
            }
            for k in 0..npt {
                self.zmat[(k, jdz)] =
                    scalb * (self.zmat[(k, jdz)] - tempa * omega[k] - tempb * vlag[k]);
            }
            if sigma <= 0.0 {
                if beta < 0.0 {
                    self.idz += 1;
                } else {
                    reduce = true;
                }
            }
        }
        if reduce {
            self.idz -= 1;
            self.zmat.swap_columns(0, self.idz);
        }

        // Update bmat column by column, restoring the symmetry of its
        // trailing block as the columns complete.
        let bsav = self.bmat.row(knew).transpose();
        for j in 0..n {
            let cosv = (alpha * vlag[npt + j] - tau * bsav[j]) / sigma;
            let sinv = (tau * vlag[npt + j] + beta * bsav[j]) / sigma;
            for k in 0..npt {
                self.bmat[(k, j)] += cosv * vlag[k] - sinv * omega[k];
            }
            for k in 0..=j {
                self.bmat[(npt + k, j)] += cosv * vlag[npt + k] - sinv * bsav[k];
                self.bmat[(npt + j, k)] = self.bmat[(npt + k, j)];
            }
        }
        Ok(())
    }

    /// Apply the origin shift to the factorization: the origin of the
    /// displacements moves to `xpt[kopt, :]`, with `xpt` still expressed
    /// relative to the old origin.
    pub fn shift_origin(&mut self, xpt: &Matrix, kopt: usize) {
        let npt = self.npt();
        let n = self.dim();
        let ncolz = npt - n - 1;
        let xopt = xpt.row(kopt).transpose();
        let xoptsq = xopt.norm_squared();
        let qoptsq = 0.25 * xoptsq;
        let updt = (xpt * &xopt).add_scalar(-0.5 * xoptsq);

        // Changes to the trailing block that do not involve zmat.
        for k in 0..npt {
            let hx = xpt.row(k).transpose() - 0.5 * &xopt;
            let step = updt[k] * hx + qoptsq * &xopt;
            let bk = self.bmat.row(k).transpose();
            let mut lower = self.bmat.view_mut((npt, 0), (n, n));
            lower.ger(1.0, &bk, &step, 1.0);
            lower.ger(1.0, &step, &bk, 1.0);
        }

        // Changes that involve zmat, column by column with the sign of the
        // signature diagonal.
        let colsum = self.zmat.row_sum();
        let mut temp = Matrix::zeros(n, ncolz);
        for j in 0..ncolz {
            for i in 0..n {
                temp[(i, j)] = qoptsq * xopt[i] * colsum[j];
            }
        }
        for k in 0..npt {
            let hx = xpt.row(k).transpose() - 0.5 * &xopt;
            for j in 0..ncolz {
                let w = self.zmat[(k, j)] * updt[k];
                for i in 0..n {
                    temp[(i, j)] += hx[i] * w;
                }
            }
        }
        for j in 0..ncolz {
            let sign = if j < self.idz { -1.0 } else { 1.0 };
            let zj: Vector = self.zmat.column(j).clone_owned();
            let tj: Vector = temp.column(j).clone_owned();
            self.bmat
                .view_mut((0, 0), (npt, n))
                .ger(sign, &zj, &tj, 1.0);
            self.bmat
                .view_mut((npt, 0), (n, n))
                .ger(sign, &tj, &tj, 1.0);
        }
    }
}
