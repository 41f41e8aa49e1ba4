//! Storage for the moving interpolation set.
//!
//! Keeps the displacements of the interpolation points from the origin of
//! the calculations, together with the objective, constraint, and residual
//! values observed at each point. Residuals are computed by the owning
//! container, which knows the constraint data.

use dfo_linalg::{Matrix, Vector};

/// The interpolation points and the function data attached to them.
#[derive(Debug, Clone)]
pub struct InterpSet {
    /// Displacements from the origin, one interpolation point per row.
    pub(crate) xpt: Matrix,
    /// Objective values at the points.
    pub(crate) fval: Vector,
    /// Constraint residuals at the points.
    pub(crate) rval: Vector,
    /// Nonlinear inequality constraint values, one point per row.
    pub(crate) cvalub: Matrix,
    /// Nonlinear equality constraint values, one point per row.
    pub(crate) cvaleq: Matrix,
}

impl InterpSet {
    /// Allocate storage for `npt` points in dimension `n` with `mnlub`
    /// nonlinear inequality and `mnleq` nonlinear equality constraints.
    pub fn zeros(npt: usize, n: usize, mnlub: usize, mnleq: usize) -> Self {
        Self {
            xpt: Matrix::zeros(npt, n),
            fval: Vector::zeros(npt),
            rval: Vector::zeros(npt),
            cvalub: Matrix::zeros(npt, mnlub),
            cvaleq: Matrix::zeros(npt, mnleq),
        }
    }

    /// Number of interpolation points.
    pub fn npt(&self) -> usize {
        self.xpt.nrows()
    }

    /// Dimension of the decision variables.
    pub fn dim(&self) -> usize {
        self.xpt.ncols()
    }

    /// Displacements of the interpolation points, one per row.
    pub fn xpt(&self) -> &Matrix {
        &self.xpt
    }

    /// Objective values at the interpolation points.
    pub fn fval(&self) -> &Vector {
        &self.fval
    }

    /// Residuals at the interpolation points.
    pub fn rval(&self) -> &Vector {
        &self.rval
    }

    /// Nonlinear inequality constraint values at the interpolation points.
    pub fn cvalub(&self) -> &Matrix {
        &self.cvalub
    }

    /// Nonlinear equality constraint values at the interpolation points.
    pub fn cvaleq(&self) -> &Matrix {
        &self.cvaleq
    }

    /// Coordinates of the `k`-th point as an owned vector.
    pub fn point(&self, k: usize) -> Vector {
        self.xpt.row(k).transpose()
    }

    /// Squared distances of every point from the `kopt`-th one.
    pub fn dist_sq_from(&self, kopt: usize) -> Vector {
        let xopt = self.point(kopt);
        Vector::from_iterator(
            self.npt(),
            (0..self.npt()).map(|k| (self.point(k) - &xopt).norm_squared()),
        )
    }

    /// Translate every point by `-shift`.
    pub(crate) fn translate(&mut self, shift: &Vector) {
        for k in 0..self.npt() {
            let mut row = self.xpt.row_mut(k);
            for i in 0..shift.len() {
                row[i] -= shift[i];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_from_the_base_point() {
        let mut set = InterpSet::zeros(3, 2, 0, 0);
        set.xpt = Matrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 2.0]);
        let d = set.dist_sq_from(0);
        assert_eq!(d[0], 0.0);
        assert_eq!(d[1], 1.0);
        assert_eq!(d[2], 4.0);
    }

    #[test]
    fn translate_shifts_every_row() {
        let mut set = InterpSet::zeros(2, 2, 0, 0);
        set.xpt = Matrix::from_row_slice(2, 2, &[1.0, 1.0, -1.0, 2.0]);
        set.translate(&Vector::from_column_slice(&[1.0, -1.0]));
        assert_eq!(set.xpt[(0, 0)], 0.0);
        assert_eq!(set.xpt[(0, 1)], 2.0);
        assert_eq!(set.xpt[(1, 0)], -2.0);
        assert_eq!(set.xpt[(1, 1)], 3.0);
    }
}
