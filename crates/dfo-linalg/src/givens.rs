//! In-place plane (Givens) rotations on rows or columns of a dense matrix.

use crate::Matrix;
use dfo_core::Real;

/// Whether a rotation acts on a pair of rows or a pair of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Rotate two rows of the matrix.
    Rows,
    /// Rotate two columns of the matrix.
    Columns,
}

/// Apply the plane rotation built from `(cval, sval)` to slices `i` and `j`
/// of `mat`, in place.
///
/// With `r = hypot(cval, sval)`, `c = cval / r` and `s = sval / r`, slice `j`
/// receives `c * mat[j] + s * mat[i]` and slice `i` receives
/// `c * mat[i] - s * mat[j]`. When `cval` and `sval` are taken from a common
/// row (for columns) or column (for rows), the rotation zeroes the `sval`
/// entry and accumulates `r` in the `cval` entry. Returns `r`.
pub fn givens(mat: &mut Matrix, cval: Real, sval: Real, i: usize, j: usize, axis: Axis) -> Real {
    let r = cval.hypot(sval);
    let c = cval / r;
    let s = sval / r;
    match axis {
        Axis::Columns => {
            for k in 0..mat.nrows() {
                let gi = mat[(k, i)];
                let gj = mat[(k, j)];
                mat[(k, j)] = c * gj + s * gi;
                mat[(k, i)] = c * gi - s * gj;
            }
        }
        Axis::Rows => {
            for k in 0..mat.ncols() {
                let gi = mat[(i, k)];
                let gj = mat[(j, k)];
                mat[(j, k)] = c * gj + s * gi;
                mat[(i, k)] = c * gi - s * gj;
            }
        }
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vector;

    #[test]
    fn zeroes_target_column_entry() {
        let mut m = Matrix::from_row_slice(2, 2, &[3.0, 4.0, 1.0, 2.0]);
        // Zero m[(0, 0)] into m[(0, 1)].
        let (m01, m00) = (m[(0, 1)], m[(0, 0)]);
        let r = givens(&mut m, m01, m00, 0, 1, Axis::Columns);
        assert!((m[(0, 0)]).abs() < 1e-12);
        assert!((m[(0, 1)] - 5.0).abs() < 1e-12);
        assert!((r - 5.0).abs() < 1e-12);
    }

    #[test]
    fn preserves_row_norms_under_column_rotation() {
        let mut m = Matrix::from_row_slice(3, 2, &[3.0, 4.0, -1.0, 2.0, 0.5, 0.5]);
        let before: Vec<Real> = (0..3)
            .map(|k| Vector::from_column_slice(&[m[(k, 0)], m[(k, 1)]]).norm())
            .collect();
        givens(&mut m, 2.0, -1.5, 0, 1, Axis::Columns);
        for (k, &nrm) in before.iter().enumerate() {
            let after = Vector::from_column_slice(&[m[(k, 0)], m[(k, 1)]]).norm();
            assert!((after - nrm).abs() < 1e-12);
        }
    }

    #[test]
    fn rotates_rows() {
        let mut m = Matrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 0.0]);
        givens(&mut m, 1.0, 1.0, 0, 1, Axis::Rows);
        let s = (2.0_f64).sqrt();
        assert!((m[(1, 0)] - s).abs() < 1e-12);
        assert!(m[(0, 0)].abs() < 1e-12);
    }
}
