//! Linearly-constrained trust-region subproblem by projected truncated
//! conjugate gradients.
//!
//! Minimizes `q(d) = g·d + ½ d·H d` subject to `A_ub (xopt + d) <= b_ub`,
//! `A_eq (xopt + d) = b_eq`, the bounds `xl <= xopt + d <= xu`, and
//! `‖d‖ <= delta`. The base point must be feasible: the caller guarantees
//! `A_ub xopt <= b_ub` and `A_eq xopt = b_eq`.
//!
//! The iteration runs conjugate gradients projected onto the nullspace of
//! the working-set constraint normals. Whenever an inactive inequality or a
//! bound becomes binding, its normal joins the working set and the iteration
//! restarts in the smaller subspace.

use crate::{radius_step, Matrix, Vector};
use dfo_core::Real;

/// Minimize a quadratic over a polytope intersected with a ball.
#[allow(clippy::too_many_arguments)]
pub fn lctcg(
    xopt: &Vector,
    gq: &Vector,
    hessp: &dyn Fn(&Vector) -> Vector,
    aub: &Matrix,
    bub: &Vector,
    aeq: &Matrix,
    beq: &Vector,
    xl: &Vector,
    xu: &Vector,
    delta: Real,
) -> Vector {
    let n = xopt.len();
    let mlub = aub.nrows();
    let mut d = Vector::zeros(n);

    // Working set of constraint normals, seeded with every equality row and
    // every inequality or bound that is already binding at the base point.
    let rhs_scale = bub
        .iter()
        .chain(beq.iter())
        .fold(1.0_f64, |a, &b| a.max(b.abs()));
    let ctol = 10.0 * Real::EPSILON * (n.max(mlub) as Real) * rhs_scale;
    debug_assert!(
        aeq.nrows() == 0 || (aeq * xopt - beq).amax() <= ctol.max(1e-8),
        "base point must satisfy the equality constraints"
    );
    let mut normals: Vec<Vector> = Vec::new();
    for i in 0..aeq.nrows() {
        normals.push(aeq.row(i).transpose());
    }
    let mut active = vec![false; mlub];
    for i in 0..mlub {
        if bub[i] - aub.row(i).dot(&xopt.transpose()) <= ctol {
            active[i] = true;
            normals.push(aub.row(i).transpose());
        }
    }
    let bscale = xl
        .iter()
        .chain(xu.iter())
        .filter(|v| v.is_finite())
        .fold(1.0_f64, |a, &b| a.max(b.abs()));
    let btol = 10.0 * Real::EPSILON * (n as Real) * bscale;
    let mut bound_fixed = vec![false; n];
    for i in 0..n {
        if xu[i] - xopt[i] <= btol || xopt[i] - xl[i] <= btol {
            bound_fixed[i] = true;
            normals.push(unit(n, i));
        }
    }

    let gtol = 1e-10 * gq.norm().max(1.0);
    let max_restarts = mlub + n + 2;
    let mut restarts = 0;
    'outer: while restarts <= max_restarts {
        restarts += 1;
        let proj = RowSpace::new(&normals, n);
        let grad = gq + hessp(&d);
        let mut r = proj.null_project(&grad);
        if r.norm() <= gtol {
            break;
        }
        let mut p = -r.clone();
        let mut rz = r.dot(&r);
        for _ in 0..2 * n {
            let hp = hessp(&p);
            let php = p.dot(&hp);
            let alpha_cg = if php > 0.0 { rz / php } else { Real::INFINITY };
            let alpha_tr = radius_step(&d, &p, delta);

            // Step length to the nearest inactive inequality or free bound.
            let mut alpha_ct = Real::INFINITY;
            let mut hit: Option<Hit> = None;
            for i in 0..mlub {
                if active[i] {
                    continue;
                }
                let ap = aub.row(i).dot(&p.transpose());
                if ap > ctol.max(Real::EPSILON) {
                    let slack = bub[i] - aub.row(i).dot(&(xopt + &d).transpose());
                    let t = (slack / ap).max(0.0);
                    if t < alpha_ct {
                        alpha_ct = t;
                        hit = Some(Hit::Inequality(i));
                    }
                }
            }
            for i in 0..n {
                if bound_fixed[i] || p[i] == 0.0 {
                    continue;
                }
                let t = if p[i] > 0.0 {
                    (xu[i] - xopt[i] - d[i]) / p[i]
                } else {
                    (xl[i] - xopt[i] - d[i]) / p[i]
                };
                let t = t.max(0.0);
                if t < alpha_ct {
                    alpha_ct = t;
                    hit = Some(Hit::Bound(i));
                }
            }

            let alpha = alpha_cg.min(alpha_tr).min(alpha_ct);
            if !alpha.is_finite() || alpha <= 0.0 {
                break 'outer;
            }
            d.axpy(alpha, &p, 1.0);
            if alpha == alpha_tr && alpha < alpha_cg.min(alpha_ct) {
                break 'outer;
            }
            if alpha == alpha_ct && alpha < alpha_cg {
                match hit {
                    Some(Hit::Inequality(i)) => {
                        active[i] = true;
                        normals.push(aub.row(i).transpose());
                    }
                    Some(Hit::Bound(i)) => {
                        bound_fixed[i] = true;
                        d[i] = if p[i] > 0.0 { xu[i] - xopt[i] } else { xl[i] - xopt[i] };
                        normals.push(unit(n, i));
                    }
                    None => {}
                }
                continue 'outer;
            }
            // Interior conjugate-gradient update.
            r.axpy(alpha, &hp, 1.0);
            r = proj.null_project(&r);
            let rz_new = r.dot(&r);
            if rz_new.sqrt() <= gtol {
                break 'outer;
            }
            let beta = rz_new / rz;
            rz = rz_new;
            p = -&r + beta * p;
        }
        break;
    }
    d
}

enum Hit {
    Inequality(usize),
    Bound(usize),
}

/// Orthonormal basis of the row space of a set of constraint normals, kept
/// as the significant right singular vectors; used to project onto the
/// nullspace.
struct RowSpace {
    basis: Vec<Vector>,
}

impl RowSpace {
    fn new(normals: &[Vector], n: usize) -> Self {
        if normals.is_empty() {
            return Self { basis: Vec::new() };
        }
        let mut c = Matrix::zeros(normals.len(), n);
        for (i, row) in normals.iter().enumerate() {
            c.row_mut(i).copy_from(&row.transpose());
        }
        let svd = c.svd(false, true);
        let vt = svd.v_t.expect("SVD of the constraint normals");
        let smax = svd.singular_values.amax();
        let tol = Real::EPSILON * (normals.len().max(n) as Real) * smax.max(1.0);
        let mut basis = Vec::new();
        for k in 0..svd.singular_values.len() {
            if svd.singular_values[k] > tol {
                basis.push(vt.row(k).transpose());
            }
        }
        Self { basis }
    }

    /// Project `v` onto the orthogonal complement of the row space.
    fn null_project(&self, v: &Vector) -> Vector {
        let mut out = v.clone();
        for b in &self.basis {
            let c = b.dot(v);
            out.axpy(-c, b, 1.0);
        }
        out
    }
}

fn unit(n: usize, i: usize) -> Vector {
    let mut e = Vector::zeros(n);
    e[i] = 1.0;
    e
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_constrained_quadratic() {
        // min ½‖d + c‖² s.t. 1·d = 0: the unconstrained minimum -c projected
        // onto the hyperplane sum(d) = 0.
        let n = 3;
        let xopt = Vector::zeros(n);
        let c = Vector::from_column_slice(&[1.0, 2.0, 3.0]);
        let g = c.clone();
        let hp = |v: &Vector| v.clone();
        let aub = Matrix::zeros(0, n);
        let bub = Vector::zeros(0);
        let aeq = Matrix::from_row_slice(1, n, &[1.0, 1.0, 1.0]);
        let beq = Vector::zeros(1);
        let xl = Vector::from_element(n, -100.0);
        let xu = Vector::from_element(n, 100.0);
        let d = lctcg(&xopt, &g, &hp, &aub, &bub, &aeq, &beq, &xl, &xu, 50.0);
        let mean = c.sum() / n as Real;
        for i in 0..n {
            assert!((d[i] + c[i] - mean).abs() < 1e-8, "d[{i}] = {}", d[i]);
        }
        assert!(d.sum().abs() < 1e-8);
    }

    #[test]
    fn stops_at_inequality() {
        // min -d0 s.t. d0 <= 0.5 (from xopt = 0), wide ball.
        let n = 2;
        let xopt = Vector::zeros(n);
        let g = Vector::from_column_slice(&[-1.0, 0.0]);
        let hp = |_: &Vector| Vector::zeros(2);
        let aub = Matrix::from_row_slice(1, n, &[1.0, 0.0]);
        let bub = Vector::from_column_slice(&[0.5]);
        let aeq = Matrix::zeros(0, n);
        let beq = Vector::zeros(0);
        let xl = Vector::from_element(n, -10.0);
        let xu = Vector::from_element(n, 10.0);
        let d = lctcg(&xopt, &g, &hp, &aub, &bub, &aeq, &beq, &xl, &xu, 5.0);
        assert!(d[0] <= 0.5 + 1e-10);
        assert!((d[0] - 0.5).abs() < 1e-8);
    }

    #[test]
    fn keeps_feasibility_and_descent() {
        let n = 3;
        let xopt = Vector::from_column_slice(&[0.2, 0.0, -0.1]);
        let g = Vector::from_column_slice(&[1.0, -1.0, 0.5]);
        let hp = |v: &Vector| 2.0 * v;
        let aub = Matrix::from_row_slice(2, n, &[1.0, 1.0, 0.0, 0.0, -1.0, 1.0]);
        let bub = Vector::from_column_slice(&[1.0, 2.0]);
        let aeq = Matrix::zeros(0, n);
        let beq = Vector::zeros(0);
        let xl = Vector::from_element(n, -1.0);
        let xu = Vector::from_element(n, 1.0);
        let d = lctcg(&xopt, &g, &hp, &aub, &bub, &aeq, &beq, &xl, &xu, 0.8);
        assert!(d.norm() <= 0.8 + 1e-10);
        let x = &xopt + &d;
        for i in 0..2 {
            assert!(aub.row(i).dot(&x.transpose()) <= bub[i] + 1e-8);
        }
        for i in 0..n {
            assert!(x[i] >= xl[i] - 1e-10 && x[i] <= xu[i] + 1e-10);
        }
        let q = g.dot(&d) + d.dot(&d);
        assert!(q <= 1e-12);
    }
}
