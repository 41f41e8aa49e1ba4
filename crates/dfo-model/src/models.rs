//! Container for the quadratic models of a nonlinear problem.
//!
//! Owns the interpolation set, the factored inverse KKT matrix, and one
//! standard plus one alternative quadratic per modelled function (the
//! objective and each nonlinear constraint). The interpolation points may be
//! infeasible with respect to the linear and nonlinear constraints, but they
//! always satisfy the bound constraints.
//!
//! The freedom bequeathed by the interpolation conditions is taken up by
//! minimizing the updates of the Hessian matrices of the modelled functions
//! in Frobenius norm.

use dfo_core::{Real, Result};
use dfo_linalg::{bvcs, bvlag, Matrix, Vector};

use crate::factorization::KktFactors;
use crate::points::InterpSet;
use crate::problem::{ConstraintFn, ObjectiveFn};
use crate::quadratic::{omega_column, Quadratic, RefreshRule};

/// Constraint classification of a problem, in the order of increasing
/// generality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemType {
    /// No constraints at all.
    Unconstrained,
    /// The only constraints fix every variable.
    FixedVariables,
    /// Bound constraints only.
    BoundConstrained,
    /// Linear constraints, possibly with bounds.
    LinearlyConstrained,
    /// General nonlinear constraints.
    NonlinearlyConstrained,
}

impl ProblemType {
    /// One-letter code of the classification.
    pub fn code(&self) -> char {
        match self {
            Self::Unconstrained => 'U',
            Self::FixedVariables => 'X',
            Self::BoundConstrained => 'B',
            Self::LinearlyConstrained => 'L',
            Self::NonlinearlyConstrained => 'O',
        }
    }
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Quadratic models of an optimization problem built by underdetermined
/// interpolation on a moving point set.
#[derive(Debug)]
pub struct Models {
    xl: Vector,
    xu: Vector,
    aub: Matrix,
    bub: Vector,
    aeq: Matrix,
    beq: Vector,
    set: InterpSet,
    kkt: KktFactors,
    kopt: usize,
    obj: Quadratic,
    obj_alt: Quadratic,
    cub: Vec<Quadratic>,
    cub_alt: Vec<Quadratic>,
    ceq: Vec<Quadratic>,
    ceq_alt: Vec<Quadratic>,
}

impl Models {
    /// Build the initial models around the adjusted starting point `xbase`.
    ///
    /// The bound and linear constraint data are shifted to displacement
    /// coordinates, the initial interpolation set is laid out on the
    /// coordinate axes within the bounds, the factorization is written in
    /// closed form to match that geometry, and the objective and nonlinear
    /// constraint functions are evaluated at every point.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        fun: &mut ObjectiveFn,
        cub: &mut Option<ConstraintFn>,
        ceq: &mut Option<ConstraintFn>,
        xbase: &Vector,
        xl: Vector,
        xu: Vector,
        aub: Matrix,
        bub: Vector,
        aeq: Matrix,
        beq: Vector,
        npt: usize,
        rhobeg: Real,
    ) -> Self {
        let n = xbase.len();
        // Shift every constraint to displacement coordinates.
        let xl = xl - xbase;
        let xu = xu - xbase;
        let bub = bub - &aub * xbase;
        let beq = beq - &aeq * xbase;

        let cub_x0 = eval_constraint(cub, xbase);
        let mnlub = cub_x0.len();
        let ceq_x0 = eval_constraint(ceq, xbase);
        let mnleq = ceq_x0.len();

        let mut set = InterpSet::zeros(npt, n, mnlub, mnleq);
        let mut kkt = KktFactors::zeros(npt, n);
        let mut stepa = 0.0_f64;
        let mut stepb = 0.0_f64;
        for k in 0..npt {
            // Lay out the displacement of the k-th initial point. There is
            // no conflict between the bounds and the starting point: each of
            // its components either equals a bound or admits a step of
            // rhobeg on that coordinate.
            if k >= 1 && k <= n {
                let km = k - 1;
                stepa = if xu[km].abs() <= 0.5 * rhobeg { -rhobeg } else { rhobeg };
                set.xpt[(k, km)] = stepa;
            } else if k > n && k <= 2 * n {
                let kx = k - n - 1;
                stepa = set.xpt[(kx + 1, kx)];
                stepb = if xl[kx].abs() <= 0.5 * rhobeg {
                    (2.0 * rhobeg).min(xu[kx])
                } else if xu[kx].abs() <= 0.5 * rhobeg {
                    (-2.0 * rhobeg).max(xl[kx])
                } else {
                    -rhobeg
                };
                set.xpt[(k, kx)] = stepb;
            } else if k > 2 * n {
                let kx = k - n - 1;
                let shift = kx / n;
                let ipt = kx - shift * n;
                let jpt = (ipt + shift) % n;
                set.xpt[(k, ipt)] = set.xpt[(ipt + 1, ipt)];
                set.xpt[(k, jpt)] = set.xpt[(jpt + 1, jpt)];
            }

            // Observe the objective and the nonlinear constraints.
            let x = xbase + set.xpt.row(k).transpose();
            set.fval[k] = fun(&x);
            if k == 0 {
                set.cvalub.row_mut(0).copy_from(&cub_x0.transpose());
                set.cvaleq.row_mut(0).copy_from(&ceq_x0.transpose());
            } else {
                set.cvalub
                    .row_mut(k)
                    .copy_from(&eval_constraint(cub, &x).transpose());
                set.cvaleq
                    .row_mut(k)
                    .copy_from(&eval_constraint(ceq, &x).transpose());
            }

            // Closed-form entries of the initial inverse KKT factorization
            // matching this geometry.
            if k <= 2 * n {
                if k >= 1 && k <= n && npt <= k + n {
                    let km = k - 1;
                    kkt.bmat[(0, km)] = -1.0 / stepa;
                    kkt.bmat[(k, km)] = 1.0 / stepa;
                    kkt.bmat[(npt + km, km)] = -0.5 * rhobeg * rhobeg;
                } else if k > n {
                    let kx = k - n - 1;
                    kkt.bmat[(0, kx)] = -(stepa + stepb) / (stepa * stepb);
                    kkt.bmat[(k, kx)] = -0.5 / set.xpt[(kx + 1, kx)];
                    kkt.bmat[(kx + 1, kx)] = -kkt.bmat[(0, kx)] - kkt.bmat[(k, kx)];
                    kkt.zmat[(0, kx)] = (2.0_f64).sqrt() / (stepa * stepb);
                    kkt.zmat[(k, kx)] = (0.5_f64).sqrt() / (rhobeg * rhobeg);
                    kkt.zmat[(kx + 1, kx)] = -kkt.zmat[(0, kx)] - kkt.zmat[(k, kx)];
                }
            } else {
                let kx = k - n - 1;
                let shift = kx / n;
                let ipt = kx - shift * n;
                let jpt = (ipt + shift) % n;
                let recip = 1.0 / (rhobeg * rhobeg);
                kkt.zmat[(0, kx)] = recip;
                kkt.zmat[(k, kx)] = recip;
                kkt.zmat[(ipt + 1, kx)] = -recip;
                kkt.zmat[(jpt + 1, kx)] = -recip;
            }
        }
        for k in 0..npt {
            set.rval[k] = residual(
                &set.point(k),
                &set.cvalub.row(k).transpose(),
                &set.cvaleq.row(k).transpose(),
                &xl,
                &xu,
                &aub,
                &bub,
                &aeq,
                &beq,
            );
        }

        // Interpolate the initial models. The standard models minimize the
        // updates of their Hessian matrices in Frobenius norm when a point
        // is replaced, while the alternative models minimize their Hessian
        // matrices themselves in Frobenius norm.
        let kopt = 0;
        let obj = interpolant(&kkt, &set.xpt, kopt, &set.fval.clone_owned());
        let obj_alt = obj.clone();
        let mut cub_models = Vec::with_capacity(mnlub);
        for i in 0..mnlub {
            cub_models.push(interpolant(&kkt, &set.xpt, kopt, &set.cvalub.column(i).clone_owned()));
        }
        let cub_alt = cub_models.clone();
        let mut ceq_models = Vec::with_capacity(mnleq);
        for i in 0..mnleq {
            ceq_models.push(interpolant(&kkt, &set.xpt, kopt, &set.cvaleq.column(i).clone_owned()));
        }
        let ceq_alt = ceq_models.clone();

        Self {
            xl,
            xu,
            aub,
            bub,
            aeq,
            beq,
            set,
            kkt,
            kopt,
            obj,
            obj_alt,
            cub: cub_models,
            cub_alt,
            ceq: ceq_models,
            ceq_alt,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// Lower bounds in displacement coordinates.
    pub fn xl(&self) -> &Vector {
        &self.xl
    }

    /// Upper bounds in displacement coordinates.
    pub fn xu(&self) -> &Vector {
        &self.xu
    }

    /// Jacobian of the linear inequality constraints.
    pub fn aub(&self) -> &Matrix {
        &self.aub
    }

    /// Right-hand side of the linear inequality constraints.
    pub fn bub(&self) -> &Vector {
        &self.bub
    }

    /// Number of linear inequality constraints.
    pub fn mlub(&self) -> usize {
        self.bub.len()
    }

    /// Jacobian of the linear equality constraints.
    pub fn aeq(&self) -> &Matrix {
        &self.aeq
    }

    /// Right-hand side of the linear equality constraints.
    pub fn beq(&self) -> &Vector {
        &self.beq
    }

    /// Number of linear equality constraints.
    pub fn mleq(&self) -> usize {
        self.beq.len()
    }

    /// Number of nonlinear inequality constraints.
    pub fn mnlub(&self) -> usize {
        self.set.cvalub.ncols()
    }

    /// Number of nonlinear equality constraints.
    pub fn mnleq(&self) -> usize {
        self.set.cvaleq.ncols()
    }

    /// The interpolation set.
    pub fn set(&self) -> &InterpSet {
        &self.set
    }

    /// The factored inverse KKT matrix.
    pub fn kkt(&self) -> &KktFactors {
        &self.kkt
    }

    /// Index of the interpolation point around which the models are
    /// expanded.
    pub fn kopt(&self) -> usize {
        self.kopt
    }

    /// Displacement of the expansion point.
    pub fn xopt(&self) -> Vector {
        self.set.point(self.kopt)
    }

    /// Objective value at the expansion point.
    pub fn fopt(&self) -> Real {
        self.set.fval[self.kopt]
    }

    /// Constraint residual at the expansion point.
    pub fn ropt(&self) -> Real {
        self.set.rval[self.kopt]
    }

    /// Nonlinear inequality constraint values at the expansion point.
    pub fn coptub(&self) -> Vector {
        self.set.cvalub.row(self.kopt).transpose()
    }

    /// Nonlinear equality constraint values at the expansion point.
    pub fn copteq(&self) -> Vector {
        self.set.cvaleq.row(self.kopt).transpose()
    }

    /// Classify the constraints of the problem.
    pub fn problem_type(&self) -> ProblemType {
        let n = self.set.dim();
        if self.mnlub() + self.mnleq() > 0 {
            ProblemType::NonlinearlyConstrained
        } else if self.mlub() + self.mleq() > 0 {
            ProblemType::LinearlyConstrained
        } else if self.xl.iter().all(|&v| v == Real::NEG_INFINITY)
            && self.xu.iter().all(|&v| v == Real::INFINITY)
        {
            ProblemType::Unconstrained
        } else if (0..n)
            .all(|i| self.xu[i] - self.xl[i] <= 10.0 * Real::EPSILON * n as Real * self.xu[i].abs())
        {
            ProblemType::FixedVariables
        } else {
            ProblemType::BoundConstrained
        }
    }

    /// Move the expansion point to the `knew`-th interpolation point,
    /// re-expanding every model around it.
    pub fn set_kopt(&mut self, knew: usize) {
        if self.kopt != knew {
            let step = self.set.point(knew) - self.xopt();
            let xpt = &self.set.xpt;
            self.obj.shift_expansion_point(&step, xpt);
            self.obj_alt.shift_expansion_point(&step, xpt);
            for q in self.cub.iter_mut().chain(self.cub_alt.iter_mut()) {
                q.shift_expansion_point(&step, xpt);
            }
            for q in self.ceq.iter_mut().chain(self.ceq_alt.iter_mut()) {
                q.shift_expansion_point(&step, xpt);
            }
            self.kopt = knew;
        }
    }

    // ── Model evaluations ─────────────────────────────────────────────────

    /// Value of the objective model at `x`.
    pub fn obj(&self, x: &Vector) -> Real {
        self.fopt() + self.obj.value(x, &self.set.xpt, self.kopt)
    }

    /// Gradient of the objective model at `x`.
    pub fn obj_grad(&self, x: &Vector) -> Vector {
        self.obj.grad(x, &self.set.xpt, self.kopt)
    }

    /// Product of the objective model Hessian with `x`.
    pub fn obj_hessp(&self, x: &Vector) -> Vector {
        self.obj.hessp(x, &self.set.xpt)
    }

    /// Curvature of the objective model along `x`.
    pub fn obj_curv(&self, x: &Vector) -> Real {
        self.obj.curv(x, &self.set.xpt)
    }

    /// Value of the `i`-th nonlinear inequality constraint model at `x`.
    pub fn cub_val(&self, x: &Vector, i: usize) -> Real {
        self.coptub()[i] + self.cub[i].value(x, &self.set.xpt, self.kopt)
    }

    /// Gradient of the `i`-th nonlinear inequality constraint model at `x`.
    pub fn cub_grad(&self, x: &Vector, i: usize) -> Vector {
        self.cub[i].grad(x, &self.set.xpt, self.kopt)
    }

    /// Product of the `i`-th inequality constraint model Hessian with `x`.
    pub fn cub_hessp(&self, x: &Vector, i: usize) -> Vector {
        self.cub[i].hessp(x, &self.set.xpt)
    }

    /// Curvature of the `i`-th inequality constraint model along `x`.
    pub fn cub_curv(&self, x: &Vector, i: usize) -> Real {
        self.cub[i].curv(x, &self.set.xpt)
    }

    /// Value of the `i`-th nonlinear equality constraint model at `x`.
    pub fn ceq_val(&self, x: &Vector, i: usize) -> Real {
        self.copteq()[i] + self.ceq[i].value(x, &self.set.xpt, self.kopt)
    }

    /// Gradient of the `i`-th nonlinear equality constraint model at `x`.
    pub fn ceq_grad(&self, x: &Vector, i: usize) -> Vector {
        self.ceq[i].grad(x, &self.set.xpt, self.kopt)
    }

    /// Product of the `i`-th equality constraint model Hessian with `x`.
    pub fn ceq_hessp(&self, x: &Vector, i: usize) -> Vector {
        self.ceq[i].hessp(x, &self.set.xpt)
    }

    /// Curvature of the `i`-th equality constraint model along `x`.
    pub fn ceq_curv(&self, x: &Vector, i: usize) -> Real {
        self.ceq[i].curv(x, &self.set.xpt)
    }

    /// Product of the Hessian of the Lagrangian model with `x`, for the
    /// given multipliers of the nonlinear constraints.
    pub fn lag_hessp(&self, x: &Vector, lmnlub: &Vector, lmnleq: &Vector) -> Vector {
        let mut hx = self.obj_hessp(x);
        for i in 0..self.mnlub() {
            hx += lmnlub[i] * self.cub_hessp(x, i);
        }
        for i in 0..self.mnleq() {
            hx += lmnleq[i] * self.ceq_hessp(x, i);
        }
        hx
    }

    // ── Updates ───────────────────────────────────────────────────────────

    /// Shift the bound constraints and linear right-hand sides by `x`.
    fn shift_constraints(&mut self, x: &Vector) {
        self.xl -= x;
        self.xu -= x;
        self.bub -= &self.aub * x;
        self.beq -= &self.aeq * x;
    }

    /// Move the origin of the displacements to the expansion point.
    ///
    /// The caller accounts for the change of origin in its own base point;
    /// here the factorization, the quadratic models, the constraints, and
    /// the interpolation points are re-expressed.
    pub fn shift_origin(&mut self) {
        let xopt = self.xopt();
        self.kkt.shift_origin(&self.set.xpt, self.kopt);
        let xpt = &self.set.xpt;
        self.obj.shift_interpolation_points(xpt, self.kopt);
        self.obj_alt.shift_interpolation_points(xpt, self.kopt);
        for q in self.cub.iter_mut().chain(self.cub_alt.iter_mut()) {
            q.shift_interpolation_points(xpt, self.kopt);
        }
        for q in self.ceq.iter_mut().chain(self.ceq_alt.iter_mut()) {
            q.shift_interpolation_points(xpt, self.kopt);
        }
        self.shift_constraints(&xopt);
        self.set.translate(&xopt);
    }

    /// Replace one interpolation point by the trial point `xopt + step` and
    /// propagate the swap into the factorization and every model.
    ///
    /// `knew` forces the index to remove; when absent it is chosen to
    /// maximize the weighted denominator of the updating formula. Returns
    /// the replaced index. On [`dfo_core::Error::NumericBreakdown`] the
    /// observable state is unchanged.
    pub fn update(
        &mut self,
        step: &Vector,
        fx: Real,
        cubx: &Vector,
        ceqx: &Vector,
        knew: Option<usize>,
    ) -> Result<usize> {
        let (beta, mut vlag) = self.kkt.lagrange_values(&self.set.xpt, self.kopt, step);
        let knew = knew.unwrap_or_else(|| {
            self.kkt
                .choose_removal(beta, &vlag, &self.set.xpt, self.kopt)
        });
        self.kkt.update(knew, beta, &mut vlag)?;

        // Record the new data. The model differences are taken against the
        // previous models before any of them is touched.
        let xnew = self.xopt() + step;
        let xold = self.set.point(knew);
        let dfx = fx - self.obj(&xnew);
        let mut dcubx = Vector::zeros(self.mnlub());
        for i in 0..self.mnlub() {
            dcubx[i] = cubx[i] - self.cub_val(&xnew, i);
        }
        let mut dceqx = Vector::zeros(self.mnleq());
        for i in 0..self.mnleq() {
            dceqx[i] = ceqx[i] - self.ceq_val(&xnew, i);
        }
        self.set.fval[knew] = fx;
        self.set.cvalub.row_mut(knew).copy_from(&cubx.transpose());
        self.set.cvaleq.row_mut(knew).copy_from(&ceqx.transpose());
        self.set.xpt.row_mut(knew).copy_from(&xnew.transpose());
        self.set.rval[knew] = residual(
            &xnew,
            cubx,
            ceqx,
            &self.xl,
            &self.xu,
            &self.aub,
            &self.bub,
            &self.aeq,
            &self.beq,
        );

        // Standard models absorb the change incrementally; alternative
        // models are rebuilt from the fresh value vectors.
        refresh(
            &mut self.obj,
            RefreshRule::Incremental,
            &self.set.fval.clone_owned(),
            &self.set.xpt,
            self.kopt,
            &xold,
            &self.kkt,
            knew,
            dfx,
        );
        refresh(
            &mut self.obj_alt,
            RefreshRule::Rebuild,
            &self.set.fval.clone_owned(),
            &self.set.xpt,
            self.kopt,
            &xold,
            &self.kkt,
            knew,
            dfx,
        );
        for i in 0..self.mnlub() {
            let values = self.set.cvalub.column(i).clone_owned();
            refresh(
                &mut self.cub[i],
                RefreshRule::Incremental,
                &values,
                &self.set.xpt,
                self.kopt,
                &xold,
                &self.kkt,
                knew,
                dcubx[i],
            );
            refresh(
                &mut self.cub_alt[i],
                RefreshRule::Rebuild,
                &values,
                &self.set.xpt,
                self.kopt,
                &xold,
                &self.kkt,
                knew,
                dcubx[i],
            );
        }
        for i in 0..self.mnleq() {
            let values = self.set.cvaleq.column(i).clone_owned();
            refresh(
                &mut self.ceq[i],
                RefreshRule::Incremental,
                &values,
                &self.set.xpt,
                self.kopt,
                &xold,
                &self.kkt,
                knew,
                dceqx[i],
            );
            refresh(
                &mut self.ceq_alt[i],
                RefreshRule::Rebuild,
                &values,
                &self.set.xpt,
                self.kopt,
                &xold,
                &self.kkt,
                knew,
                dceqx[i],
            );
        }
        Ok(knew)
    }

    /// Replace the standard models by the alternative ones, whose Hessian
    /// matrices are least in Frobenius norm.
    pub fn reset_models(&mut self) {
        self.obj = self.obj_alt.clone();
        self.cub = self.cub_alt.clone();
        self.ceq = self.ceq_alt.clone();
    }

    /// Estimate a step from the expansion point that improves the geometry
    /// of the interpolation set when the `klag`-th point is replaced.
    ///
    /// Two candidates are weighed: a step on the chords joining the
    /// expansion point to the other interpolation points, and a constrained
    /// Cauchy step on the `klag`-th Lagrange polynomial. The one promising
    /// the larger denominator of the updating formula wins.
    pub fn improve_geometry(&self, klag: usize, delta: Real) -> Vector {
        let npt = self.set.npt();
        let tol = 10.0 * Real::EPSILON * npt as Real;
        let lag = self.lagrange_model(klag);
        let omega = omega_column(&self.kkt.zmat, self.kkt.idz, klag);
        let alpha = omega[klag];
        let xopt = self.xopt();
        let glag = lag.grad(&xopt, &self.set.xpt, self.kopt);

        let step = bvlag(
            &self.set.xpt,
            self.kopt,
            klag,
            &glag,
            &self.xl,
            &self.xu,
            delta,
            alpha,
        );
        let curv = |s: &Vector| lag.curv(s, &self.set.xpt);
        let (salt, cauchy) = bvcs(
            &self.set.xpt,
            self.kopt,
            &glag,
            &curv,
            &self.xl,
            &self.xu,
            delta,
        );

        let (beta, vlag) = self.kkt.lagrange_values(&self.set.xpt, self.kopt, &step);
        let sigma = vlag[klag] * vlag[klag] + alpha * beta;
        if sigma < cauchy && cauchy > tol * sigma.abs().max(1.0) {
            salt
        } else {
            step
        }
    }

    /// Constraint residual at an arbitrary displacement `x` with observed
    /// nonlinear constraint values.
    pub fn resid(&self, x: &Vector, cubx: &Vector, ceqx: &Vector) -> Real {
        residual(
            x, cubx, ceqx, &self.xl, &self.xu, &self.aub, &self.bub, &self.aeq, &self.beq,
        )
    }

    /// Constraint residual of the `k`-th interpolation point.
    pub fn resid_point(&self, k: usize) -> Real {
        residual(
            &self.set.point(k),
            &self.set.cvalub.row(k).transpose(),
            &self.set.cvaleq.row(k).transpose(),
            &self.xl,
            &self.xu,
            &self.aub,
            &self.bub,
            &self.aeq,
            &self.beq,
        )
    }

    /// Check that every model satisfies its interpolation conditions,
    /// warning when the error is beyond roundoff.
    pub fn check_models(&self) {
        let npt = self.set.npt();
        let check = |q: &Quadratic, values: &Vector, what: &str| {
            let vmax = values.iter().fold(1.0_f64, |a, &v| a.max(v.abs()));
            let tol = 10.0 * Real::EPSILON.sqrt() * npt as Real * vmax;
            let diff = q.interpolation_error(&self.set.xpt, values, self.kopt);
            if diff > tol {
                log::warn!("error in interpolation conditions of {what} is {diff:e}");
            }
        };
        check(&self.obj, &self.set.fval.clone_owned(), "the objective model");
        for i in 0..self.mnlub() {
            check(
                &self.cub[i],
                &self.set.cvalub.column(i).clone_owned(),
                "an inequality constraint model",
            );
        }
        for i in 0..self.mnleq() {
            check(
                &self.ceq[i],
                &self.set.cvaleq.column(i).clone_owned(),
                "an equality constraint model",
            );
        }
    }

    /// Least-Frobenius-norm interpolant of a value vector, expanded around
    /// the current best point.
    pub fn new_model(&self, values: &Vector) -> Quadratic {
        interpolant(&self.kkt, &self.set.xpt, self.kopt, values)
    }

    /// The `klag`-th Lagrange polynomial, expanded around the current best
    /// point.
    pub fn lagrange_model(&self, klag: usize) -> Quadratic {
        let mut lag = Quadratic::lagrange(&self.kkt.bmat, &self.kkt.zmat, self.kkt.idz, klag);
        lag.shift_expansion_point(&self.xopt(), &self.set.xpt);
        lag
    }
}

/// Build the least-Frobenius-norm interpolant of `values` and expand it
/// around `xpt[kopt, :]`.
fn interpolant(kkt: &KktFactors, xpt: &Matrix, kopt: usize, values: &Vector) -> Quadratic {
    let mut q = Quadratic::new(&kkt.bmat, &kkt.zmat, kkt.idz, values);
    q.shift_expansion_point(&xpt.row(kopt).transpose(), xpt);
    q
}

/// Apply the refresh rule of a model after an interpolation-point swap.
#[allow(clippy::too_many_arguments)]
fn refresh(
    q: &mut Quadratic,
    rule: RefreshRule,
    values: &Vector,
    xpt: &Matrix,
    kopt: usize,
    xold: &Vector,
    kkt: &KktFactors,
    knew: usize,
    diff: Real,
) {
    match rule {
        RefreshRule::Incremental => {
            q.update(xpt, kopt, xold, &kkt.bmat, &kkt.zmat, kkt.idz, knew, diff);
        }
        RefreshRule::Rebuild => {
            *q = interpolant(kkt, xpt, kopt, values);
        }
    }
}

/// Scalar residual of all constraints at a displacement `x`: the largest of
/// the inequality violations, the absolute equality violations, and the
/// signed bound excesses, floored at zero.
#[allow(clippy::too_many_arguments)]
fn residual(
    x: &Vector,
    cubx: &Vector,
    ceqx: &Vector,
    xl: &Vector,
    xu: &Vector,
    aub: &Matrix,
    bub: &Vector,
    aeq: &Matrix,
    beq: &Vector,
) -> Real {
    let mut r = 0.0_f64;
    let lub = aub * x - bub;
    for v in lub.iter() {
        r = r.max(*v);
    }
    for v in cubx.iter() {
        r = r.max(*v);
    }
    let leq = aeq * x - beq;
    for v in leq.iter() {
        r = r.max(v.abs());
    }
    for v in ceqx.iter() {
        r = r.max(v.abs());
    }
    for i in 0..x.len() {
        r = r.max(x[i] - xu[i]);
        r = r.max(xl[i] - x[i]);
    }
    r
}

fn eval_constraint(con: &mut Option<ConstraintFn>, x: &Vector) -> Vector {
    match con {
        Some(f) => f(x),
        None => Vector::zeros(0),
    }
}
