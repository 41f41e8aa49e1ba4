//! The trust-region iteration around the interpolation models.
//!
//! Owns the penalty coefficients, the least-squares Lagrange multipliers,
//! the pending geometry-improvement index, and the evaluation counter, and
//! mediates between the outer driver and the model container: it derives
//! composite trust-region steps and geometry steps, evaluates the merit
//! function, and commits trial points into the models.

use dfo_core::{ensure, Error, Real, Result};
use dfo_linalg::{bvtcg, cpqp, lctcg, nnls, Matrix, Vector};

use crate::models::{Models, ProblemType};
use crate::options::{Options, ResolvedOptions};
use crate::problem::{ConstraintFn, ObjectiveFn, Problem};

/// State of a nonlinearly constrained problem under trust-region iteration.
pub struct TrustRegion {
    fun: ObjectiveFn,
    cub: Option<ConstraintFn>,
    ceq: Option<ConstraintFn>,
    xbase: Vector,
    models: Models,
    options: ResolvedOptions,
    penub: Real,
    peneq: Real,
    lmlub: Vector,
    lmleq: Vector,
    lmnlub: Vector,
    lmnleq: Vector,
    knew: Option<usize>,
    nfev: usize,
}

impl TrustRegion {
    /// Construct the solver state: adjust the starting point against the
    /// bounds, lay out the initial interpolation set, estimate the Lagrange
    /// multipliers, and select the incumbent by merit.
    pub fn new(problem: Problem, options: &Options) -> Result<Self> {
        let n = problem.dim();
        ensure!(n > 0, "the problem must have at least one variable");
        let Problem {
            mut fun,
            x0,
            xl,
            xu,
            aub,
            bub,
            aeq,
            beq,
            mut cub,
            mut ceq,
        } = problem;
        ensure!(xl.len() == n && xu.len() == n, "bounds must have length {n}");
        ensure!(
            aub.nrows() == bub.len() && aub.ncols() == n,
            "inconsistent linear inequality constraints"
        );
        ensure!(
            aeq.nrows() == beq.len() && aeq.ncols() == n,
            "inconsistent linear equality constraints"
        );
        ensure!(
            (0..n).all(|i| xl[i] <= xu[i]),
            "the bound constraints must be consistent"
        );

        let mut options = options.resolve(n);
        let half_range = 0.5
            * (0..n)
                .map(|i| xu[i] - xl[i])
                .fold(Real::INFINITY, Real::min);
        options.clamp_by_bounds(half_range);
        let rhobeg = options.rhobeg;

        // Project the initial guess onto the bounds, then nudge it so that
        // each component either equals a bound or leaves room for the
        // initial trust region on that coordinate.
        let mut x0 = x0;
        for i in 0..n {
            x0[i] = x0[i].max(xl[i]).min(xu[i]);
            if x0[i] - xl[i] <= rhobeg && xl[i] < x0[i] {
                x0[i] = xl[i] + rhobeg;
            }
            if xu[i] - x0[i] <= rhobeg && x0[i] < xu[i] {
                x0[i] = xu[i] - rhobeg;
            }
        }
        let xbase = x0;

        let models = Models::new(
            &mut fun,
            &mut cub,
            &mut ceq,
            &xbase,
            xl,
            xu,
            aub,
            bub,
            aeq,
            beq,
            options.npt,
            rhobeg,
        );
        let npt = options.npt;
        let mut state = Self {
            fun,
            cub,
            ceq,
            xbase,
            lmlub: Vector::zeros(models.mlub()),
            lmleq: Vector::zeros(models.mleq()),
            lmnlub: Vector::zeros(models.mnlub()),
            lmnleq: Vector::zeros(models.mnleq()),
            models,
            options,
            penub: 0.0,
            peneq: 0.0,
            knew: None,
            nfev: npt,
        };
        state.update_multipliers();

        // The incumbent is the interpolation point of least merit.
        let mut kopt = 0;
        let mut mopt = Real::INFINITY;
        for k in 0..npt {
            let mval = state.merit(
                &state.models.set().point(k),
                state.models.set().fval()[k],
                &state.models.set().cvalub().row(k).transpose(),
                &state.models.set().cvaleq().row(k).transpose(),
            );
            if mval < mopt {
                mopt = mval;
                kopt = k;
            }
        }
        state.models.set_kopt(kopt);
        if state.options.debug {
            state.models.check_models();
        }
        Ok(state)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The model container.
    pub fn models(&self) -> &Models {
        &self.models
    }

    /// Resolved options of the solver.
    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Origin of the displacement coordinates.
    pub fn xbase(&self) -> &Vector {
        &self.xbase
    }

    /// Index of the incumbent.
    pub fn kopt(&self) -> usize {
        self.models.kopt()
    }

    /// Displacement of the incumbent from the origin.
    pub fn xopt(&self) -> Vector {
        self.models.xopt()
    }

    /// Incumbent in the coordinates of the user.
    pub fn x_absolute(&self) -> Vector {
        &self.xbase + self.xopt()
    }

    /// Objective value at the incumbent.
    pub fn fopt(&self) -> Real {
        self.models.fopt()
    }

    /// Constraint violation at the incumbent.
    pub fn maxcv(&self) -> Real {
        self.models.ropt()
    }

    /// Constraint classification of the problem.
    pub fn problem_type(&self) -> ProblemType {
        self.models.problem_type()
    }

    /// Number of objective evaluations so far.
    pub fn nfev(&self) -> usize {
        self.nfev
    }

    /// Penalty coefficient of the inequality constraints.
    pub fn penub(&self) -> Real {
        self.penub
    }

    /// Penalty coefficient of the equality constraints.
    pub fn peneq(&self) -> Real {
        self.peneq
    }

    /// Whether the pending step is a geometry-improvement step.
    pub fn is_model_step(&self) -> bool {
        self.knew.is_some()
    }

    /// Index of the interpolation point a pending geometry step replaces.
    pub fn knew(&self) -> Option<usize> {
        self.knew
    }

    fn has_constraints(&self) -> bool {
        self.models.mlub() + self.models.mnlub() + self.models.mleq() + self.models.mnleq() > 0
    }

    // ── Merit machinery ───────────────────────────────────────────────────

    /// Merit value at `x` given the observed function and constraint
    /// values.
    pub fn merit(&self, x: &Vector, fx: Real, cubx: &Vector, ceqx: &Vector) -> Real {
        self.merit_impl(x, fx, cubx, ceqx, false).0
    }

    /// Merit value at `x` together with the merit of the modelled problem.
    pub fn merit_with_model(
        &self,
        x: &Vector,
        fx: Real,
        cubx: &Vector,
        ceqx: &Vector,
    ) -> (Real, Real) {
        self.merit_impl(x, fx, cubx, ceqx, true)
    }

    fn merit_impl(
        &self,
        x: &Vector,
        fx: Real,
        cubx: &Vector,
        ceqx: &Vector,
        model: bool,
    ) -> (Real, Real) {
        let tiny = Real::MIN_POSITIVE;
        let mut ax = fx;
        let mut mx = 0.0;
        if self.penub.abs() > tiny * max_abs(&self.lmlub, 0.0) {
            let tub = (self.models.aub() * x - self.models.bub() + &self.lmlub / self.penub)
                .map(|v| v.max(0.0));
            let alub = 0.5 * self.penub * tub.norm_squared();
            ax += alub;
            mx += alub;
        }
        let lmnlub_max = max_abs(&self.lmnlub, 0.0);
        if self.penub.abs() > tiny * lmnlub_max {
            let tub = (cubx + &self.lmnlub / self.penub).map(|v| v.max(0.0));
            ax += 0.5 * self.penub * tub.norm_squared();
        }
        if self.peneq.abs() > tiny * max_abs(&self.lmleq, 0.0) {
            let teq = self.models.aeq() * x - self.models.beq() + &self.lmleq / self.peneq;
            let aleq = 0.5 * self.peneq * teq.norm_squared();
            ax += aleq;
            mx += aleq;
        }
        let lmnleq_max = max_abs(&self.lmnleq, 0.0);
        if self.peneq.abs() > tiny * lmnleq_max {
            let teq = ceqx + &self.lmnleq / self.peneq;
            ax += 0.5 * self.peneq * teq.norm_squared();
        }
        if model {
            mx += self.models.obj(x);
            if self.penub.abs() > tiny * lmnlub_max {
                let mut tub = &self.lmnlub / self.penub;
                for i in 0..self.models.mnlub() {
                    tub[i] += self.models.cub_val(x, i);
                }
                let tub = tub.map(|v| v.max(0.0));
                mx += 0.5 * self.penub * tub.norm_squared();
            }
            if self.peneq.abs() > tiny * lmnleq_max {
                let mut teq = &self.lmnleq / self.peneq;
                for i in 0..self.models.mnleq() {
                    teq[i] += self.models.ceq_val(x, i);
                }
                mx += 0.5 * self.peneq * teq.norm_squared();
            }
        }
        (ax, mx)
    }

    /// Strict merit comparison with the residual tiebreak: the candidate
    /// beats the reference if its merit is lower, or, when the penalties are
    /// negligible, if the merits tie within roundoff and its residual is
    /// lower.
    pub fn less_merit(&self, mval1: Real, rval1: Real, mval2: Real, rval2: Real) -> bool {
        let tol = 10.0 * Real::EPSILON * self.models.set().npt() as Real * mval2.abs().max(1.0);
        if mval1 < mval2 {
            return true;
        }
        if self.penub.max(self.peneq) < tol && (mval1 - mval2).abs() <= tol && rval1 < rval2 {
            return true;
        }
        false
    }

    /// Index of the best interpolation point under the strict-then-tied
    /// merit ordering.
    pub fn get_best_point(&self) -> usize {
        let npt = self.models.set().npt();
        let mut kopt = self.models.kopt();
        let mut mopt = self.merit(
            &self.models.xopt(),
            self.models.fopt(),
            &self.models.coptub(),
            &self.models.copteq(),
        );
        for k in 0..npt {
            if k != kopt {
                let mval = self.merit(
                    &self.models.set().point(k),
                    self.models.set().fval()[k],
                    &self.models.set().cvalub().row(k).transpose(),
                    &self.models.set().cvaleq().row(k).transpose(),
                );
                if self.less_merit(
                    mval,
                    self.models.set().rval()[k],
                    mopt,
                    self.models.set().rval()[kopt],
                ) {
                    kopt = k;
                    mopt = mval;
                }
            }
        }
        kopt
    }

    // ── Step selection ────────────────────────────────────────────────────

    /// Arrange for the next step to be a trust-region step.
    pub fn prepare_trust_region_step(&mut self) {
        self.knew = None;
    }

    /// Arrange for the next step to replace the interpolation point
    /// furthest from the incumbent, provided it is further than `delta`.
    pub fn prepare_model_step(&mut self, delta: Real) {
        let dsq = self.models.set().dist_sq_from(self.models.kopt());
        let mut knew = None;
        let mut best = delta * delta;
        for k in 0..self.models.set().npt() {
            if dsq[k] > best {
                best = dsq[k];
                knew = Some(k);
            }
        }
        self.knew = knew;
    }

    /// Evaluate a Byrd–Omojokun composite trust-region step.
    ///
    /// The normal step reduces the violations of the linearized constraints
    /// inside a shrunken ball, leaving elbow room for the tangential step,
    /// which then reduces the Lagrangian model within the residual radius.
    pub fn trust_region_step(&self, delta: Real) -> Vector {
        let n = self.models.set().dim();
        let tol = 10.0 * Real::EPSILON * n as Real;
        let xopt = self.models.xopt();
        let mut delta = delta * (0.5_f64).sqrt();
        let nsf = 0.8;

        // Linearize the nonlinear constraint models at the incumbent.
        let mc =
            self.models.mlub() + self.models.mnlub() + self.models.mleq() + self.models.mnleq();
        let mut aub = self.models.aub().clone();
        let mut bub = self.models.bub().clone();
        for i in 0..self.models.mnlub() {
            let mut lhs = self.models.cub_grad(&xopt, i);
            let mut rhs = xopt.dot(&lhs) - self.models.coptub()[i];
            lhs -= self.models.cub_hessp(&xopt, i);
            rhs -= 0.5 * self.models.cub_curv(&xopt, i);
            aub = stack_row(&aub, &lhs);
            bub = push(&bub, rhs);
        }
        let mut aeq = self.models.aeq().clone();
        let mut beq = self.models.beq().clone();
        for i in 0..self.models.mnleq() {
            let mut lhs = self.models.ceq_grad(&xopt, i);
            let mut rhs = xopt.dot(&lhs) - self.models.copteq()[i];
            lhs -= self.models.ceq_hessp(&xopt, i);
            rhs -= 0.5 * self.models.ceq_curv(&xopt, i);
            aeq = stack_row(&aeq, &lhs);
            beq = push(&beq, rhs);
        }

        // Normal step.
        let (nstep, ssq) = if mc == 0 {
            (Vector::zeros(n), 0.0)
        } else {
            let nstep = cpqp(
                &xopt,
                &aub,
                &bub,
                &aeq,
                &beq,
                self.models.xl(),
                self.models.xu(),
                nsf * delta,
            );
            let ssq = nstep.norm_squared();
            (nstep, ssq)
        };
        let nstep = if ssq.sqrt() <= tol * delta.max(1.0) {
            delta *= (2.0_f64).sqrt();
            Vector::zeros(n)
        } else {
            delta = (delta * delta - ssq).sqrt();
            nstep
        };

        // Tangential step in the residual ball around the shifted point.
        let xsft = &xopt + &nstep;
        let gopt = self.models.obj_grad(&xsft);
        let models = &self.models;
        let lmnlub = &self.lmnlub;
        let lmnleq = &self.lmnleq;
        let hessp = |v: &Vector| models.lag_hessp(v, lmnlub, lmnleq);
        let tstep = if mc == 0 {
            bvtcg(
                &xsft,
                &gopt,
                &hessp,
                self.models.xl(),
                self.models.xu(),
                delta,
            )
        } else {
            let lift = &aub * &xsft;
            for i in 0..bub.len() {
                bub[i] = bub[i].max(lift[i]);
            }
            let beq = &aeq * &xsft;
            lctcg(
                &xsft,
                &gopt,
                &hessp,
                &aub,
                &bub,
                &aeq,
                &beq,
                self.models.xl(),
                self.models.xu(),
                delta,
            )
        };
        nstep + tstep
    }

    /// Evaluate the pending geometry-improvement step.
    pub fn model_step(&self, delta: Real) -> Result<Vector> {
        match self.knew {
            Some(knew) => Ok(self.models.improve_geometry(knew, delta)),
            None => Err(Error::Runtime(
                "no geometry step is pending; call prepare_model_step first".into(),
            )),
        }
    }

    // ── Updates ───────────────────────────────────────────────────────────

    /// Move the origin of the calculations to the incumbent when its
    /// displacement is substantial against the trust-region radius.
    /// Idempotent otherwise.
    pub fn shift_origin(&mut self, delta: Real) {
        let xopt = self.models.xopt();
        if xopt.norm_squared() >= 10.0 * delta * delta {
            self.xbase += xopt;
            self.models.shift_origin();
            if self.options.debug {
                self.models.check_models();
            }
        }
    }

    /// Evaluate the trial point `xopt + step`, include it in the
    /// interpolation set, and return the new merit of the incumbent and the
    /// trust-region ratio.
    ///
    /// Raises [`Error::RestartRequired`] when a penalty increase moved the
    /// incumbent, in which case the caller must re-derive its step, and
    /// surfaces [`Error::NumericBreakdown`] from the factorization.
    pub fn update(&mut self, step: &Vector) -> Result<(Real, Real)> {
        let xsav = self.models.xopt();
        let xnew = &xsav + step;
        let x = &self.xbase + &xnew;
        let fx = (self.fun)(&x);
        self.nfev += 1;
        let cubx = match &mut self.cub {
            Some(f) => f(&x),
            None => Vector::zeros(0),
        };
        let ceqx = match &mut self.ceq {
            Some(f) => f(&x),
            None => Vector::zeros(0),
        };

        // Refresh the multipliers, then raise the penalties until the trial
        // point stops looking better than it is.
        self.update_multipliers();
        let ksav = self.models.kopt();
        let (mx, mmx, mut mopt) = self.update_penalty_coefficients(&xnew, fx, &cubx, &ceqx);
        if ksav != self.models.kopt() {
            self.prepare_trust_region_step();
            return Err(Error::RestartRequired);
        }

        let tiny = Real::MIN_POSITIVE;
        let ratio = if !self.is_model_step() && (mopt - mmx).abs() > tiny * (mopt - mx).abs() {
            (mopt - mx) / (mopt - mmx)
        } else {
            -1.0
        };

        let rx = self.models.resid(&xnew, &cubx, &ceqx);
        let knew = self.models.update(step, fx, &cubx, &ceqx, self.knew)?;
        self.knew = Some(knew);
        if self.less_merit(mx, rx, mopt, self.maxcv()) {
            self.models.set_kopt(knew);
            mopt = mx;
        }
        if self.options.debug {
            self.models.check_models();
        }
        Ok((mopt, ratio))
    }

    /// Recompute the least-squares Lagrange multipliers at the incumbent,
    /// zeroing the inequality multipliers fixed by complementary slackness.
    pub fn update_multipliers(&mut self) {
        if !self.has_constraints() {
            return;
        }
        let n = self.models.set().dim();
        let xopt = self.models.xopt();
        let mlub = self.models.mlub();
        let mnlub = self.models.mnlub();
        let mleq = self.models.mleq();
        let mnleq = self.models.mnleq();

        // Active linear inequality rows.
        let tol = 10.0 * Real::EPSILON * mlub as Real * max_abs(self.models.bub(), 1.0);
        let rub = self.models.aub() * &xopt - self.models.bub();
        let ilub: Vec<bool> = (0..mlub).map(|i| rub[i].abs() <= tol).collect();
        let nact_lin = ilub.iter().filter(|&&b| b).count();

        // Active nonlinear inequality constraints, with the model Jacobian
        // taken at the incumbent.
        let coptub = self.models.coptub();
        let tol = 10.0 * Real::EPSILON * mlub as Real * max_abs(&coptub, 1.0);
        let inlub: Vec<bool> = (0..mnlub).map(|i| coptub[i].abs() <= tol).collect();
        let nact_nl = inlub.iter().filter(|&&b| b).count();

        let mut rows: Vec<Vector> = Vec::new();
        for i in 0..mlub {
            if ilub[i] {
                rows.push(self.models.aub().row(i).transpose());
            }
        }
        for i in 0..mnlub {
            if inlub[i] {
                rows.push(self.models.cub_grad(&xopt, i) - self.models.cub_hessp(&xopt, i));
            }
        }
        for i in 0..mleq {
            rows.push(self.models.aeq().row(i).transpose());
        }
        for i in 0..mnleq {
            rows.push(self.models.ceq_grad(&xopt, i) - self.models.ceq_hessp(&xopt, i));
        }
        let mut a = Matrix::zeros(n, rows.len());
        for (j, row) in rows.iter().enumerate() {
            a.column_mut(j).copy_from(row);
        }
        let gopt = self.models.obj_grad(&xopt);
        let lm = nnls(&a, &(-gopt), nact_lin + nact_nl);

        self.lmlub.fill(0.0);
        self.lmnlub.fill(0.0);
        let mut pos = 0;
        for i in 0..mlub {
            if ilub[i] {
                self.lmlub[i] = lm[pos];
                pos += 1;
            }
        }
        for i in 0..mnlub {
            if inlub[i] {
                self.lmnlub[i] = lm[pos];
                pos += 1;
            }
        }
        for i in 0..mleq {
            self.lmleq[i] = lm[pos];
            pos += 1;
        }
        for i in 0..mnleq {
            self.lmnleq[i] = lm[pos];
            pos += 1;
        }
    }

    /// Double the penalty coefficients until the trial point is no longer
    /// better in the modelled merit than the incumbent, re-selecting the
    /// incumbent along the way.
    fn update_penalty_coefficients(
        &mut self,
        xnew: &Vector,
        fx: Real,
        cubx: &Vector,
        ceqx: &Vector,
    ) -> (Real, Real, Real) {
        let (mut mx, mut mmx) = self.merit_with_model(xnew, fx, cubx, ceqx);
        let mut mopt = self.merit(
            &self.models.xopt(),
            self.models.fopt(),
            &self.models.coptub(),
            &self.models.copteq(),
        );
        if !self.is_model_step() && mmx > mopt && self.has_constraints() {
            let ksav = self.models.kopt();
            while ksav == self.models.kopt() && mmx > mopt {
                if self.penub > 0.0 {
                    self.penub *= 2.0;
                } else if self.models.mlub() + self.models.mnlub() > 0 {
                    self.penub = 1.0;
                }
                if self.peneq > 0.0 {
                    self.peneq *= 2.0;
                } else if self.models.mleq() + self.models.mnleq() > 0 {
                    self.peneq = 1.0;
                }
                let both = self.merit_with_model(xnew, fx, cubx, ceqx);
                mx = both.0;
                mmx = both.1;
                let kbest = self.get_best_point();
                self.models.set_kopt(kbest);
                mopt = self.merit(
                    &self.models.xopt(),
                    self.models.fopt(),
                    &self.models.coptub(),
                    &self.models.copteq(),
                );
            }
        }
        (mx, mmx, mopt)
    }

    /// Lower the penalty coefficients between major iterations from the
    /// spread of the objective and constraint values over the interpolation
    /// set.
    pub fn reduce_penalty_coefficients(&mut self) {
        let fval = self.models.set().fval();
        let fmin = fval.min();
        let fmax = fval.max();
        if self.penub > 0.0 {
            let denom = penalty_denominator(
                self.models.set().xpt(),
                self.models.aub(),
                self.models.bub(),
                self.models.set().cvalub(),
                false,
            );
            self.penub = match denom {
                Some(d) => (fmax - fmin) / d,
                None => 0.0,
            };
        }
        if self.peneq > 0.0 {
            let denom = penalty_denominator(
                self.models.set().xpt(),
                self.models.aeq(),
                self.models.beq(),
                self.models.set().cvaleq(),
                true,
            );
            self.peneq = match denom {
                Some(d) => (fmax - fmin) / d,
                None => 0.0,
            };
        }
    }

    /// Replace the standard models by the alternative ones.
    pub fn reset_models(&mut self) {
        self.models.reset_models();
    }
}

/// Smallest admissible spread `cmax_k - cmin_k` over the interpolation
/// points, where the per-point extrema of the constraint values are floored
/// and capped at zero. Returns `None` when no point passes the
/// admissibility test.
fn penalty_denominator(
    xpt: &Matrix,
    a: &Matrix,
    b: &Vector,
    cval: &Matrix,
    equality: bool,
) -> Option<Real> {
    let npt = xpt.nrows();
    let mut denom: Option<Real> = None;
    let lin = xpt * a.transpose();
    for k in 0..npt {
        let mut cmin = 0.0_f64;
        let mut cmax = 0.0_f64;
        for j in 0..b.len() {
            let r = lin[(k, j)] - b[j];
            cmin = cmin.min(r);
            cmax = cmax.max(r);
        }
        for j in 0..cval.ncols() {
            let r = cval[(k, j)];
            cmin = cmin.min(r);
            cmax = cmax.max(r);
        }
        let admissible = if equality {
            cmin < 2.0 * cmax || cmin < 0.5 * cmax
        } else {
            cmin < 2.0 * cmax
        };
        if admissible {
            let spread = cmax - cmin;
            denom = Some(match denom {
                Some(d) => d.min(spread),
                None => spread,
            });
        }
    }
    denom.filter(|&d| d > 0.0)
}

fn max_abs(v: &Vector, init: Real) -> Real {
    v.iter().fold(init, |acc, &x| acc.max(x.abs()))
}

fn stack_row(a: &Matrix, row: &Vector) -> Matrix {
    let mut out = Matrix::zeros(a.nrows() + 1, a.ncols());
    out.rows_mut(0, a.nrows()).copy_from(a);
    out.row_mut(a.nrows()).copy_from(&row.transpose());
    out
}

fn push(v: &Vector, value: Real) -> Vector {
    let mut out = Vector::zeros(v.len() + 1);
    out.rows_mut(0, v.len()).copy_from(v);
    out[v.len()] = value;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_state() -> TrustRegion {
        let problem = Problem::new(|x: &Vector| x.norm_squared(), &[1.0, 1.0]);
        TrustRegion::new(problem, &Options::default()).unwrap()
    }

    #[test]
    fn construction_selects_a_best_point() {
        let state = sphere_state();
        assert!(state.kopt() < state.models().set().npt());
        assert_eq!(state.nfev(), state.models().set().npt());
        assert_eq!(state.problem_type(), ProblemType::Unconstrained);
        // The incumbent has the least objective value of the set, since the
        // problem is unconstrained and the merit reduces to the objective.
        let fopt = state.fopt();
        for k in 0..state.models().set().npt() {
            assert!(fopt <= state.models().set().fval()[k] + 1e-12);
        }
    }

    #[test]
    fn trust_region_step_decreases_the_model() {
        let mut state = sphere_state();
        state.prepare_trust_region_step();
        let d = state.trust_region_step(0.5);
        assert!(d.norm() <= 0.5 + 1e-10);
        let xopt = state.xopt();
        let before = state.models().obj(&xopt);
        let after = state.models().obj(&(&xopt + &d));
        assert!(after <= before + 1e-12, "model rose: {before} -> {after}");
    }

    #[test]
    fn update_accepts_an_improving_point() {
        let mut state = sphere_state();
        state.prepare_trust_region_step();
        let d = state.trust_region_step(0.5);
        let fopt_before = state.fopt();
        let (mopt, ratio) = state.update(&d).unwrap();
        assert!(mopt <= fopt_before + 1e-12);
        assert!(ratio.is_finite());
        assert_eq!(state.nfev(), state.models().set().npt() + 1);
    }

    #[test]
    fn model_step_requires_preparation() {
        let mut state = sphere_state();
        state.prepare_trust_region_step();
        assert!(state.model_step(0.5).is_err());
        state.prepare_model_step(1e-8);
        assert!(state.is_model_step());
        let d = state.model_step(0.5).unwrap();
        assert!(d.norm() <= 0.5 + 1e-10);
    }

    #[test]
    fn geometry_updates_keep_interpolation() {
        let mut state = sphere_state();
        state.prepare_model_step(1e-8);
        let d = state.model_step(0.5).unwrap();
        let (_, ratio) = state.update(&d).unwrap();
        // Geometry steps bypass the trust-region ratio.
        assert_eq!(ratio, -1.0);
    }

    #[test]
    fn origin_shift_is_idempotent_near_the_origin() {
        let mut state = sphere_state();
        let base = state.xbase().clone();
        state.shift_origin(10.0);
        assert_eq!(state.xbase(), &base);
    }

    #[test]
    fn merit_reduces_to_objective_without_penalties() {
        let state = sphere_state();
        let x = state.xopt();
        let none = Vector::zeros(0);
        let m = state.merit(&x, 3.5, &none, &none);
        assert_eq!(m, 3.5);
    }

    #[test]
    fn penalties_activate_on_model_worse_trials() {
        // Equality-constrained sphere: the merit machinery must engage the
        // equality penalty when a trial looks better in the raw objective
        // than the incumbent but violates the constraint.
        let aeq = Matrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]);
        let problem = Problem::new(|x: &Vector| x.norm_squared(), &[0.4, 0.3, 0.3])
            .linear_eq(aeq, &[1.0]);
        let mut state = TrustRegion::new(problem, &Options::default()).unwrap();
        state.prepare_trust_region_step();
        let d = state.trust_region_step(0.5);
        match state.update(&d) {
            Ok((mopt, _)) => assert!(mopt.is_finite()),
            Err(Error::RestartRequired) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
