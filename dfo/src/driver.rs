//! Outer driver of the trust-region iteration.
//!
//! Runs the classical derivative-free trust-region management around the
//! core: trust-region steps are taken while they make progress, the radius
//! follows the agreement between the merit function and its model, geometry
//! steps are interleaved when far interpolation points spoil the models, and
//! the lower bound on the radius decreases on a fixed schedule until the
//! terminal scale is reached.

use dfo_core::{Error, Real, Result};
use dfo_linalg::Vector;
use dfo_model::{Options, Problem, TrustRegion};

/// Reason the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The lower bound on the trust-region radius reached its terminal
    /// value.
    RadiusReached,
    /// The objective reached the target value at a feasible point.
    TargetReached,
    /// The budget of objective evaluations is exhausted.
    MaxEvalExceeded,
    /// The iteration budget is exhausted.
    MaxIterExceeded,
}

impl Status {
    fn message(&self) -> &'static str {
        match self {
            Self::RadiusReached => "the lower bound for the trust-region radius has been reached",
            Self::TargetReached => "the target function value has been reached",
            Self::MaxEvalExceeded => "the maximum number of function evaluations is exceeded",
            Self::MaxIterExceeded => "the maximum number of iterations is exceeded",
        }
    }
}

/// Result of a minimization run.
#[derive(Debug, Clone)]
pub struct OptimizeResult {
    /// Best point found, in the coordinates of the user.
    pub x: Vector,
    /// Objective value at `x`.
    pub fun: Real,
    /// Constraint violation at `x`.
    pub maxcv: Real,
    /// Number of objective evaluations.
    pub nfev: usize,
    /// Number of iterations of the driver.
    pub nit: usize,
    /// Reason the driver stopped.
    pub status: Status,
    /// Whether the run ended for a converged reason.
    pub success: bool,
    /// Human-readable account of the stop reason.
    pub message: String,
}

/// The outer trust-region driver.
///
/// Owns the solver state together with the two radii of the classical
/// management: the working radius `delta` and its slowly decreasing lower
/// bound `rho`.
pub struct Minimizer {
    state: TrustRegion,
    rho: Real,
    delta: Real,
    nit: usize,
}

impl Minimizer {
    /// Construct the solver state for a problem.
    pub fn new(problem: Problem, options: &Options) -> Result<Self> {
        let state = TrustRegion::new(problem, options)?;
        let rho = state.options().rhobeg;
        Ok(Self {
            state,
            rho,
            delta: rho,
            nit: 0,
        })
    }

    /// The solver state.
    pub fn state(&self) -> &TrustRegion {
        &self.state
    }

    /// Run the iteration to completion.
    pub fn run(&mut self) -> Result<OptimizeResult> {
        let rhoend = self.state.options().rhoend;
        let maxfev = self.state.options().maxfev;
        let target = self.state.options().target;
        let maxiter = 10 * maxfev;

        let status = loop {
            if self.nit >= maxiter {
                break Status::MaxIterExceeded;
            }
            self.nit += 1;
            if self.state.fopt() <= target && self.state.maxcv() <= 10.0 * rhoend {
                break Status::TargetReached;
            }

            let (is_model, step) = match self.state.knew() {
                Some(knew) => {
                    // Geometry radius: a fraction of the distance to the
                    // point being replaced, kept within the working radius
                    // and above its lower bound.
                    let dsq = self.state.models().set().dist_sq_from(self.state.kopt());
                    let adelt = (0.1 * dsq[knew].sqrt()).min(0.5 * self.delta).max(self.rho);
                    (true, self.state.model_step(adelt)?)
                }
                None => (false, self.state.trust_region_step(self.delta)),
            };
            let snorm = step.norm();

            if !is_model && snorm <= 0.5 * self.delta {
                // The model is already nearly stationary within the trust
                // region. Shrink it, repair the geometry if far points
                // remain, and otherwise lower the radius bound.
                self.delta = 0.1 * self.delta;
                if self.delta <= 1.5 * self.rho {
                    self.delta = self.rho;
                }
                self.state
                    .prepare_model_step((2.0 * self.delta).max(10.0 * self.rho));
                if self.state.is_model_step() || self.delta > self.rho {
                    continue;
                }
                if self.rho <= rhoend {
                    break Status::RadiusReached;
                }
                self.reduce_rho(rhoend);
                continue;
            }

            if self.state.nfev() >= maxfev {
                break Status::MaxEvalExceeded;
            }

            match self.state.update(&step) {
                Ok((_, ratio)) => {
                    if is_model {
                        self.state.prepare_trust_region_step();
                    } else {
                        self.delta = if ratio <= 0.1 {
                            0.5 * self.delta
                        } else if ratio <= 0.7 {
                            (0.5 * self.delta).max(snorm)
                        } else {
                            (0.5 * self.delta).max(2.0 * snorm)
                        };
                        if self.delta <= 1.5 * self.rho {
                            self.delta = self.rho;
                        }
                        if ratio >= 0.1 {
                            self.state.prepare_trust_region_step();
                        } else {
                            self.state
                                .prepare_model_step((2.0 * self.delta).max(10.0 * self.rho));
                            if !self.state.is_model_step() && self.delta <= self.rho {
                                if self.rho <= rhoend {
                                    break Status::RadiusReached;
                                }
                                self.reduce_rho(rhoend);
                            }
                        }
                    }
                    self.state.shift_origin(self.delta);
                }
                Err(Error::RestartRequired) => continue,
                Err(Error::NumericBreakdown) => {
                    // The swap denominator underflowed: fall back to the
                    // least-Frobenius-norm models and retry with a smaller
                    // region.
                    self.state.reset_models();
                    self.delta = (0.5 * self.delta).max(self.rho);
                    self.state.prepare_trust_region_step();
                }
                Err(e) => return Err(e),
            }
        };
        Ok(self.report(status))
    }

    /// Lower the radius bound on the classical schedule and reset the
    /// penalty coefficients from the observed spreads.
    fn reduce_rho(&mut self, rhoend: Real) {
        let old = self.rho;
        let ratio = self.rho / rhoend;
        self.rho = if ratio <= 16.0 {
            rhoend
        } else if ratio <= 250.0 {
            (self.rho * rhoend).sqrt()
        } else {
            0.1 * self.rho
        };
        self.delta = (0.5 * old).max(self.rho);
        self.state.reduce_penalty_coefficients();
        self.state.update_multipliers();
        self.state.prepare_trust_region_step();
    }

    fn report(&self, status: Status) -> OptimizeResult {
        OptimizeResult {
            x: self.state.x_absolute(),
            fun: self.state.fopt(),
            maxcv: self.state.maxcv(),
            nfev: self.state.nfev(),
            nit: self.nit,
            success: matches!(status, Status::RadiusReached | Status::TargetReached),
            message: status.message().to_string(),
            status,
        }
    }
}

/// Minimize a nonlinearly constrained problem without derivatives.
pub fn minimize(problem: Problem, options: &Options) -> Result<OptimizeResult> {
    Minimizer::new(problem, options)?.run()
}
