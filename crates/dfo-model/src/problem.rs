//! Definition of a nonlinearly constrained problem.
//!
//! Collects the user callables and constraint data handed to the solver:
//! an objective, optional bounds, optional linear inequality and equality
//! constraints, and optional nonlinear inequality and equality constraint
//! functions evaluated as vectors.

use dfo_core::Real;
use dfo_linalg::{Matrix, Vector};

/// Objective callable: returns `f(x)` for an absolute point `x`.
pub(crate) type ObjectiveFn = Box<dyn FnMut(&Vector) -> Real>;

/// Vector-valued constraint callable.
pub(crate) type ConstraintFn = Box<dyn FnMut(&Vector) -> Vector>;

/// A nonlinear optimization problem, built incrementally.
///
/// ```
/// use dfo_model::Problem;
/// use nalgebra::DVector;
///
/// let problem = Problem::new(|x: &DVector<f64>| x.norm_squared(), &[1.0, 1.0]);
/// ```
pub struct Problem {
    pub(crate) fun: ObjectiveFn,
    pub(crate) x0: Vector,
    pub(crate) xl: Vector,
    pub(crate) xu: Vector,
    pub(crate) aub: Matrix,
    pub(crate) bub: Vector,
    pub(crate) aeq: Matrix,
    pub(crate) beq: Vector,
    pub(crate) cub: Option<ConstraintFn>,
    pub(crate) ceq: Option<ConstraintFn>,
}

impl Problem {
    /// Start the definition of a problem from an objective and an initial
    /// guess.
    pub fn new(fun: impl FnMut(&Vector) -> Real + 'static, x0: &[Real]) -> Self {
        let n = x0.len();
        Self {
            fun: Box::new(fun),
            x0: Vector::from_column_slice(x0),
            xl: Vector::from_element(n, Real::NEG_INFINITY),
            xu: Vector::from_element(n, Real::INFINITY),
            aub: Matrix::zeros(0, n),
            bub: Vector::zeros(0),
            aeq: Matrix::zeros(0, n),
            beq: Vector::zeros(0),
            cub: None,
            ceq: None,
        }
    }

    /// Set the bound constraints `xl <= x <= xu`.
    pub fn bounds(mut self, xl: &[Real], xu: &[Real]) -> Self {
        self.xl = Vector::from_column_slice(xl);
        self.xu = Vector::from_column_slice(xu);
        self
    }

    /// Set the linear inequality constraints `aub x <= bub`.
    pub fn linear_ub(mut self, aub: Matrix, bub: &[Real]) -> Self {
        self.aub = aub;
        self.bub = Vector::from_column_slice(bub);
        self
    }

    /// Set the linear equality constraints `aeq x = beq`.
    pub fn linear_eq(mut self, aeq: Matrix, beq: &[Real]) -> Self {
        self.aeq = aeq;
        self.beq = Vector::from_column_slice(beq);
        self
    }

    /// Set the nonlinear inequality constraint function `cub(x) <= 0`.
    pub fn nonlinear_ub(mut self, cub: impl FnMut(&Vector) -> Vector + 'static) -> Self {
        self.cub = Some(Box::new(cub));
        self
    }

    /// Set the nonlinear equality constraint function `ceq(x) = 0`.
    pub fn nonlinear_eq(mut self, ceq: impl FnMut(&Vector) -> Vector + 'static) -> Self {
        self.ceq = Some(Box::new(ceq));
        self
    }

    /// Dimension of the decision variables.
    pub fn dim(&self) -> usize {
        self.x0.len()
    }
}

impl std::fmt::Debug for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("n", &self.x0.len())
            .field("mlub", &self.bub.len())
            .field("mleq", &self.beq.len())
            .field("has_cub", &self.cub.is_some())
            .field("has_ceq", &self.ceq.is_some())
            .finish()
    }
}
