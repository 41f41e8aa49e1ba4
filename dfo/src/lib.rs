//! # dfo
//!
//! A derivative-free trust-region solver for smooth nonlinear optimization
//! with bound, linear, and nonlinear constraints.
//!
//! The solver minimizes an objective `f(x)` subject to
//! `xl <= x <= xu`, `A_ub x <= b_ub`, `A_eq x = b_eq`, `c_ub(x) <= 0`, and
//! `c_eq(x) = 0`, using only values of `f`, `c_ub`, and `c_eq`. Progress is
//! driven by quadratic models built by underdetermined interpolation on a
//! moving point set.
//!
//! This crate is a façade over the workspace members and carries the outer
//! driver. Application code should depend on this crate rather than on the
//! individual `dfo-*` crates.
//!
//! ## Quick start
//!
//! ```
//! use dfo::{minimize, Options, Problem};
//! use nalgebra::DVector;
//!
//! let problem = Problem::new(|x: &DVector<f64>| x.norm_squared(), &[1.0, 1.0]);
//! let result = minimize(problem, &Options::default()).unwrap();
//! assert!(result.fun < 1e-6);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod driver;

pub use driver::{minimize, Minimizer, OptimizeResult, Status};

/// Core types, aliases, and error definitions.
pub use dfo_core as core;

/// Dense subproblem solvers.
pub use dfo_linalg as linalg;

/// Interpolation models and the trust-region iteration.
pub use dfo_model as model;

pub use dfo_core::{Error, Real, Result};
pub use dfo_model::{Options, Problem, TrustRegion};
