//! # dfo-model
//!
//! Interpolation models and the trust-region iteration of dfo-rs.
//!
//! The crate hosts the moving interpolation set, the factored inverse KKT
//! matrix that parameterizes least-Frobenius-norm quadratic models, the
//! container that keeps one standard and one alternative model per function,
//! and the trust-region iteration with its merit, multiplier, and penalty
//! machinery. The subproblem solvers it consumes live in `dfo-linalg`; the
//! outer driver that loops until convergence lives in the `dfo` façade.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod factorization;
mod models;
mod options;
mod points;
mod problem;
mod quadratic;
mod trust_region;

pub use factorization::KktFactors;
pub use models::{Models, ProblemType};
pub use options::{Options, ResolvedOptions};
pub use points::InterpSet;
pub use problem::Problem;
pub use quadratic::{omega_column, omega_product, Quadratic, RefreshRule};
pub use trust_region::TrustRegion;
