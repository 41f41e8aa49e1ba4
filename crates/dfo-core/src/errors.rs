//! Error types for dfo-rs.
//!
//! A single `thiserror`-derived enum covers every failure mode of the
//! workspace, from argument validation up to the numerical breakdown of the
//! interpolation updates. The `ensure!` and `fail!` macros provide short
//! precondition checks in the style of assertion macros.

use thiserror::Error;

/// The top-level error type used throughout dfo-rs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error.
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated.
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The denominator of the interpolation updating formula underflowed.
    ///
    /// Raised by the swap update of the inverse KKT factorization when |σ|
    /// falls below the safe-division threshold. The state of the
    /// factorization is left unchanged; the caller is expected to shrink the
    /// trust-region radius and retry.
    #[error("denominator of the updating formula is too small to divide safely")]
    NumericBreakdown,

    /// Control signal: the incumbent changed while the penalty coefficients
    /// were being increased, and the current step must be re-derived.
    ///
    /// Not a failure; the iteration restarts from the step-selection stage.
    #[error("the incumbent changed during a penalty update; restart the iteration")]
    RestartRequired,
}

/// Shorthand `Result` type used throughout dfo-rs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Return `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use dfo_core::ensure;
/// fn positive(x: f64) -> dfo_core::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Return `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use dfo_core::fail;
/// fn always_err() -> dfo_core::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(x: f64) -> Result<f64> {
        crate::ensure!(x.is_finite(), "x must be finite, got {x}");
        Ok(x)
    }

    #[test]
    fn ensure_passes_and_fails() {
        assert_eq!(checked(2.0), Ok(2.0));
        assert!(matches!(
            checked(f64::NAN),
            Err(Error::Precondition(_))
        ));
    }

    #[test]
    fn display_messages() {
        let e = Error::NumericBreakdown;
        assert!(e.to_string().contains("updating formula"));
        let e = Error::RestartRequired;
        assert!(e.to_string().contains("restart"));
    }
}
