//! Solver options and their validation.

use dfo_core::Real;

/// User-facing options of the solver.
///
/// Unset values resolve to dimension-dependent defaults when the solver is
/// constructed; see [`Options::resolve`]. Unknown options cannot be
/// expressed by construction.
#[derive(Debug, Clone)]
pub struct Options {
    /// Initial trust-region scale. Defaults to `max(1, rhoend)` and is
    /// clamped by half the smallest bound range.
    pub rhobeg: Option<Real>,
    /// Terminal trust-region scale. Defaults to `1e-6`, clamped to at most
    /// `rhobeg`.
    pub rhoend: Option<Real>,
    /// Number of interpolation points. Defaults to `2n + 1` and is coerced
    /// into `[n + 2, (n + 1)(n + 2) / 2]`.
    pub npt: Option<usize>,
    /// Cap on objective evaluations. Defaults to `max(500 n, npt + 1)` and
    /// is coerced above `npt`.
    pub maxfev: Option<usize>,
    /// Stop as soon as the objective reaches this value at a feasible
    /// point. Defaults to `-∞`.
    pub target: Real,
    /// Check the invariants and interpolation residuals at each update.
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rhobeg: None,
            rhoend: None,
            npt: None,
            maxfev: None,
            target: Real::NEG_INFINITY,
            debug: false,
        }
    }
}

/// Options with every default and coercion applied.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Initial trust-region scale after clamping.
    pub rhobeg: Real,
    /// Terminal trust-region scale after clamping.
    pub rhoend: Real,
    /// Interpolation-set size after coercion.
    pub npt: usize,
    /// Evaluation cap after coercion.
    pub maxfev: usize,
    /// Objective stop threshold.
    pub target: Real,
    /// Invariant checking flag.
    pub debug: bool,
}

impl Options {
    /// Apply defaults and coercions for a problem in dimension `n`.
    pub fn resolve(&self, n: usize) -> ResolvedOptions {
        let rhoend = self.rhoend.unwrap_or(1e-6);
        let rhobeg = self.rhobeg.unwrap_or_else(|| rhoend.max(1.0));
        let rhoend = rhoend.min(rhobeg);
        let npt = self.npt.unwrap_or(2 * n + 1);
        let npt_min = n + 2;
        let npt_max = (n + 1) * (n + 2) / 2;
        let npt_clamped = npt.clamp(npt_min, npt_max);
        if npt_clamped != npt {
            log::warn!(
                "option npt is not in the required interval and is {}",
                if npt < npt_min { "increased" } else { "decreased" }
            );
        }
        let maxfev = self.maxfev.unwrap_or_else(|| (500 * n).max(npt_clamped + 1));
        let maxfev_coerced = maxfev.max(npt_clamped + 1);
        if maxfev_coerced != maxfev {
            log::warn!("option maxfev is too low and is increased");
        }
        if self
            .rhoend
            .zip(self.rhobeg)
            .is_some_and(|(re, rb)| re > rb)
        {
            log::warn!("option rhoend is too large and is decreased");
        }
        ResolvedOptions {
            rhobeg,
            rhoend,
            npt: npt_clamped,
            maxfev: maxfev_coerced,
            target: self.target,
            debug: self.debug,
        }
    }
}

impl ResolvedOptions {
    /// Clamp the trust-region scales by half the smallest bound range and
    /// restore `rhoend <= rhobeg`.
    pub(crate) fn clamp_by_bounds(&mut self, half_min_range: Real) {
        if half_min_range.is_finite() {
            self.rhobeg = self.rhobeg.min(half_min_range);
        }
        self.rhoend = self.rhoend.min(self.rhobeg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_dimension_five() {
        let opts = Options::default().resolve(5);
        assert_eq!(opts.npt, 11);
        assert_eq!(opts.maxfev, 2500);
        assert_eq!(opts.rhobeg, 1.0);
        assert_eq!(opts.rhoend, 1e-6);
        assert!(opts.target.is_infinite() && opts.target < 0.0);
        assert!(!opts.debug);
    }

    #[test]
    fn npt_is_coerced_into_range() {
        let opts = Options {
            npt: Some(1),
            ..Options::default()
        }
        .resolve(3);
        assert_eq!(opts.npt, 5);
        let opts = Options {
            npt: Some(100),
            ..Options::default()
        }
        .resolve(3);
        assert_eq!(opts.npt, 10);
    }

    #[test]
    fn maxfev_exceeds_npt() {
        let opts = Options {
            maxfev: Some(3),
            ..Options::default()
        }
        .resolve(2);
        assert!(opts.maxfev > opts.npt);
    }

    #[test]
    fn rhoend_clamped_to_rhobeg() {
        let opts = Options {
            rhobeg: Some(0.5),
            rhoend: Some(2.0),
            ..Options::default()
        }
        .resolve(2);
        assert_eq!(opts.rhobeg, 0.5);
        assert_eq!(opts.rhoend, 0.5);
    }

    #[test]
    fn bound_clamp_shrinks_both_scales() {
        let mut opts = Options::default().resolve(2);
        opts.clamp_by_bounds(0.25);
        assert_eq!(opts.rhobeg, 0.25);
        assert_eq!(opts.rhoend, 1e-6);
        opts.clamp_by_bounds(1e-8);
        assert_eq!(opts.rhoend, opts.rhobeg);
    }
}
