use thiserror::Error;

/// Errors raised while validating a [`super::Schedule`] at STP setup time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("'opt' {opt} is out of range [{tmin}, {tmax}]")]
    OptimumOutOfWindow { opt: f64, tmin: f64, tmax: f64 },

    #[error("'optRel' {opt_rel} is out of range [{tmin_rel}, {tmax_rel}]")]
    RelativeOptimumOutOfWindow {
        opt_rel: f64,
        tmin_rel: f64,
        tmax_rel: f64,
    },

    #[error("schedule mixes signs between absolute and relative min/max bounds")]
    MixedWindowSigns,

    #[error("neither 'opt' nor 'optRel' can be derived for a non-repeating schedule")]
    MissingOptimum,
}
