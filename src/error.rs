//! Crate-wide error types.
//!
//! Mirrors the four error kinds from the engine's error handling design:
//! setup errors (fatal during STP registration), runtime script errors
//! (fatal for the current engine step), invalid scripting context, and
//! cooperative cancellation. "Expired" schedule values and zero-valued
//! constraints are normal control flow and are never represented here.

use thiserror::Error;

use crate::engine::ids::{ActivityIndex, StandId};

/// Top-level error surfaced by the engine to its host.
#[derive(Debug, Error)]
pub enum AbeError {
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("runtime script error: {0}")]
    Script(#[from] ScriptError),

    #[error("invalid scripting context: {0}")]
    InvalidContext(String),

    #[error("engine step cancelled: {0}")]
    Cancelled(String),
}

/// Errors raised while registering an STP or one of its activities.
///
/// These are fatal during STP registration; the engine refuses to start
/// simulation when one occurs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SetupError {
    #[error("activity '{0}' is missing a schedule")]
    MissingSchedule(String),

    #[error("schedule optimum {opt} for activity '{activity}' is outside [{tmin}, {tmax}]")]
    OptimumOutOfWindow {
        activity: String,
        opt: f64,
        tmin: f64,
        tmax: f64,
    },

    #[error("schedule window for activity '{activity}' has tmin={tmin} > tmax={tmax}")]
    InvertedWindow {
        activity: String,
        tmin: f64,
        tmax: f64,
    },

    #[error("schedule for activity '{0}' mixes absolute and relative bounds")]
    MixedWindowSigns(String),

    #[error("activity '{0}' needs topt or toptRel unless repeating")]
    MissingOptimum(String),

    #[error("unknown activity type '{0}'")]
    UnknownActivityType(String),

    #[error("custom thinning classes for activity '{activity}' sum to {sum} (expected 100)")]
    ClassesDoNotSumTo100 { activity: String, sum: f64 },

    #[error("invalid species id '{0}'")]
    InvalidSpeciesId(String),

    #[error("unknown planting pattern '{0}'")]
    UnknownPlantingPattern(String),

    #[error("script object nesting exceeded the maximum depth of {0}")]
    TooDeepNesting(usize),

    #[error("STP '{0}' has no activities")]
    EmptyStp(String),
}

/// A user callable raised or returned an error object.
///
/// Wrapped with the stand id, activity name and event name that were
/// active when the error surfaced.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("stand {stand}, activity '{activity}', event '{event}': {message}")]
pub struct ScriptError {
    pub stand: StandId,
    pub activity: String,
    pub event: String,
    pub message: String,
}

impl ScriptError {
    pub fn new(
        stand: StandId,
        activity: impl Into<String>,
        event: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stand,
            activity: activity.into(),
            event: event.into(),
            message: message.into(),
        }
    }
}

/// Reference to an activity within its owning STP, used purely for
/// error reporting (activity index resolution happens at the stand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityRef {
    pub stand: StandId,
    pub index: ActivityIndex,
}
