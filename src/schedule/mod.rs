//! Per-activity schedule: the window-and-optimum definition that produces
//! a per-year suitability in `[0, 1]`, or signals that the activity has
//! expired for this rotation.
//!
//! # Examples
//!
//! ```
//! use abe::schedule::{Schedule, ScheduleValue};
//!
//! let schedule = Schedule::builder()
//!     .window(30.0, 40.0, 50.0)
//!     .build()
//!     .unwrap();
//!
//! // Below the window: not yet due.
//! assert_eq!(schedule.value(20.0, 0, 100.0), ScheduleValue::Suitability(0.0));
//! // At the optimum: fully due.
//! assert_eq!(schedule.value(40.0, 0, 100.0), ScheduleValue::Suitability(1.0));
//! // Past the window without force: expired.
//! assert_eq!(schedule.value(60.0, 0, 100.0), ScheduleValue::Expired);
//! ```

pub mod error;

pub use error::ScheduleError;

/// Result of evaluating a [`Schedule`] for a stand in a given year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleValue {
    /// Suitability in `[0, 1]` (may reach exactly `1.0` under forced
    /// execution even past the nominal window).
    Suitability(f64),
    /// The activity's window has passed and it was not force-executed:
    /// the activity is dead for this rotation.
    Expired,
}

impl ScheduleValue {
    /// Treats `Expired` as `0.0` suitability, for callers that only
    /// care about "should this happen now".
    pub fn suitability_or_zero(self) -> f64 {
        match self {
            ScheduleValue::Suitability(v) => v,
            ScheduleValue::Expired => 0.0,
        }
    }

    pub fn is_expired(self) -> bool {
        matches!(self, ScheduleValue::Expired)
    }
}

/// Absolute-time window `{tmin, topt, tmax}` plus a relative-to-`U`
/// window `{tminRel, toptRel, tmaxRel}`, a repeat flag, and a
/// force-execution flag.
///
/// Any bound may be unset; the component design's `-1` sentinel is
/// represented here as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Schedule {
    tmin: Option<f64>,
    topt: Option<f64>,
    tmax: Option<f64>,
    tmin_rel: Option<f64>,
    topt_rel: Option<f64>,
    tmax_rel: Option<f64>,
    repeat: bool,
    repeat_interval: i32,
    force_execution: bool,
    absolute: bool,
}

impl Schedule {
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::default()
    }

    /// A schedule that repeats every `interval` years (used by the
    /// salvage activity and other "run every N years" activities).
    pub fn repeating(interval: i32) -> Self {
        Self {
            repeat: true,
            repeat_interval: interval.max(1),
            ..Default::default()
        }
    }

    pub fn force_execution(&self) -> bool {
        self.force_execution
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Earliest absolute year at which this schedule can first become
    /// non-zero; used by the stand driver to pick a sleep horizon.
    ///
    /// Falls back to `rotation_start_year` for repeating schedules and
    /// for schedules with no lower bound at all.
    pub fn earliest_schedule(&self, rotation_start_year: i32, rotation_length: f64) -> f64 {
        if self.repeat {
            return rotation_start_year as f64;
        }
        if let Some(tmin) = self.tmin {
            return rotation_start_year as f64 + tmin;
        }
        if let Some(tmin_rel) = self.tmin_rel {
            return rotation_start_year as f64 + tmin_rel * rotation_length;
        }
        rotation_start_year as f64
    }

    /// Evaluates this schedule.
    ///
    /// `absolute_age` is the stand's absolute age (years since rotation
    /// start); `current_year` is the simulation year; `rotation_length`
    /// is `U`, the STP's rotation length for the stand's current
    /// intensity class.
    pub fn value(
        &self,
        absolute_age: f64,
        current_year: i32,
        rotation_length: f64,
    ) -> ScheduleValue {
        if self.repeat {
            return if self.repeat_interval > 0 && current_year % self.repeat_interval == 0 {
                ScheduleValue::Suitability(1.0)
            } else {
                ScheduleValue::Suitability(0.0)
            };
        }

        let current = if self.absolute {
            current_year as f64
        } else {
            absolute_age
        };
        let current_rel = current / rotation_length;

        // Force execution: age already past the max -> always fires.
        if let Some(tmax) = self.tmax {
            if current >= tmax && self.force_execution {
                return ScheduleValue::Suitability(1.0);
            }
        }
        if let Some(tmax_rel) = self.tmax_rel {
            if current_rel >= tmax_rel && self.force_execution {
                return ScheduleValue::Suitability(1.0);
            }
        }

        if let Some(tmin) = self.tmin {
            if current < tmin {
                return ScheduleValue::Suitability(0.0);
            }
        }
        if let Some(tmax) = self.tmax {
            if current > tmax {
                return ScheduleValue::Expired;
            }
        }
        if let Some(tmin_rel) = self.tmin_rel {
            if current_rel < tmin_rel {
                return ScheduleValue::Suitability(0.0);
            }
        }
        if let Some(tmax_rel) = self.tmax_rel {
            if current_rel > tmax_rel {
                return ScheduleValue::Expired;
            }
        }

        // Optimal absolute point in time.
        if let Some(topt) = self.topt {
            if (current - topt).abs() <= 0.5 {
                return ScheduleValue::Suitability(1.0);
            }
            // With no [tmin, tmax] window to fall back on, the activity is
            // either fully due once past its optimum or dead for this
            // rotation; with a window, fall through to the hat function's
            // descending half below instead.
            if current > topt && !(self.tmin.is_some() && self.tmax.is_some()) {
                return if self.force_execution {
                    ScheduleValue::Suitability(1.0)
                } else {
                    ScheduleValue::Expired
                };
            }
        }

        if let (Some(tmin), Some(tmax)) = (self.tmin, self.tmax) {
            if let Some(topt) = self.topt {
                return ScheduleValue::Suitability(if current <= topt {
                    if (topt - tmin).abs() < f64::EPSILON {
                        1.0
                    } else {
                        (current - tmin) / (topt - tmin)
                    }
                } else if self.force_execution {
                    1.0
                } else if (tmax - topt).abs() < f64::EPSILON {
                    1.0
                } else {
                    (tmax - current) / (tmax - topt)
                });
            }
            // No optimal time: everything inside [tmin, tmax] is fine.
            return ScheduleValue::Suitability(1.0);
        }
        if self.topt.is_some() {
            // An optimal absolute point exists but has not been reached.
            return ScheduleValue::Suitability(0.0);
        }

        // Optimal relative point in time.
        if let Some(topt_rel) = self.topt_rel {
            if (current_rel - topt_rel).abs() * rotation_length <= 0.5 {
                return ScheduleValue::Suitability(1.0);
            }
        }

        if let (Some(tmin_rel), Some(tmax_rel)) = (self.tmin_rel, self.tmax_rel) {
            if let Some(topt_rel) = self.topt_rel {
                return ScheduleValue::Suitability(if current_rel <= topt_rel {
                    if (topt_rel - tmin_rel).abs() < f64::EPSILON {
                        1.0
                    } else {
                        (current_rel - tmin_rel) / (topt_rel - tmin_rel)
                    }
                } else if (tmax_rel - topt_rel).abs() < f64::EPSILON {
                    1.0
                } else {
                    (tmax_rel - current_rel) / (tmax_rel - topt_rel)
                });
            }
            return ScheduleValue::Suitability(1.0);
        }
        if self.topt_rel.is_some() {
            return ScheduleValue::Suitability(0.0);
        }

        log::debug!("Schedule::value: unexpected combination (U={rotation_length}, age={current})");
        ScheduleValue::Suitability(0.0)
    }
}

/// Builder performing the validation spelled out in the component design:
/// `tmin <= topt <= tmax`, mixed signs rejected, at least one of `topt`
/// or `toptRel` required unless `repeat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleBuilder {
    schedule: Schedule,
}

impl ScheduleBuilder {
    pub fn window(mut self, tmin: f64, topt: f64, tmax: f64) -> Self {
        self.schedule.tmin = Some(tmin);
        self.schedule.topt = Some(topt);
        self.schedule.tmax = Some(tmax);
        self
    }

    pub fn relative_window(mut self, tmin_rel: f64, topt_rel: f64, tmax_rel: f64) -> Self {
        self.schedule.tmin_rel = Some(tmin_rel);
        self.schedule.topt_rel = Some(topt_rel);
        self.schedule.tmax_rel = Some(tmax_rel);
        self
    }

    pub fn min(mut self, tmin: f64) -> Self {
        self.schedule.tmin = Some(tmin);
        self
    }
    pub fn opt(mut self, topt: f64) -> Self {
        self.schedule.topt = Some(topt);
        self
    }
    pub fn max(mut self, tmax: f64) -> Self {
        self.schedule.tmax = Some(tmax);
        self
    }
    pub fn min_rel(mut self, tmin_rel: f64) -> Self {
        self.schedule.tmin_rel = Some(tmin_rel);
        self
    }
    pub fn opt_rel(mut self, topt_rel: f64) -> Self {
        self.schedule.topt_rel = Some(topt_rel);
        self
    }
    pub fn max_rel(mut self, tmax_rel: f64) -> Self {
        self.schedule.tmax_rel = Some(tmax_rel);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.schedule.force_execution = force;
        self
    }

    pub fn absolute(mut self, absolute: bool) -> Self {
        self.schedule.absolute = absolute;
        self
    }

    pub fn repeat(mut self, interval: i32) -> Self {
        self.schedule.repeat = true;
        self.schedule.repeat_interval = interval.max(1);
        self
    }

    pub fn build(self) -> Result<Schedule, ScheduleError> {
        let mut s = self.schedule;
        if s.repeat {
            return Ok(s);
        }

        if let (Some(tmin), Some(tmax)) = (s.tmin, s.tmax) {
            if s.topt.is_none() {
                s.topt = Some((tmin + tmax) / 2.0);
            }
        }
        if let (Some(tmin), Some(topt), Some(tmax)) = (s.tmin, s.topt, s.tmax) {
            if topt < tmin || topt > tmax {
                return Err(ScheduleError::OptimumOutOfWindow { opt: topt, tmin, tmax });
            }
        }
        if let (Some(tmin_rel), Some(topt_rel), Some(tmax_rel)) =
            (s.tmin_rel, s.topt_rel, s.tmax_rel)
        {
            if topt_rel < tmin_rel || topt_rel > tmax_rel {
                return Err(ScheduleError::RelativeOptimumOutOfWindow {
                    opt_rel: topt_rel,
                    tmin_rel,
                    tmax_rel,
                });
            }
        }
        if let (Some(tmin_rel), Some(tmax_rel)) = (s.tmin_rel, s.tmax_rel) {
            if tmin_rel * tmax_rel < 0.0 {
                return Err(ScheduleError::MixedWindowSigns);
            }
        }
        if let (Some(tmin), Some(tmax)) = (s.tmin, s.tmax) {
            if tmin * tmax < 0.0 {
                return Err(ScheduleError::MixedWindowSigns);
            }
        }
        if s.topt.is_none() && s.topt_rel.is_none() {
            return Err(ScheduleError::MissingOptimum);
        }

        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_execution_past_max_fires() {
        let s = Schedule::builder().opt(50.0).force(true).build().unwrap();
        assert_eq!(s.value(80.0, 0, 100.0), ScheduleValue::Suitability(1.0));
    }

    #[test]
    fn expires_past_window_without_force() {
        let s = Schedule::builder().window(10.0, 20.0, 30.0).build().unwrap();
        assert_eq!(s.value(40.0, 0, 100.0), ScheduleValue::Expired);
    }

    #[test]
    fn below_minimum_is_zero() {
        let s = Schedule::builder().window(10.0, 20.0, 30.0).build().unwrap();
        assert_eq!(s.value(5.0, 0, 100.0), ScheduleValue::Suitability(0.0));
    }

    #[test]
    fn at_optimum_is_one() {
        let s = Schedule::builder().window(30.0, 40.0, 50.0).build().unwrap();
        assert_eq!(s.value(40.0, 0, 100.0), ScheduleValue::Suitability(1.0));
    }

    #[test]
    fn monotonic_rise_then_fall_around_optimum() {
        let s = Schedule::builder().window(30.0, 40.0, 50.0).build().unwrap();
        let rising: Vec<f64> = (30..=40)
            .map(|age| s.value(age as f64, 0, 100.0).suitability_or_zero())
            .collect();
        for w in rising.windows(2) {
            assert!(w[1] >= w[0] - 1e-9, "{:?}", rising);
        }
        let falling: Vec<f64> = (40..=50)
            .map(|age| s.value(age as f64, 0, 100.0).suitability_or_zero())
            .collect();
        for w in falling.windows(2) {
            assert!(w[1] <= w[0] + 1e-9, "{:?}", falling);
        }
    }

    #[test]
    fn declines_linearly_between_optimum_and_max_instead_of_expiring() {
        let s = Schedule::builder().window(30.0, 40.0, 50.0).build().unwrap();
        assert_eq!(s.value(45.0, 0, 100.0), ScheduleValue::Suitability(0.5));
        assert_eq!(s.value(50.0, 0, 100.0), ScheduleValue::Suitability(0.0));
    }

    #[test]
    fn repeat_fires_on_multiples_of_interval() {
        let s = Schedule::repeating(5);
        assert_eq!(s.value(0.0, 10, 100.0), ScheduleValue::Suitability(1.0));
        assert_eq!(s.value(0.0, 11, 100.0), ScheduleValue::Suitability(0.0));
    }

    #[test]
    fn opt_out_of_window_is_setup_error() {
        let err = Schedule::builder().window(10.0, 90.0, 30.0).build();
        assert!(matches!(err, Err(ScheduleError::OptimumOutOfWindow { .. })));
    }

    #[test]
    fn missing_optimum_without_repeat_is_setup_error() {
        let err = Schedule::builder().min(10.0).build();
        assert_eq!(err, Err(ScheduleError::MissingOptimum));
    }

    #[test]
    fn absolute_schedule_uses_current_year_not_age() {
        let s = Schedule::builder()
            .window(2000.0, 2010.0, 2020.0)
            .absolute(true)
            .build()
            .unwrap();
        assert_eq!(s.value(5.0, 2010, 100.0), ScheduleValue::Suitability(1.0));
    }

    #[test]
    fn relative_window_scales_with_rotation_length() {
        let s = Schedule::builder()
            .relative_window(0.3, 0.4, 0.5)
            .build()
            .unwrap();
        // U=100 -> min/opt/max become 30/40/50 in absolute age.
        assert_eq!(s.value(40.0, 0, 100.0), ScheduleValue::Suitability(1.0));
        assert_eq!(s.value(60.0, 0, 100.0), ScheduleValue::Expired);
    }
}
