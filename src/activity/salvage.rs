//! Post-disturbance salvage: not scheduled, executes immediately as a
//! repeating activity whenever a stand carries disturbed timber.
//!
//! The two-phase execution split from the component design is modeled as
//! [`SalvageConfig::evaluate_phase_one`] (booking extra harvest, deciding
//! whether to prepone and whether to run the stand splitter) followed by
//! a second pass that the stand driver runs through the ordinary
//! `onExecute` event with `doSimulate` forced off (tracked via the
//! `_run_salvage` stand property, per the component design).

/// Outcome of the first salvage pass for one stand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalvageOutcome {
    /// Disturbance timber to book as extra harvest on the unit scheduler.
    pub extra_harvest_m3: f64,
    /// Whether other planned activities on this stand should be
    /// preponed (by up to `max_prepone` years).
    pub prepone_requested: bool,
    /// Whether the stand splitter (§4.9) should run this year.
    pub run_splitter: bool,
}

impl SalvageOutcome {
    pub fn none() -> Self {
        Self {
            extra_harvest_m3: 0.0,
            prepone_requested: false,
            run_splitter: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SalvageConfig<H> {
    /// Fraction of low-height pixels above which the stand splitter
    /// considers splitting the stand.
    pub threshold_split: f64,
    /// Fraction above which the whole stand is declared totally
    /// disturbed instead of split.
    pub threshold_clear: f64,
    /// Disturbed timber per hectare below which salvage does nothing.
    pub threshold_ignore_damage: f64,
    /// Maximum number of years other activities on this stand may be
    /// preponed by.
    pub max_prepone: i32,
    /// Optional bark-beetle-attack hook, fanned out from the host's
    /// `onBarkBeetleAttack` notification.
    pub on_bark_beetle_attack: Option<H>,
    /// Optional expression gating which disturbed trees actually get
    /// salvaged (e.g. `damage_fraction > 0.5`); when unset every
    /// disturbance removal routed here is salvaged, per
    /// `ActSalvage::mCondition`.
    pub disturbance_condition: Option<String>,
}

impl<H> Default for SalvageConfig<H> {
    fn default() -> Self {
        Self {
            threshold_split: 0.1,
            threshold_clear: 0.9,
            threshold_ignore_damage: 5.0,
            max_prepone: 5,
            on_bark_beetle_attack: None,
            disturbance_condition: None,
        }
    }
}

impl<H> SalvageConfig<H> {
    /// First pass: books already-accounted disturbance timber as extra
    /// harvest, and decides whether preponement/splitting should run.
    pub fn evaluate_phase_one(&self, disturbed_timber_m3: f64, area_ha: f64) -> SalvageOutcome {
        let area_ha = area_ha.max(1e-9);
        let per_ha = disturbed_timber_m3 / area_ha;
        if per_ha <= self.threshold_ignore_damage || disturbed_timber_m3 <= 0.0 {
            return SalvageOutcome::none();
        }
        SalvageOutcome {
            extra_harvest_m3: disturbed_timber_m3,
            prepone_requested: true,
            run_splitter: true,
        }
    }

    /// Tests whether one disturbance removal should actually be salvaged,
    /// per `ActSalvage::evaluateRemove`.
    ///
    /// Evaluates [`SalvageConfig::disturbance_condition`] against the
    /// removed tree's damage fraction; a missing condition always
    /// salvages (the common case, a bare removal threshold on volume).
    /// An expression error logs a warning and salvages anyway, since the
    /// volume is already standing dead or down and leaving it ungathered
    /// is the worse failure mode.
    pub fn test_remove<S>(&self, host: &mut S, damage_fraction: f64) -> bool
    where
        S: crate::host::ScriptHost,
    {
        match &self.disturbance_condition {
            None => true,
            Some(expr) => match host.evaluate(expr, &[("damage_fraction".to_string(), damage_fraction)]) {
                Ok(value) => value != 0.0,
                Err(err) => {
                    log::warn!("salvage disturbance_condition '{expr}' failed: {err}");
                    true
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_ignore_threshold_does_nothing() {
        let cfg: SalvageConfig<String> = SalvageConfig::default();
        let outcome = cfg.evaluate_phase_one(1.0, 1.0);
        assert_eq!(outcome, SalvageOutcome::none());
    }

    #[test]
    fn above_ignore_threshold_books_extra_harvest_and_splits() {
        let cfg: SalvageConfig<String> = SalvageConfig::default();
        // 20 m3 disturbance on 1 ha -> 20 m3/ha > threshold of 5.
        let outcome = cfg.evaluate_phase_one(20.0, 1.0);
        assert_eq!(outcome.extra_harvest_m3, 20.0);
        assert!(outcome.prepone_requested);
        assert!(outcome.run_splitter);
    }

    #[test]
    fn test_remove_without_condition_always_salvages() {
        let cfg: SalvageConfig<String> = SalvageConfig::default();
        let mut host = crate::test_support::NullScriptHost::with_expression_value(0.0);
        assert!(cfg.test_remove(&mut host, 0.1));
    }

    #[test]
    fn test_remove_evaluates_condition_against_damage_fraction() {
        let mut cfg: SalvageConfig<String> = SalvageConfig::default();
        cfg.disturbance_condition = Some("damage_fraction > 0.5".to_string());
        let mut host = crate::test_support::NullScriptHost::with_expression_value(1.0);
        assert!(cfg.test_remove(&mut host, 0.9));
        let mut host_false = crate::test_support::NullScriptHost::with_expression_value(0.0);
        assert!(!cfg.test_remove(&mut host_false, 0.1));
    }
}
