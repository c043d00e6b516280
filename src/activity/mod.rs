//! Activities as a sum type instead of a polymorphic class hierarchy.
//!
//! Common fields (name, index, schedule, constraints, events, default
//! flags) live in [`ActivityHeader`]; variant-specific configuration lives
//! in [`ActivityKind`]. [`evaluate`] and [`execute`] are free functions
//! matching on the variant, rather than virtual methods.

pub mod flags;
pub mod general;
pub mod planting;
pub mod salvage;
pub mod thinning;

pub use flags::ActivityFlags;
pub use general::GeneralConfig;
pub use planting::PlantingConfig;
pub use salvage::{SalvageConfig, SalvageOutcome};
pub use thinning::{CustomThinning, CustomThinningResult, SelectiveThinning, SelectiveThinningResult, ThinningConfig};

use rand::Rng;

use crate::constraints::{is_truthy, ConstraintList};
use crate::engine::ids::{ActivityIndex, StandId};
use crate::error::ScriptError;
use crate::events::{EventKind, Events};
use crate::host::{Host, ScriptHost};
use crate::schedule::Schedule;

/// Fields shared by every activity variant.
#[derive(Debug, Clone)]
pub struct ActivityHeader<H> {
    pub name: String,
    pub index: ActivityIndex,
    pub schedule: Schedule,
    pub constraints: ConstraintList<H>,
    pub events: Events<H>,
    pub default_flags: ActivityFlags,
}

impl<H> ActivityHeader<H> {
    pub fn new(name: impl Into<String>, index: ActivityIndex, schedule: Schedule) -> Self {
        Self {
            name: name.into(),
            index,
            schedule,
            constraints: ConstraintList::new(),
            events: Events::default(),
            default_flags: ActivityFlags::fresh(),
        }
    }
}

/// Variant-specific activity configuration.
#[derive(Debug, Clone)]
pub enum ActivityKind<H> {
    General(GeneralConfig<H>),
    /// The base case: no payload of its own, goes through Schedule →
    /// Scheduler and executes via the ordinary `onExecute` event.
    Scheduled,
    Planting(PlantingConfig),
    Salvage(SalvageConfig<H>),
    Thinning(ThinningConfig<H>),
}

/// One step in an STP's activity vector.
#[derive(Debug, Clone)]
pub struct Activity<H> {
    pub header: ActivityHeader<H>,
    pub kind: ActivityKind<H>,
}

impl<H> Activity<H> {
    pub fn new(header: ActivityHeader<H>, kind: ActivityKind<H>) -> Self {
        Self { header, kind }
    }

    /// Salvage is always a repeating activity, per the component design;
    /// other variants repeat only when configured to.
    pub fn is_repeating(&self) -> bool {
        matches!(self.kind, ActivityKind::Salvage(_)) || self.header.default_flags.repeating
    }

    pub fn is_salvage(&self) -> bool {
        matches!(self.kind, ActivityKind::Salvage(_))
    }
}

/// Extra per-call inputs the stand driver supplies beyond the stand id
/// and host, since variants read different parts of the stand's state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityContext {
    pub area_ha: f64,
    pub disturbed_timber_m3: f64,
}

/// Result of [`evaluate`]: whether the scheduled path should proceed, and
/// (for thinning) the harvest volume it would realize if executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluateResult {
    pub proceed: bool,
    pub scheduled_harvest_m3: f64,
}

/// Tests a scheduled activity against read-only (non-mutating) trial
/// data, to decide whether it is worth booking a scheduler ticket, and
/// to size the ticket's planned harvest.
///
/// Only thinning variants have anything meaningful to evaluate here:
/// they run their selection algorithm against a snapshot copy of the
/// stand's trees (never the host's live trees) purely to size the
/// removal. General/Scheduled/Planting/Salvage do not go through this
/// two-phase split and always proceed.
pub fn evaluate<S, H>(
    activity: &Activity<H>,
    stand: StandId,
    ctx: &ActivityContext,
    host: &mut S,
    rng: &mut impl Rng,
) -> EvaluateResult
where
    S: Host,
    H: Clone + std::fmt::Debug,
{
    match &activity.kind {
        ActivityKind::Thinning(ThinningConfig::Custom(custom)) => {
            let mut trees = host.trees_in_stand(stand);
            let result = custom.execute(&mut trees, true, rng);
            EvaluateResult {
                proceed: result.removed_trees > 0,
                scheduled_harvest_m3: result.removed_value,
            }
        }
        ActivityKind::Thinning(ThinningConfig::Selective(selective)) => {
            let mut trees = host.trees_in_stand(stand);
            let result = selective.execute(&mut trees, ctx.area_ha);
            EvaluateResult {
                proceed: result.crop_trees > 0,
                scheduled_harvest_m3: 0.0,
            }
        }
        ActivityKind::General(_) | ActivityKind::Scheduled | ActivityKind::Planting(_) | ActivityKind::Salvage(_) => {
            EvaluateResult {
                proceed: true,
                scheduled_harvest_m3: 0.0,
            }
        }
    }
}

/// Outcome of actually running an activity on a stand.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityOutcome {
    /// General / Scheduled: the action callable's truthy result.
    Ran(bool),
    Planted,
    Salvage(SalvageOutcome),
    CustomThinned(CustomThinningResult),
    SelectiveThinned(SelectiveThinningResult),
}

impl ActivityOutcome {
    /// Harvest volume this outcome realized, for the scheduler's running
    /// total; variants that don't harvest report `0.0`.
    pub fn harvest_m3(&self) -> f64 {
        match self {
            ActivityOutcome::CustomThinned(r) => r.removed_value,
            ActivityOutcome::Salvage(s) => s.extra_harvest_m3,
            _ => 0.0,
        }
    }
}

/// Runs an activity on `stand` for real, mutating the host's trees/
/// saplings as appropriate for the variant.
pub fn execute<S, H>(
    activity: &Activity<H>,
    stand: StandId,
    ctx: &ActivityContext,
    host: &mut S,
    rng: &mut impl Rng,
) -> Result<ActivityOutcome, ScriptError>
where
    S: Host + ScriptHost<Handle = H>,
    H: Clone + std::fmt::Debug,
{
    match &activity.kind {
        ActivityKind::General(cfg) => cfg
            .execute(stand, &activity.header.name, host)
            .map(ActivityOutcome::Ran),
        ActivityKind::Scheduled => {
            let result = activity
                .header
                .events
                .run(EventKind::OnExecute, stand, &activity.header.name, host)?;
            Ok(ActivityOutcome::Ran(result.map(|r| is_truthy(&r)).unwrap_or(false)))
        }
        ActivityKind::Planting(cfg) => {
            cfg.run(stand, host, rng);
            Ok(ActivityOutcome::Planted)
        }
        ActivityKind::Salvage(cfg) => {
            let outcome = cfg.evaluate_phase_one(ctx.disturbed_timber_m3, ctx.area_ha);
            Ok(ActivityOutcome::Salvage(outcome))
        }
        ActivityKind::Thinning(ThinningConfig::Custom(custom)) => {
            let mut trees = host.trees_in_stand_mut(stand);
            // `do_simulate` true means "mark only, do not really remove".
            let mark_only = activity.header.default_flags.do_simulate;
            let result = custom.execute(&mut trees, mark_only, rng);
            Ok(ActivityOutcome::CustomThinned(result))
        }
        ActivityKind::Thinning(ThinningConfig::Selective(selective)) => {
            let mut trees = host.trees_in_stand_mut(stand);
            let result = selective.execute(&mut trees, ctx.area_ha);
            Ok(ActivityOutcome::SelectiveThinned(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Schedule;
    use crate::test_support::{FakeHost, FakeTree, NullScriptHost};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn header(name: &str) -> ActivityHeader<String> {
        ActivityHeader::new(name, 0, Schedule::builder().window(30.0, 40.0, 50.0).build().unwrap())
    }

    #[test]
    fn general_execute_dispatches_through_the_action_callable() {
        let activity = Activity::new(
            header("General"),
            ActivityKind::General(GeneralConfig {
                action: "doIt".to_string(),
            }),
        );
        let mut host = FakeHost {
            script: NullScriptHost::with_call_result("true"),
            ..FakeHost::new()
        };
        let ctx = ActivityContext::default();
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = execute(&activity, StandId::new(1), &ctx, &mut host, &mut rng).unwrap();
        assert_eq!(outcome, ActivityOutcome::Ran(true));
    }

    #[test]
    fn salvage_evaluate_always_proceeds_execute_reports_phase_one() {
        let activity = Activity::new(header("Salvage"), ActivityKind::Salvage(SalvageConfig::default()));
        assert!(activity.is_repeating());
        assert!(activity.is_salvage());

        let mut host = FakeHost::new();
        let ctx = ActivityContext {
            area_ha: 1.0,
            disturbed_timber_m3: 20.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = execute(&activity, StandId::new(1), &ctx, &mut host, &mut rng).unwrap();
        match outcome {
            ActivityOutcome::Salvage(s) => assert_eq!(s.extra_harvest_m3, 20.0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn custom_thinning_evaluate_sizes_harvest_without_mutating_host_trees() {
        let mut header = header("Thin");
        header.default_flags.scheduled = true;
        let activity = Activity::new(
            header,
            ActivityKind::Thinning(ThinningConfig::Custom(CustomThinning {
                target_value: 30.0,
                ..Default::default()
            })),
        );
        let mut host = FakeHost::new();
        let stand = StandId::new(1);
        host.set_trees(stand, (0..100).map(|_| FakeTree::with_dbh(20.0)).collect());
        let ctx = ActivityContext {
            area_ha: 1.0,
            disturbed_timber_m3: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(5);
        let result = evaluate(&activity, stand, &ctx, &mut host, &mut rng);
        assert!(result.proceed);
        assert!(result.scheduled_harvest_m3 > 0.0);
        // The evaluate pass must not have touched the host's real trees.
        assert!(host.trees[&stand].iter().all(|t| !t.removed));
    }

    #[test]
    fn custom_thinning_execute_removes_trees_from_the_host() {
        let header = header("Thin");
        let activity = Activity::new(
            header,
            ActivityKind::Thinning(ThinningConfig::Custom(CustomThinning {
                target_value: 50.0,
                ..Default::default()
            })),
        );
        let mut host = FakeHost::new();
        let stand = StandId::new(1);
        host.set_trees(stand, (0..100).map(|_| FakeTree::with_dbh(20.0)).collect());
        let ctx = ActivityContext::default();
        let mut rng = StdRng::seed_from_u64(9);
        let outcome = execute(&activity, stand, &ctx, &mut host, &mut rng).unwrap();
        assert!(outcome.harvest_m3() > 0.0);
        assert!(host.trees[&stand].iter().any(|t| t.removed));
    }
}
