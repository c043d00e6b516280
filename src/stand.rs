//! A single managed stand: the unit of land the engine schedules
//! activities for.
//!
//! Mirrors the component design's "one stand, one current activity"
//! invariant: [`Stand`] carries only plain data (ids, per-activity flags,
//! running aggregates); every operation that needs to call into an STP's
//! activities or the host simulator is a free function parameterized
//! over the host's script handle type, following [`crate::activity`]'s
//! free-function idiom.

use rand::Rng;

use crate::activity::{self, ActivityContext, ActivityFlags, ActivityOutcome};
use crate::engine::ids::{ActivityIndex, StandId, StpId, UnitId, NO_ACTIVITY};
use crate::error::ScriptError;
use crate::events::EventKind;
use crate::host::{Host, RemovalReason};
use crate::properties::PropertyTable;
use crate::stp::{Stp, ThinningIntensity};

/// A managed stand's running state.
#[derive(Debug, Clone)]
pub struct Stand {
    pub id: StandId,
    pub unit: UnitId,
    pub stp: StpId,
    pub thinning_intensity: ThinningIntensity,
    /// Year the current rotation began; `absolute_age` counts up from
    /// this.
    pub rotation_start_year: i32,
    /// Index of the activity currently being offered to the stand, or
    /// [`NO_ACTIVITY`] while asleep between rotations.
    pub current_index: ActivityIndex,
    pub(crate) flags: Vec<ActivityFlags>,
    /// Harvest volume sized by the most recent `evaluate` pass, consumed
    /// by [`crate::scheduler::Scheduler::add_ticket`].
    pub scheduled_harvest_m3: f64,
    /// Cumulative realized harvest this rotation.
    pub harvested_m3: f64,
    /// Standing disturbed (not yet salvaged) timber volume.
    pub disturbed_timber_m3: f64,
    /// Year the stand next wakes up, or `i32::MAX` while active.
    pub sleep_until: i32,
    pub area_ha: f64,
    pub basal_area_m2_ha: f64,
    pub volume_m3_ha: f64,
    pub mean_dbh_cm: f64,
    pub mean_height_m: f64,
    /// Mean annual increment, m3/ha/yr, refreshed by [`calculate_mai`].
    pub mai_m3_ha_yr: f64,
    total_growth_m3_ha: f64,
    total_removed_m3_ha: f64,
    removal_events: u32,
}

impl Stand {
    pub fn new(id: StandId, unit: UnitId, stp: StpId, area_ha: f64) -> Self {
        Self {
            id,
            unit,
            stp,
            thinning_intensity: ThinningIntensity::Medium,
            rotation_start_year: 0,
            current_index: NO_ACTIVITY,
            flags: Vec::new(),
            scheduled_harvest_m3: 0.0,
            harvested_m3: 0.0,
            disturbed_timber_m3: 0.0,
            sleep_until: i32::MAX,
            area_ha,
            basal_area_m2_ha: 0.0,
            volume_m3_ha: 0.0,
            mean_dbh_cm: 0.0,
            mean_height_m: 0.0,
            mai_m3_ha_yr: 0.0,
            total_growth_m3_ha: 0.0,
            total_removed_m3_ha: 0.0,
            removal_events: 0,
        }
    }

    pub fn flags(&self) -> &[ActivityFlags] {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut [ActivityFlags] {
        &mut self.flags
    }

    pub fn is_asleep(&self) -> bool {
        self.current_index == NO_ACTIVITY
    }
}

/// Stand area in hectares.
pub fn area_ha(stand: &Stand) -> f64 {
    stand.area_ha
}

/// Years since the current rotation began.
pub fn absolute_age(stand: &Stand, current_year: i32) -> f64 {
    (current_year - stand.rotation_start_year).max(0) as f64
}

/// First-time setup of a stand against its STP: snapshots default flags,
/// fires `onSetup` for every activity, picks the earliest-due activity as
/// current (falling back to the last `force_execution` activity if none
/// fits) and fires `onEnter` on it, per spec.md §4.6.
pub fn initialize<S, H>(stand: &mut Stand, stp: &Stp<H>, host: &mut S, current_year: i32) -> Result<(), ScriptError>
where
    S: Host<Handle = H>,
    H: Clone + std::fmt::Debug,
{
    stand.rotation_start_year = current_year;
    stand.flags = stp.default_flags();

    for activity in stp.activities() {
        activity
            .header
            .events
            .run(EventKind::OnSetup, stand.id, &activity.header.name, host)?;
    }

    stand.current_index = stp
        .next_activity_by_earliest_schedule(&stand.flags, stand.rotation_start_year)
        .map(|i| i as ActivityIndex)
        .unwrap_or(NO_ACTIVITY);
    if stand.current_index == NO_ACTIVITY {
        if let Some(fallback) = stp.last_force_execution_activity() {
            stand.current_index = fallback as ActivityIndex;
        }
    }

    if let Some(current) = stp.activity_by_index(stand.current_index) {
        current
            .header
            .events
            .run(EventKind::OnEnter, stand.id, &current.header.name, host)?;
    }
    Ok(())
}

/// Re-derives `current_index` after an out-of-band change (e.g. an STP
/// swap via `agentUpdate`), without resetting the rotation clock.
pub fn reload<H>(stand: &mut Stand, stp: &Stp<H>) {
    stand.current_index = stp
        .next_activity_by_earliest_schedule(&stand.flags, stand.rotation_start_year)
        .map(|i| i as ActivityIndex)
        .unwrap_or(NO_ACTIVITY);
}

/// Offers the stand's current activity a chance to run this year.
///
/// Returns `Some(EvaluateResult)` when the activity is due and has been
/// evaluated (the caller, typically the scheduler, decides whether to
/// book a ticket); `None` when the stand has no current activity, or its
/// schedule reports [`crate::schedule::ScheduleValue::Expired`].
pub fn plan_update<S, H>(
    stand: &mut Stand,
    stp: &Stp<H>,
    host: &mut S,
    rng: &mut impl Rng,
    current_year: i32,
) -> Option<activity::EvaluateResult>
where
    S: Host,
    H: Clone + std::fmt::Debug,
{
    if stand.is_asleep() {
        return None;
    }
    let activity = stp.activity_by_index(stand.current_index)?;
    let age = absolute_age(stand, current_year);
    let rotation_length = stp.rotation_length.for_intensity(stand.thinning_intensity);
    let value = activity.header.schedule.value(age, current_year, rotation_length);
    if value.is_expired() {
        return None;
    }

    let ctx = ActivityContext {
        area_ha: stand.area_ha,
        disturbed_timber_m3: stand.disturbed_timber_m3,
    };
    let result = activity::evaluate(activity, stand.id, &ctx, host, rng);
    stand.scheduled_harvest_m3 = result.scheduled_harvest_m3;
    Some(result)
}

/// Runs the stand's current activity for real.
///
/// Used directly for activities the STP drives itself (repeating/salvage
/// activities, or any activity run outside of the scheduler's ticket
/// queue); scheduled thinnings normally run through
/// [`crate::scheduler::Scheduler::run`] instead, which calls
/// [`crate::activity::execute`] directly and then [`after_execution`].
pub fn execute<S, H>(
    stand: &mut Stand,
    stp: &Stp<H>,
    properties: &mut PropertyTable,
    host: &mut S,
    rng: &mut impl Rng,
    current_year: i32,
) -> Result<Option<ActivityOutcome>, ScriptError>
where
    S: Host + crate::host::ScriptHost<Handle = H>,
    H: Clone + std::fmt::Debug,
{
    if stand.is_asleep() {
        return Ok(None);
    }
    let activity = stp.activity_by_index(stand.current_index).expect("current_index in range");
    let ctx = ActivityContext {
        area_ha: stand.area_ha,
        disturbed_timber_m3: stand.disturbed_timber_m3,
    };
    let outcome = activity::execute(activity, stand.id, &ctx, host, rng)?;
    let harvested = outcome.harvest_m3();
    if harvested > 0.0 {
        stand.harvested_m3 += harvested;
        stand.total_removed_m3_ha += harvested / stand.area_ha.max(f64::EPSILON);
    }
    if let ActivityOutcome::Salvage(s) = &outcome {
        stand.disturbed_timber_m3 = (stand.disturbed_timber_m3 - s.extra_harvest_m3).max(0.0);
    }

    let repeating = activity.is_repeating();
    if !repeating {
        stand.flags[stand.current_index as usize].active = false;
        after_execution(stand, stp, properties, host, current_year, false)?;
    }

    Ok(Some(outcome))
}

/// Advances `current_index` to the next activity after one has run (or
/// been cancelled), per spec.md §4.6's `afterExecution` step.
///
/// A `forced_next` flag always wins and is cleared on the jump. Failing
/// that, if the outgoing activity is a final harvest, every activity's
/// `active` flag is reset and a new rotation begins before the normal
/// smallest-`earliestSchedule` scan runs. If that scan finds nothing,
/// `current_index` becomes [`NO_ACTIVITY`]: a stand asleep for the rest
/// of the rotation, not an error.
///
/// `cancel` selects whether the outgoing activity is told `onExecuted`
/// or `onCancel`; a transition to a different activity additionally fires
/// `onExit` on the outgoing one and `onEnter` on the incoming one.
pub fn after_execution<S, H>(
    stand: &mut Stand,
    stp: &Stp<H>,
    properties: &mut PropertyTable,
    host: &mut S,
    current_year: i32,
    cancel: bool,
) -> Result<(), ScriptError>
where
    S: Host<Handle = H>,
    H: Clone + std::fmt::Debug,
{
    let _ = properties;
    let outgoing_index = stand.current_index;

    if let Some(outgoing) = stp.activity_by_index(outgoing_index) {
        let event = if cancel { EventKind::OnCancel } else { EventKind::OnExecuted };
        outgoing.header.events.run(event, stand.id, &outgoing.header.name, host)?;
    }

    let forced = stand.flags.iter().position(|f| f.forced_next);
    let next_index = if let Some(forced_index) = forced {
        stand.flags[forced_index].forced_next = false;
        forced_index as ActivityIndex
    } else {
        if outgoing_index >= 0 && stand.flags[outgoing_index as usize].final_harvest {
            for flag in stand.flags.iter_mut() {
                flag.active = true;
            }
            new_rotation(stand, current_year);
        }
        stp.next_activity_by_earliest_schedule(&stand.flags, stand.rotation_start_year)
            .map(|i| i as ActivityIndex)
            .unwrap_or(NO_ACTIVITY)
    };

    if next_index != outgoing_index {
        if let Some(outgoing) = stp.activity_by_index(outgoing_index) {
            outgoing.header.events.run(EventKind::OnExit, stand.id, &outgoing.header.name, host)?;
        }
        if let Some(incoming) = stp.activity_by_index(next_index) {
            incoming.header.events.run(EventKind::OnEnter, stand.id, &incoming.header.name, host)?;
        }
    }

    stand.current_index = next_index;
    Ok(())
}

/// Resets a stand's rotation-scoped bookkeeping at the start of a fresh
/// rotation: the rotation clock and the harvest/growth/removal running
/// totals. Flags and `current_index` are the caller's responsibility
/// (set by [`after_execution`] before calling this).
pub fn new_rotation(stand: &mut Stand, current_year: i32) {
    stand.rotation_start_year = current_year;
    stand.harvested_m3 = 0.0;
    stand.total_removed_m3_ha = 0.0;
    stand.total_growth_m3_ha = 0.0;
    stand.removal_events = 0;
}

/// Parks a stand until `until_year`, clearing its current activity.
pub fn sleep(stand: &mut Stand, until_year: i32) {
    stand.sleep_until = until_year;
    stand.current_index = NO_ACTIVITY;
}

/// Wakes a sleeping stand whose `sleep_until` has passed, re-deriving
/// `current_index` from the STP.
pub fn wake_if_due<H>(stand: &mut Stand, stp: &Stp<H>, current_year: i32) {
    if stand.sleep_until <= current_year {
        stand.sleep_until = i32::MAX;
        reload(stand, stp);
    }
}

/// Gives every repeating activity (and the salvage activity, if any, when
/// disturbed timber is standing) a chance to run this year, independent
/// of `current_index`.
///
/// Mirrors the component design's observation that repeating activities
/// (grazing, monitoring, salvage) are not part of the stand's single
/// "current activity" pointer: the main rotation keeps advancing through
/// [`plan_update`]/[`execute`] while these run alongside it every year
/// their schedule is due.
pub fn offer_side_activities<S, H>(
    stand: &mut Stand,
    stp: &Stp<H>,
    host: &mut S,
    rng: &mut impl Rng,
    current_year: i32,
) -> Result<Vec<ActivityOutcome>, ScriptError>
where
    S: Host + crate::host::ScriptHost<Handle = H>,
    H: Clone + std::fmt::Debug,
{
    let mut outcomes = Vec::new();
    let rotation_length = stp.rotation_length.for_intensity(stand.thinning_intensity);
    let age = absolute_age(stand, current_year);

    let mut indices: Vec<usize> = stp.repeating_activity_indices().collect();
    if stand.disturbed_timber_m3 > 0.0 {
        if let Some(salvage) = stp.salvage_index() {
            indices.push(salvage);
        }
    }

    for index in indices {
        if !stand.flags[index].enabled {
            continue;
        }
        let activity = &stp.activities()[index];
        let due = activity.header.schedule.value(age, current_year, rotation_length);
        if due.suitability_or_zero() <= 0.0 {
            continue;
        }
        let ctx = ActivityContext {
            area_ha: stand.area_ha,
            disturbed_timber_m3: stand.disturbed_timber_m3,
        };
        let outcome = activity::execute(activity, stand.id, &ctx, host, rng)?;
        let harvested = outcome.harvest_m3();
        if harvested > 0.0 {
            stand.harvested_m3 += harvested;
            stand.total_removed_m3_ha += harvested / stand.area_ha.max(f64::EPSILON);
        }
        if let ActivityOutcome::Salvage(s) = &outcome {
            stand.disturbed_timber_m3 = (stand.disturbed_timber_m3 - s.extra_harvest_m3).max(0.0);
        }
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// Records a tree removal against the stand's disturbance/removal
/// bookkeeping (death, disturbance, salvage or harvest), and routes
/// disturbance volume into `disturbed_timber_m3` for the salvage
/// activity to pick up, per `FMStand::addTreeRemoval`.
///
/// Disturbance removals are first passed through the stand's salvage
/// activity's [`crate::activity::SalvageConfig::test_remove`] filter, if
/// the STP has one; a rejected removal is recorded (for MAI purposes)
/// but not added to `disturbed_timber_m3`, since it is left standing.
///
/// `volume_m3` is the removed tree's stem volume, `damage_fraction` the
/// tree's fractional crown/stem damage (ignored for non-disturbance
/// reasons). The denominator used by [`calculate_mai`] counts every
/// removal event regardless of reason, matching the source (see
/// `DESIGN.md`).
pub fn add_tree_removal<S, H>(
    stand: &mut Stand,
    stp: &Stp<H>,
    host: &mut S,
    volume_m3: f64,
    damage_fraction: f64,
    reason: RemovalReason,
) where
    S: crate::host::ScriptHost,
{
    stand.removal_events += 1;
    stand.total_removed_m3_ha += volume_m3 / stand.area_ha.max(f64::EPSILON);
    if reason != RemovalReason::Disturbance {
        return;
    }
    let salvages = match stp.salvage_index().and_then(|i| stp.activities().get(i)) {
        Some(activity) => match &activity.kind {
            crate::activity::ActivityKind::Salvage(cfg) => cfg.test_remove(host, damage_fraction),
            _ => true,
        },
        None => true,
    };
    if salvages {
        stand.disturbed_timber_m3 += volume_m3;
    }
}

/// Recomputes mean annual increment from the rotation's accumulated
/// growth and removals.
///
/// `growth_m3_ha` is the standing-volume growth increment for the year,
/// added to the running total before the mean is taken over the
/// rotation's elapsed years. The denominator is the number of removal
/// events recorded so far plus the elapsed rotation years, matching the
/// original's `(mTotalRemovedVolume / mTotalGrowth) ...`-style ratio
/// (documented Open Question, see `DESIGN.md`).
pub fn calculate_mai(stand: &mut Stand, growth_m3_ha: f64, current_year: i32) {
    stand.total_growth_m3_ha += growth_m3_ha;
    let years = (current_year - stand.rotation_start_year).max(1) as f64;
    stand.mai_m3_ha_yr = stand.total_growth_m3_ha / years;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ActivityFlags as Flags, ActivityHeader, ActivityKind, GeneralConfig};
    use crate::schedule::Schedule;
    use crate::stp::{RotationLengths, Stp};
    use crate::test_support::{FakeHost, NullScriptHost};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stp_with_two_activities() -> Stp<String> {
        let early = Activity::new(
            ActivityHeader::new("early", 0, Schedule::builder().window(10.0, 20.0, 30.0).build().unwrap()),
            ActivityKind::General(GeneralConfig { action: "a".into() }),
        );
        let late = Activity::new(
            ActivityHeader::new("late", 0, Schedule::builder().window(40.0, 50.0, 60.0).build().unwrap()),
            ActivityKind::General(GeneralConfig { action: "b".into() }),
        );
        Stp::new("p", RotationLengths::default(), vec![early, late]).unwrap()
    }

    #[test]
    fn initialize_picks_earliest_due_activity() {
        let stp = stp_with_two_activities();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 1.0);
        let mut host = FakeHost::new();
        initialize(&mut stand, &stp, &mut host, 2000).unwrap();
        assert_eq!(stand.current_index, 0);
        assert_eq!(stand.flags().len(), 2);
    }

    #[test]
    fn after_execution_advances_to_next_and_then_sleeps_when_none_remain() {
        let stp = stp_with_two_activities();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 1.0);
        let mut host = FakeHost::new();
        initialize(&mut stand, &stp, &mut host, 2000).unwrap();
        let mut properties = PropertyTable::new();

        stand.flags[0].active = false;
        after_execution(&mut stand, &stp, &mut properties, &mut host, 2010, false).unwrap();
        assert_eq!(stand.current_index, 1);

        stand.flags[1].active = false;
        after_execution(&mut stand, &stp, &mut properties, &mut host, 2040, false).unwrap();
        // Neither activity is a final harvest, so no rotation restart is
        // triggered: with nothing left active, the stand goes dormant.
        assert_eq!(stand.current_index, NO_ACTIVITY);
    }

    #[test]
    fn after_execution_on_final_harvest_resets_flags_and_starts_new_rotation() {
        let early = Activity::new(
            ActivityHeader::new("early", 0, Schedule::builder().window(10.0, 20.0, 30.0).build().unwrap()),
            ActivityKind::General(GeneralConfig { action: "a".into() }),
        );
        let mut late_header =
            ActivityHeader::new("late", 0, Schedule::builder().window(40.0, 50.0, 60.0).build().unwrap());
        late_header.default_flags.final_harvest = true;
        let late = Activity::new(late_header, ActivityKind::General(GeneralConfig { action: "b".into() }));
        let stp = Stp::new("p", RotationLengths::default(), vec![early, late]).unwrap();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 1.0);
        let mut host = FakeHost::new();
        initialize(&mut stand, &stp, &mut host, 2000).unwrap();
        let mut properties = PropertyTable::new();

        stand.flags[0].active = false;
        after_execution(&mut stand, &stp, &mut properties, &mut host, 2010, false).unwrap();
        assert_eq!(stand.current_index, 1);

        stand.flags[1].active = false;
        after_execution(&mut stand, &stp, &mut properties, &mut host, 2040, false).unwrap();
        assert_eq!(stand.rotation_start_year, 2040);
        assert_eq!(stand.current_index, 0);
        assert!(stand.flags[0].active);
        assert!(stand.flags[1].active);
    }

    #[test]
    fn after_execution_jumps_to_forced_next_activity() {
        let stp = stp_with_two_activities();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 1.0);
        let mut host = FakeHost::new();
        initialize(&mut stand, &stp, &mut host, 2000).unwrap();
        let mut properties = PropertyTable::new();

        stand.flags[1].forced_next = true;
        after_execution(&mut stand, &stp, &mut properties, &mut host, 2010, false).unwrap();
        assert_eq!(stand.current_index, 1);
        assert!(!stand.flags[1].forced_next);
    }

    #[test]
    fn add_tree_removal_disturbance_feeds_disturbed_timber() {
        let stp = stp_with_two_activities();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 2.0);
        let mut host = FakeHost::new();
        add_tree_removal(&mut stand, &stp, &mut host, 5.0, 0.0, RemovalReason::Disturbance);
        assert_eq!(stand.disturbed_timber_m3, 5.0);
        add_tree_removal(&mut stand, &stp, &mut host, 3.0, 0.0, RemovalReason::Harvest);
        assert_eq!(stand.disturbed_timber_m3, 5.0);
        assert_eq!(stand.total_removed_m3_ha, 4.0);
    }

    #[test]
    fn add_tree_removal_respects_salvage_condition() {
        let salvage = Activity::new(
            ActivityHeader::new("Salvage", 0, Schedule::repeating(1)),
            ActivityKind::Salvage(crate::activity::SalvageConfig {
                disturbance_condition: Some("damage_fraction > 0.5".to_string()),
                ..Default::default()
            }),
        );
        let stp = Stp::new("p", RotationLengths::default(), vec![salvage]).unwrap();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 1.0);
        let mut host = FakeHost {
            script: NullScriptHost::with_expression_value(0.0),
            ..FakeHost::new()
        };
        add_tree_removal(&mut stand, &stp, &mut host, 10.0, 0.1, RemovalReason::Disturbance);
        assert_eq!(stand.disturbed_timber_m3, 0.0);
    }

    #[test]
    fn offer_side_activities_runs_salvage_when_disturbed_timber_present() {
        let salvage = Activity::new(
            ActivityHeader::new("Salvage", 0, Schedule::repeating(1)),
            ActivityKind::Salvage(crate::activity::SalvageConfig::default()),
        );
        let stp = Stp::new("p", RotationLengths::default(), vec![salvage]).unwrap();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 1.0);
        let mut host = FakeHost::new();
        initialize(&mut stand, &stp, &mut host, 2000).unwrap();
        stand.disturbed_timber_m3 = 12.0;
        let mut rng = StdRng::seed_from_u64(1);
        let outcomes = offer_side_activities(&mut stand, &stp, &mut host, &mut rng, 2001).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], ActivityOutcome::Salvage(_)));
    }

    #[test]
    fn execute_runs_general_activity_and_advances_when_not_repeating() {
        let stp = stp_with_two_activities();
        let mut stand = Stand::new(StandId::new(1), UnitId::new(0), StpId::new(0), 1.0);
        let mut host = FakeHost {
            script: NullScriptHost::with_call_result("true"),
            ..FakeHost::new()
        };
        initialize(&mut stand, &stp, &mut host, 2000).unwrap();
        let mut properties = PropertyTable::new();
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = execute(&mut stand, &stp, &mut properties, &mut host, &mut rng, 2000).unwrap();
        assert!(matches!(outcome, Some(ActivityOutcome::Ran(true))));
        assert_eq!(stand.current_index, 1);
        let _ = Flags::fresh();
    }
}
