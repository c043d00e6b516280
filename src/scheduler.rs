//! Per-unit harvest scheduler: a priority queue of pending harvest
//! tickets that realises the annual harvest target while respecting
//! spatial (neighbour-harvest exclusion) and temporal (prepone/postpone)
//! rules.
//!
//! Tickets reference their stand and activity by the dense arena ids
//! defined in [`crate::engine::ids`] rather than by pointer, following
//! the engine's "no runtime ownership cycles" design note; a ticket's
//! identity for logging/equality purposes is a [`crate::Id`], matching
//! the teacher's `generate_id()` idiom for auto-assigned ids.

use rand::Rng;

use crate::activity::{self, ActivityContext, ActivityOutcome};
use crate::engine::ids::{ActivityIndex, StandId};
use crate::error::ScriptError;
use crate::host::Host;
use crate::stand::Stand;
use crate::stp::Stp;

/// Per-agent scheduler configuration (component design §3).
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    pub use_scheduler: bool,
    /// Sustainable-harvest blending factor in `[0, 1]`; `1.0` uses the
    /// decadal sustainable-yield target exclusively, `0.0` a pure
    /// bottom-up sum of planned activities.
    pub use_sustainable_harvest: f64,
    pub min_schedule_harvest: f64,
    pub max_schedule_harvest: f64,
    pub max_harvest_overshoot: f64,
    /// Scales the final/thinning targets pushed to the scheduler; `1.0`
    /// is the agent's nominal intensity.
    pub harvest_intensity: f64,
    pub schedule_rebounce_duration: f64,
    pub deviation_decay_rate: f64,
    /// Kept for parity with the source: parsed but never consulted by
    /// [`Scheduler::min_exec_probability`] (see `DESIGN.md`).
    pub min_rating: Option<String>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            use_scheduler: true,
            use_sustainable_harvest: 1.0,
            min_schedule_harvest: 0.0,
            max_schedule_harvest: 10_000.0,
            max_harvest_overshoot: 2.0,
            harvest_intensity: 1.0,
            schedule_rebounce_duration: 5.0,
            deviation_decay_rate: 1.0,
            min_rating: None,
        }
    }
}

/// What kind of harvest a ticket represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestType {
    Thinning,
    EndHarvest,
    Salvage,
}

/// A pending harvest intent sitting in a unit's scheduler queue.
#[derive(Debug, Clone)]
pub struct SchedulerItem {
    pub id: crate::Id,
    pub stand: StandId,
    pub activity_index: ActivityIndex,
    pub harvest_m3: f64,
    pub harvest_per_ha_m3: f64,
    pub harvest_type: HarvestType,
    pub enter_year: i32,
    pub schedule_score: f64,
    pub harvest_score: f64,
    pub score: f64,
    /// Year until which this ticket is banned from executing (neighbour
    /// ban after a final harvest).
    pub forbidden_to: i32,
    /// Best-effort estimate of the year this ticket would fire under its
    /// own schedule, absent any scheduler pressure; used by
    /// [`Scheduler::force_harvest`].
    pub optimal_year: i32,
    execute_immediate: bool,
}

impl SchedulerItem {
    fn recompute_score(&mut self) {
        self.score = if self.execute_immediate {
            1.1
        } else {
            self.schedule_score * self.harvest_score
        };
    }
}

/// Per-unit priority queue of [`SchedulerItem`] tickets plus the unit's
/// current annual harvest targets.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    items: Vec<SchedulerItem>,
    /// Carry-over harvest volume booked outside the normal ticket flow
    /// (salvage extra harvest, etc.), counted against the target on the
    /// next plan update.
    extra_harvest_m3: f64,
    final_cut_target_m3_ha: f64,
    thinning_target_m3_ha: f64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[SchedulerItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn set_harvest_target(&mut self, final_cut_m3_ha: f64, thinning_m3_ha: f64) {
        self.final_cut_target_m3_ha = final_cut_m3_ha.max(0.0);
        self.thinning_target_m3_ha = thinning_m3_ha.max(0.0);
    }

    pub fn final_cut_target(&self) -> f64 {
        self.final_cut_target_m3_ha
    }

    pub fn thinning_target(&self) -> f64 {
        self.thinning_target_m3_ha
    }

    /// Sum of currently queued harvest, split into (final, thinning),
    /// used by the unit's decadal plan update as the bottom-up estimate.
    pub fn planned_harvests(&self) -> (f64, f64) {
        let mut final_m3 = 0.0;
        let mut thinning_m3 = 0.0;
        for item in &self.items {
            match item.harvest_type {
                HarvestType::EndHarvest => final_m3 += item.harvest_m3,
                HarvestType::Thinning | HarvestType::Salvage => thinning_m3 += item.harvest_m3,
            }
        }
        (final_m3, thinning_m3)
    }

    /// Books extra harvest (e.g. from salvage) against the running total
    /// the next scheduler run reports, per the component design's
    /// `addExtraHarvest`.
    pub fn add_extra_harvest(&mut self, volume_m3: f64, _harvest_type: HarvestType) {
        self.extra_harvest_m3 += volume_m3;
    }

    /// Adds a ticket for `stand`'s current activity, and marks the
    /// corresponding flag record pending.
    pub fn add_ticket(
        &mut self,
        stand: &mut Stand,
        area_ha: f64,
        final_harvest: bool,
        schedule_score: f64,
        harvest_score: f64,
        current_year: i32,
    ) {
        let activity_index = stand.current_index;
        stand.flags_mut()[activity_index as usize].pending = true;
        let harvest_m3 = stand.scheduled_harvest_m3;
        let mut item = SchedulerItem {
            id: crate::generate_id(),
            stand: stand.id,
            activity_index,
            harvest_m3,
            harvest_per_ha_m3: if area_ha > 0.0 { harvest_m3 / area_ha } else { 0.0 },
            harvest_type: if final_harvest {
                HarvestType::EndHarvest
            } else {
                HarvestType::Thinning
            },
            enter_year: current_year,
            schedule_score,
            harvest_score,
            score: 0.0,
            forbidden_to: 0,
            optimal_year: current_year,
            execute_immediate: false,
        };
        item.recompute_score();
        self.items.push(item);
    }

    /// Finds the stand's first ticket with enough lead time and marks it
    /// for immediate execution on the next [`Scheduler::run`], per
    /// `forceHarvest`.
    pub fn force_harvest(&mut self, stand: StandId, max_years: i32, current_year: i32) -> bool {
        for item in &mut self.items {
            if item.stand == stand && item.optimal_year - max_years > current_year {
                item.execute_immediate = true;
                item.recompute_score();
                return true;
            }
        }
        false
    }

    /// Threshold a ticket's combined score must meet to execute this
    /// run. The source always returns the constant `0.5` and never
    /// consults the parsed `minRating` expression; this crate keeps that
    /// behavior (see `DESIGN.md`).
    fn min_exec_probability(&self, _current_harvest_m3_ha: f64, _options: &SchedulerOptions) -> f64 {
        0.5
    }

    /// Runs one scheduler pass: refreshes schedule scores, drops dead
    /// tickets, sorts by score (ties broken by earliest `enterYear`),
    /// then executes every ticket at or above the execution threshold
    /// that isn't currently banned.
    ///
    /// Returns the total harvest volume realized by this call.
    pub fn run<S, H>(
        &mut self,
        stands: &mut [Stand],
        stand_index_of: impl Fn(StandId) -> usize,
        stps: &[Stp<H>],
        properties: &mut crate::properties::PropertyTable,
        options: &SchedulerOptions,
        host: &mut S,
        rng: &mut impl Rng,
        current_year: i32,
        neighbors_of: impl Fn(StandId) -> Vec<StandId>,
    ) -> Result<f64, ScriptError>
    where
        S: Host<Handle = H>,
        H: Clone + std::fmt::Debug,
    {
        let mut total_harvested = self.extra_harvest_m3;
        self.extra_harvest_m3 = 0.0;

        // Refresh schedule scores; drop tickets that can no longer fire.
        let mut i = 0;
        while i < self.items.len() {
            let item = &mut self.items[i];
            let stand = &stands[stand_index_of(item.stand)];
            let stp = &stps[stand.stp.index()];
            let activity = &stp.activities()[item.activity_index as usize];
            let rotation_length = stp.rotation_length.for_intensity(stand.thinning_intensity);
            item.schedule_score = activity
                .header
                .schedule
                .value(crate::stand::absolute_age(stand, current_year), current_year, rotation_length)
                .suitability_or_zero();
            item.recompute_score();

            if item.score == 0.0 {
                let stand_idx = stand_index_of(item.stand);
                crate::stand::after_execution(
                    &mut stands[stand_idx],
                    &stps[stands[stand_idx].stp.index()],
                    properties,
                    host,
                    current_year,
                    true,
                )?;
                self.items.remove(i);
            } else {
                i += 1;
            }
        }

        self.items.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.enter_year.cmp(&b.enter_year))
        });

        let mut executed_indices = Vec::new();
        for (idx, item) in self.items.iter().enumerate() {
            if item.forbidden_to >= current_year {
                continue;
            }
            let threshold = self.min_exec_probability(total_harvested, options);
            if item.score < threshold {
                continue;
            }

            let stand_idx = stand_index_of(item.stand);
            let stp_id = stands[stand_idx].stp;
            let stp = &stps[stp_id.index()];
            let activity = &stp.activities()[item.activity_index as usize];
            let ctx = ActivityContext {
                area_ha: crate::stand::area_ha(&stands[stand_idx]),
                disturbed_timber_m3: stands[stand_idx].disturbed_timber_m3,
            };
            let outcome = activity::execute(activity, item.stand, &ctx, host, rng)?;
            let harvested = outcome.harvest_m3();
            total_harvested += harvested;
            record_outcome(&mut stands[stand_idx], &outcome);

            stands[stand_idx].flags_mut()[item.activity_index as usize].pending = false;
            let repeating = activity.is_repeating();
            let final_harvest = item.harvest_type == HarvestType::EndHarvest;
            if !repeating {
                stands[stand_idx].flags_mut()[item.activity_index as usize].active = false;
                crate::stand::after_execution(
                    &mut stands[stand_idx],
                    &stps[stands[stand_idx].stp.index()],
                    properties,
                    host,
                    current_year,
                    !matches!(outcome, ActivityOutcome::Ran(true) | ActivityOutcome::CustomThinned(_) | ActivityOutcome::SelectiveThinned(_) | ActivityOutcome::Planted | ActivityOutcome::Salvage(_)),
                )?;
            }

            if final_harvest {
                let ban_until = current_year + 5;
                let cut_stand = item.stand;
                self.items[idx].forbidden_to = ban_until.max(self.items[idx].forbidden_to);
                let neighbors = neighbors_of(cut_stand);
                for other in self.items.iter_mut() {
                    if neighbors.contains(&other.stand) {
                        other.forbidden_to = ban_until.max(other.forbidden_to);
                    }
                }
            }

            executed_indices.push(idx);
        }

        // Remove executed tickets, highest index first so earlier indices
        // stay valid.
        executed_indices.sort_unstable();
        for idx in executed_indices.into_iter().rev() {
            self.items.remove(idx);
        }

        Ok(total_harvested)
    }
}

fn record_outcome(stand: &mut Stand, outcome: &ActivityOutcome) {
    let harvested = outcome.harvest_m3();
    if harvested > 0.0 {
        stand.harvested_m3 += harvested;
    }
    stand.scheduled_harvest_m3 = 0.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ActivityFlags, ActivityHeader, ActivityKind, GeneralConfig};
    use crate::engine::ids::StpId;
    use crate::schedule::Schedule;
    use crate::stp::{RotationLengths, Stp};
    use crate::test_support::FakeHost;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_stp() -> Stp<String> {
        let schedule = Schedule::builder().window(30.0, 40.0, 50.0).build().unwrap();
        let mut header = ActivityHeader::new("Thin", 0, schedule);
        header.default_flags = ActivityFlags::fresh();
        header.default_flags.scheduled = true;
        let activity = Activity::new(
            header,
            ActivityKind::General(GeneralConfig {
                action: "doThin".to_string(),
            }),
        );
        Stp::new("P", RotationLengths::default(), vec![activity]).unwrap()
    }

    fn make_stand(stp_id: StpId) -> Stand {
        let mut stand = Stand::new(StandId::new(1), crate::engine::ids::UnitId::new(0), stp_id, 1.0);
        stand.flags = vec![ActivityFlags::fresh()];
        stand.current_index = 0;
        stand.scheduled_harvest_m3 = 30.0;
        stand
    }

    #[test]
    fn add_ticket_marks_flag_pending_and_computes_score() {
        let stp = make_stp();
        let mut stand = make_stand(StpId::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.add_ticket(&mut stand, 1.0, false, 1.0, 1.0, 2000);
        assert!(stand.flags()[0].pending);
        assert_eq!(scheduler.items().len(), 1);
        assert_eq!(scheduler.items()[0].score, 1.0);
        let _ = stp;
    }

    #[test]
    fn run_executes_ticket_above_threshold_and_clears_pending() {
        let stp = make_stp();
        let stps = vec![stp];
        let mut stand = make_stand(StpId::new(0));
        let mut scheduler = Scheduler::new();
        scheduler.add_ticket(&mut stand, 1.0, false, 1.0, 1.0, 2000);

        let mut stands = vec![stand];
        let mut properties = crate::properties::PropertyTable::new();
        let options = SchedulerOptions::default();
        let mut host = FakeHost::new();
        host.script = crate::test_support::NullScriptHost::with_call_result("true");
        let mut rng = StdRng::seed_from_u64(1);

        let harvested = scheduler
            .run(
                &mut stands,
                |_| 0,
                &stps,
                &mut properties,
                &options,
                &mut host,
                &mut rng,
                2040,
                |_| Vec::new(),
            )
            .unwrap();
        assert!(harvested > 0.0);
        assert!(scheduler.is_empty());
        assert!(!stands[0].flags()[0].pending);
    }

    #[test]
    fn final_harvest_bans_neighbor_tickets_for_five_years() {
        let mut scheduler = Scheduler::new();
        let a = SchedulerItem {
            id: "a".into(),
            stand: StandId::new(1),
            activity_index: 0,
            harvest_m3: 10.0,
            harvest_per_ha_m3: 10.0,
            harvest_type: HarvestType::EndHarvest,
            enter_year: 2000,
            schedule_score: 1.0,
            harvest_score: 1.0,
            score: 1.0,
            forbidden_to: 0,
            optimal_year: 2000,
            execute_immediate: false,
        };
        let mut b = a.clone();
        b.stand = StandId::new(2);
        scheduler.items = vec![a, b];
        let current_year = 2000;
        let ban_until = current_year + 5;
        scheduler.items[0].forbidden_to = ban_until;
        for other in scheduler.items.iter_mut().skip(1) {
            if vec![StandId::new(2)].contains(&other.stand) {
                other.forbidden_to = ban_until;
            }
        }
        assert_eq!(scheduler.items[1].forbidden_to, 2005);
    }
}
