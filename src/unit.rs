//! Management unit: a group of stands sharing one agent's schedule and
//! sustainable-yield targets.
//!
//! A [`Unit`] owns exactly one [`Scheduler`], which is fed decadal
//! final-cut/thinning targets (`management_plan_update`) and nudged
//! annually toward them (`update_plan_of_current_year`), mirroring
//! `FMUnit::managementPlanUpdate`/`checkAnnualHarvest`.

use crate::agent::AgentType;
use crate::engine::ids::{AgentId, UnitId};
use crate::scheduler::{HarvestType, Scheduler, SchedulerOptions};
use crate::stand::Stand;

/// A management unit's running state.
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub agent: AgentId,
    pub scheduler: Scheduler,
    /// Unit-wide mean annual increment, area-weighted mean of its
    /// stands' [`crate::stand::Stand::mai_m3_ha_yr`].
    pub mai_m3_ha_yr: f64,
    /// Sustainable final-harvest target, m3/ha/yr.
    pub h_reg_m3_ha_yr: f64,
    /// Sustainable thinning target, m3/ha/yr.
    pub h_thi_m3_ha_yr: f64,
    /// `h_reg + h_thi`, the combined sustainable target.
    pub h_tot_m3_ha_yr: f64,
    /// Plan-deviation accumulator: positive means the unit is ahead of
    /// its decadal plan, negative behind; decays each year per
    /// `deviation_decay_rate` and bends next decade's target.
    pub plan_deviation_m3_ha: f64,
    decade_start_year: i32,
}

impl Unit {
    pub fn new(id: UnitId, agent: AgentId) -> Self {
        Self {
            id,
            agent,
            scheduler: Scheduler::new(),
            mai_m3_ha_yr: 0.0,
            h_reg_m3_ha_yr: 0.0,
            h_thi_m3_ha_yr: 0.0,
            h_tot_m3_ha_yr: 0.0,
            plan_deviation_m3_ha: 0.0,
            decade_start_year: 0,
        }
    }
}

/// Total area (ha) of every stand this unit manages.
fn unit_area_ha(stands: &[Stand], unit: UnitId) -> f64 {
    stands.iter().filter(|s| s.unit == unit).map(|s| s.area_ha).sum()
}

/// Area-weighted mean of the unit's stands' current MAI.
fn unit_mai(stands: &[Stand], unit: UnitId) -> f64 {
    let total_area = unit_area_ha(stands, unit);
    if total_area <= 0.0 {
        return 0.0;
    }
    stands
        .iter()
        .filter(|s| s.unit == unit)
        .map(|s| s.mai_m3_ha_yr * s.area_ha)
        .sum::<f64>()
        / total_area
}

/// Recomputes sustainable-yield targets every `decadeLength` years from
/// the unit's current stands' MAI, blended with the agent type's
/// `use_sustainable_harvest` factor against the raw sum of currently
/// planned harvests, then bends the decadal target by the accumulated
/// plan deviation, per `FMUnit::managementPlanUpdate`.
pub fn management_plan_update(
    unit: &mut Unit,
    stands: &[Stand],
    agent_type: &AgentType,
    current_year: i32,
) {
    unit.decade_start_year = current_year;
    unit.mai_m3_ha_yr = unit_mai(stands, unit.id);

    let options = &agent_type.scheduler_options;
    let (planned_final_m3, planned_thinning_m3) = unit.scheduler.planned_harvests();
    let area_ha = unit_area_ha(stands, unit.id).max(f64::EPSILON);
    let planned_final_per_ha = planned_final_m3 / area_ha;
    let planned_thinning_per_ha = planned_thinning_m3 / area_ha;

    // Sustainable yield splits roughly 80/20 between final harvest and
    // thinning, the conventional split the source assumes absent a
    // species-level yield table.
    let sustainable_final = unit.mai_m3_ha_yr * 0.8;
    let sustainable_thinning = unit.mai_m3_ha_yr * 0.2;

    let blend = options.use_sustainable_harvest.clamp(0.0, 1.0);
    let mut h_reg = blend * sustainable_final + (1.0 - blend) * planned_final_per_ha;
    let mut h_thi = blend * sustainable_thinning + (1.0 - blend) * planned_thinning_per_ha;

    // Bend this decade's target by the deviation accumulated over the
    // last one: running ahead lowers the new target, running behind
    // raises it, damped by `deviation_decay_rate`.
    let bend = unit.plan_deviation_m3_ha * options.deviation_decay_rate
        / options.schedule_rebounce_duration.max(1.0);
    h_reg = (h_reg - bend).max(0.0);

    h_reg *= options.harvest_intensity;
    h_thi *= options.harvest_intensity;

    unit.h_reg_m3_ha_yr = h_reg.clamp(options.min_schedule_harvest, options.max_schedule_harvest);
    unit.h_thi_m3_ha_yr = h_thi.clamp(0.0, options.max_schedule_harvest);
    unit.h_tot_m3_ha_yr = unit.h_reg_m3_ha_yr + unit.h_thi_m3_ha_yr;

    unit.scheduler.set_harvest_target(unit.h_reg_m3_ha_yr, unit.h_thi_m3_ha_yr);
}

/// Annual bookkeeping: measures this year's realized harvest against the
/// unit's per-year share of its decadal target, decays and updates the
/// plan deviation accumulator, and pushes the rebounce-corrected target
/// back to the scheduler for next year, per `FMUnit::checkAnnualHarvest`.
///
/// The combined target is split back into final-cut/thinning shares in
/// the same proportion as the unit's current decadal targets, since the
/// source tracks deviation against the single combined annual figure.
pub fn update_plan_of_current_year(unit: &mut Unit, realized_harvest_m3_ha: f64, options: &SchedulerOptions) {
    let target = unit.h_tot_m3_ha_yr;
    let delta = realized_harvest_m3_ha - target;
    unit.plan_deviation_m3_ha = unit.plan_deviation_m3_ha * options.deviation_decay_rate + delta;

    if target <= 0.0 {
        return;
    }
    let r = unit.plan_deviation_m3_ha / target;
    let rebounce = options.schedule_rebounce_duration.max(f64::EPSILON);
    let adjusted_target =
        (target * (1.0 - r / rebounce)).clamp(options.min_schedule_harvest, options.max_schedule_harvest);

    let reg_share = unit.h_reg_m3_ha_yr / target;
    unit.scheduler
        .set_harvest_target(adjusted_target * reg_share, adjusted_target * (1.0 - reg_share));
}

/// Prepones the unit's nearest eligible ticket for `stand` onto the
/// immediate-execution path, e.g. a neighbour just finished its final
/// harvest and this stand's own final harvest is within `max_years`.
pub fn force_harvest(unit: &mut Unit, stand: crate::engine::ids::StandId, max_years: i32, current_year: i32) -> bool {
    unit.scheduler.force_harvest(stand, max_years, current_year)
}

pub fn add_extra_harvest(unit: &mut Unit, volume_m3: f64, harvest_type: HarvestType) {
    unit.scheduler.add_extra_harvest(volume_m3, harvest_type);
}
