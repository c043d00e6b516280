//! The forest management engine: owns every stand, unit, agent, agent
//! type and STP for the simulation, and drives the year-by-year
//! plan/execute cycle.

pub mod cancel;
pub mod config;
pub mod ids;
pub mod surface;

use std::collections::HashMap;
use std::fmt::Debug;

use rand::Rng;
use rayon::prelude::*;

use crate::agent::{Agent, AgentType};
use crate::error::AbeError;
use crate::host::{Host, StandGrid};
use crate::properties::PropertyTable;
use crate::stand::Stand;
use crate::stp::Stp;
use crate::unit::{self, Unit};

pub use cancel::CancelToken;
pub use ids::{ActivityIndex, AgentId, AgentTypeId, StandId, StpId, UnitId, NO_ACTIVITY};

/// Owns every arena in the simulation and orchestrates the annual cycle.
///
/// Stands, units, agents, agent types and STPs never hold references to
/// each other directly; they hold the dense ids defined in
/// [`ids`], and the engine is the sole place that resolves an id to
/// the object it names. This sidesteps the reference cycles that a
/// stand <-> unit <-> agent relationship would otherwise require.
///
/// Generic over `H`, the host's opaque script-callable handle type, so
/// that registered [`Stp<H>`] values and the host passed to [`Self::run`]
/// always agree on handle type.
pub struct ForestManagementEngine<H> {
    stands: Vec<Stand>,
    units: Vec<Unit>,
    agents: Vec<Agent>,
    agent_types: Vec<AgentType>,
    stps: Vec<Stp<H>>,
    stp_by_name: HashMap<String, StpId>,

    properties: PropertyTable,
    current_year: i32,
    cancel: CancelToken,
    verbose: bool,
}

impl<H> ForestManagementEngine<H> {
    pub fn new() -> Self {
        Self {
            stands: Vec::new(),
            units: Vec::new(),
            agents: Vec::new(),
            agent_types: Vec::new(),
            stps: Vec::new(),
            stp_by_name: HashMap::new(),
            properties: PropertyTable::new(),
            current_year: 0,
            cancel: CancelToken::new(),
            verbose: false,
        }
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.properties
    }

    pub fn register_stp(&mut self, stp: Stp<H>) -> Result<StpId, AbeError> {
        if stp.activities().is_empty() {
            return Err(crate::error::SetupError::EmptyStp(stp.name.clone()).into());
        }
        let id = StpId::new(self.stps.len() as u32);
        self.stp_by_name.insert(stp.name.clone(), id);
        self.stps.push(stp);
        Ok(id)
    }

    pub fn stp(&self, id: StpId) -> &Stp<H> {
        &self.stps[id.index()]
    }

    pub fn stp_mut(&mut self, id: StpId) -> &mut Stp<H> {
        &mut self.stps[id.index()]
    }

    pub fn stp_id_by_name(&self, name: &str) -> Option<StpId> {
        self.stp_by_name.get(name).copied()
    }

    pub fn add_agent_type(&mut self, agent_type: AgentType) -> AgentTypeId {
        let id = AgentTypeId::new(self.agent_types.len() as u32);
        self.agent_types.push(agent_type);
        id
    }

    pub fn agent_type(&self, id: AgentTypeId) -> &AgentType {
        &self.agent_types[id.index()]
    }

    pub fn add_agent(&mut self, agent: Agent) -> AgentId {
        let id = AgentId::new(self.agents.len() as u32);
        self.agents.push(agent);
        id
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id.index()]
    }

    pub fn add_unit(&mut self, unit: Unit) -> UnitId {
        let id = UnitId::new(self.units.len() as u32);
        self.units.push(unit);
        id
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.index()]
    }

    pub fn unit_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.index()]
    }

    /// Registers a new stand and initializes its activity state against
    /// its STP, per the component design's setup step.
    pub fn add_stand<S>(&mut self, mut stand: Stand, host: &mut S) -> Result<StandId, AbeError>
    where
        S: Host<Handle = H>,
        H: Clone + Debug,
    {
        let id = StandId::new(self.stands.len() as u32);
        stand.id = id;
        crate::stand::initialize(&mut stand, &self.stps[stand.stp.index()], host, self.current_year)?;
        self.stands.push(stand);
        Ok(id)
    }

    pub fn stand(&self, id: StandId) -> &Stand {
        &self.stands[id.index()]
    }

    pub fn stand_mut(&mut self, id: StandId) -> &mut Stand {
        &mut self.stands[id.index()]
    }

    pub fn stands(&self) -> &[Stand] {
        &self.stands
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    fn stand_index_of(&self, id: StandId) -> usize {
        id.index()
    }

    /// Runs one simulation year.
    ///
    /// Orchestration order, per the component design:
    /// 1. Every ten years, each unit recomputes its sustainable-yield
    ///    targets from its stands' current MAI (pure arithmetic, safe to
    ///    parallelize across units with rayon).
    /// 2. Every stand offers its repeating/salvage activities a chance to
    ///    run, and its main rotation activity is evaluated/executed
    ///    through the owning unit's scheduler. This phase is forced
    ///    single-threaded because every activity shares the host's
    ///    mutable script context and tree/sapling state.
    /// 3. Each unit's scheduler runs its ticket queue once all of its
    ///    stands have been offered their year.
    /// 4. Each unit folds this year's realized harvest into its plan
    ///    deviation tracker (pure arithmetic, parallelizable).
    ///
    /// Cooperative cancellation is checked between stands during phase 2;
    /// the decadal and annual bookkeeping phases, being short and
    /// read-mostly, are not interrupted mid-flight.
    pub fn run<S>(&mut self, host: &mut S, rng: &mut impl Rng, year: i32) -> Result<(), AbeError>
    where
        S: Host<Handle = H>,
        H: Clone + Debug + Send + Sync,
    {
        self.current_year = year;
        log::debug!("engine: begin year {year}");

        if year % 10 == 0 {
            let stands = &self.stands;
            let agent_types = &self.agent_types;
            let agents = &self.agents;
            self.units.par_iter_mut().for_each(|u| {
                let agent_type_id = agents[u.agent.index()].agent_type;
                unit::management_plan_update(u, stands, &agent_types[agent_type_id.index()], year);
            });
        }

        for stand_index in 0..self.stands.len() {
            if self.cancel.is_cancelled() {
                return Err(AbeError::Cancelled(format!(
                    "engine run cancelled at stand index {stand_index} in year {year}"
                )));
            }

            let stp_id = self.stands[stand_index].stp;
            crate::stand::wake_if_due(&mut self.stands[stand_index], &self.stps[stp_id.index()], year);

            let side_outcomes = crate::stand::offer_side_activities(
                &mut self.stands[stand_index],
                &self.stps[stp_id.index()],
                host,
                rng,
                year,
            )?;
            for outcome in &side_outcomes {
                if let crate::activity::ActivityOutcome::Salvage(s) = outcome {
                    if s.extra_harvest_m3 > 0.0 {
                        let unit_id = self.stands[stand_index].unit;
                        unit::add_extra_harvest(
                            &mut self.units[unit_id.index()],
                            s.extra_harvest_m3,
                            crate::scheduler::HarvestType::Salvage,
                        );
                    }

                    if s.prepone_requested || s.run_splitter {
                        let salvage_cfg = self.stps[stp_id.index()]
                            .salvage_index()
                            .and_then(|i| self.stps[stp_id.index()].activities().get(i))
                            .and_then(|a| match &a.kind {
                                crate::activity::ActivityKind::Salvage(cfg) => Some(cfg.clone()),
                                _ => None,
                            });
                        let Some(cfg) = salvage_cfg else { continue };

                        if s.prepone_requested {
                            let unit_id = self.stands[stand_index].unit;
                            let stand_id = self.stands[stand_index].id;
                            unit::force_harvest(&mut self.units[unit_id.index()], stand_id, cfg.max_prepone, year);
                        }

                        if s.run_splitter {
                            let stand_id = self.stands[stand_index].id;
                            if let Some(grid) = host.height_grid(stand_id) {
                                let pixel_area_m2 = crate::activity::planting::PIXEL_SIZE_M.powi(2);
                                let min_patch_area_ha = 25.0 * pixel_area_m2 / 10_000.0;
                                let split_outcome = crate::salvage_split::check_stand_after_disturbance(
                                    &grid,
                                    pixel_area_m2,
                                    min_patch_area_ha,
                                    cfg.threshold_split,
                                    cfg.threshold_clear,
                                );
                                match split_outcome {
                                    crate::salvage_split::SplitOutcome::NoSplit => {}
                                    crate::salvage_split::SplitOutcome::TotallyDisturbed => {
                                        crate::stand::initialize(
                                            &mut self.stands[stand_index],
                                            &self.stps[stp_id.index()],
                                            host,
                                            year,
                                        )?;
                                    }
                                    crate::salvage_split::SplitOutcome::Split(components) => {
                                        for component in &components {
                                            let child_area_ha = component.area_ha(pixel_area_m2);
                                            let parent_unit = self.stands[stand_index].unit;
                                            let parent_stp = self.stands[stand_index].stp;
                                            let mut child = Stand::new(
                                                StandId::new(self.stands.len() as u32),
                                                parent_unit,
                                                parent_stp,
                                                child_area_ha,
                                            );
                                            crate::stand::initialize(
                                                &mut child,
                                                &self.stps[parent_stp.index()],
                                                host,
                                                year,
                                            )?;
                                            self.stands[stand_index].area_ha =
                                                (self.stands[stand_index].area_ha - child_area_ha).max(0.0);
                                            self.stands.push(child);
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }

            let current_index = self.stands[stand_index].current_index;
            let already_pending = current_index >= 0
                && self.stands[stand_index].flags()[current_index as usize].pending;

            let evaluation = if already_pending {
                None
            } else {
                crate::stand::plan_update(
                    &mut self.stands[stand_index],
                    &self.stps[stp_id.index()],
                    host,
                    rng,
                    year,
                )
            };
            if let Some(result) = evaluation {
                let unit_id = self.stands[stand_index].unit;
                let stp = &self.stps[stp_id.index()];
                let activity = stp.activity_by_index(current_index).expect("current_index in range");
                let scheduled = self.stands[stand_index].flags()[current_index as usize].scheduled;

                if scheduled {
                    if result.proceed {
                        let final_harvest = activity.header.default_flags.final_harvest;
                        let age = crate::stand::absolute_age(&self.stands[stand_index], year);
                        let rotation_length =
                            stp.rotation_length.for_intensity(self.stands[stand_index].thinning_intensity);
                        let schedule_score = activity
                            .header
                            .schedule
                            .value(age, year, rotation_length)
                            .suitability_or_zero();
                        let area_ha = self.stands[stand_index].area_ha;
                        self.units[unit_id.index()].scheduler.add_ticket(
                            &mut self.stands[stand_index],
                            area_ha,
                            final_harvest,
                            schedule_score,
                            1.0,
                            year,
                        );
                    } else {
                        self.stands[stand_index].flags_mut()[current_index as usize].active = false;
                        crate::stand::after_execution(
                            &mut self.stands[stand_index],
                            &self.stps[stp_id.index()],
                            &mut self.properties,
                            host,
                            year,
                            true,
                        )?;
                    }
                } else {
                    crate::stand::execute(
                        &mut self.stands[stand_index],
                        &self.stps[stp_id.index()],
                        &mut self.properties,
                        host,
                        rng,
                        year,
                    )?;
                }
            }
        }

        let neighbor_cache: HashMap<StandId, Vec<StandId>> = self
            .stands
            .iter()
            .map(|s| (s.id, host.neighbors_of(s.id)))
            .collect();

        for unit_index in 0..self.units.len() {
            let unit_id = UnitId::new(unit_index as u32);
            let stand_indices: Vec<usize> = (0..self.stands.len())
                .filter(|&i| self.stands[i].unit == unit_id)
                .collect();
            let mut scoped_stands: Vec<Stand> =
                stand_indices.iter().map(|&i| self.stands[i].clone()).collect();

            let agent_type_id = self.agents[self.units[unit_index].agent.index()].agent_type;
            let options = self.agent_types[agent_type_id.index()].scheduler_options.clone();

            let harvested = {
                let unit = &mut self.units[unit_index];
                unit.scheduler.run(
                    &mut scoped_stands,
                    |stand_id| stand_indices.iter().position(|&i| self.stands[i].id == stand_id).unwrap(),
                    &self.stps,
                    &mut self.properties,
                    &options,
                    host,
                    rng,
                    year,
                    |stand_id| neighbor_cache.get(&stand_id).cloned().unwrap_or_default(),
                )?
            };

            for (scoped, &orig_index) in scoped_stands.into_iter().zip(stand_indices.iter()) {
                self.stands[orig_index] = scoped;
            }

            unit::update_plan_of_current_year(&mut self.units[unit_index], harvested, &options);
        }

        log::debug!("engine: end year {year}");
        Ok(())
    }
}

impl<H> Default for ForestManagementEngine<H> {
    fn default() -> Self {
        Self::new()
    }
}
