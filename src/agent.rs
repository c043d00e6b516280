//! Decision archetypes and individual agents.
//!
//! An [`AgentType`] is the script object's logic: a library of STPs keyed
//! by name, the [`crate::scheduler::SchedulerOptions`] every unit it
//! manages inherits, and a set of agent-update rules (§6's
//! `unit.agentUpdate(what, how, when)` surface). An [`Agent`] is an
//! individual instance of a type, owning a set of managed units.

use std::collections::HashMap;

use crate::engine::ids::{AgentTypeId, StpId, UnitId};
use crate::scheduler::SchedulerOptions;

/// One `unit.agentUpdate(what, how, when)` rule registered by an agent
/// type's script object; `what`/`how`/`when` are opaque strings the host
/// scripting layer interprets (e.g. `what="U"`, `how="+10"`, `when="age>80"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentUpdateRule {
    pub what: String,
    pub how: String,
    pub when: String,
}

/// A decision archetype: the species-composition catalogue, STP library
/// and scheduler defaults shared by every agent instantiated from it.
#[derive(Debug, Clone)]
pub struct AgentType {
    pub name: String,
    stps: HashMap<String, StpId>,
    pub scheduler_options: SchedulerOptions,
    pub agent_update_rules: Vec<AgentUpdateRule>,
}

impl AgentType {
    pub fn new(name: impl Into<String>, scheduler_options: SchedulerOptions) -> Self {
        Self {
            name: name.into(),
            stps: HashMap::new(),
            scheduler_options,
            agent_update_rules: Vec::new(),
        }
    }

    /// Registers an STP under this agent type's library, keyed by name.
    pub fn add_stp(&mut self, name: impl Into<String>, stp: StpId) {
        self.stps.insert(name.into(), stp);
    }

    pub fn stp_by_name(&self, name: &str) -> Option<StpId> {
        self.stps.get(name).copied()
    }

    pub fn add_agent_update_rule(&mut self, rule: AgentUpdateRule) {
        self.agent_update_rules.push(rule);
    }
}

/// An individual agent: a named instance of an [`AgentType`], managing a
/// set of units.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub agent_type: AgentTypeId,
    units: Vec<UnitId>,
}

impl Agent {
    pub fn new(name: impl Into<String>, agent_type: AgentTypeId) -> Self {
        Self {
            name: name.into(),
            agent_type,
            units: Vec::new(),
        }
    }

    pub fn add_unit(&mut self, unit: UnitId) {
        if !self.units.contains(&unit) {
            self.units.push(unit);
        }
    }

    pub fn units(&self) -> &[UnitId] {
        &self.units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_type_looks_up_stps_by_name() {
        let mut agent_type = AgentType::new("Default", SchedulerOptions::default());
        agent_type.add_stp("thinning_heavy", StpId::new(3));
        assert_eq!(agent_type.stp_by_name("thinning_heavy"), Some(StpId::new(3)));
        assert_eq!(agent_type.stp_by_name("missing"), None);
    }

    #[test]
    fn agent_tracks_managed_units_without_duplicates() {
        let mut agent = Agent::new("A1", AgentTypeId::new(0));
        agent.add_unit(UnitId::new(1));
        agent.add_unit(UnitId::new(1));
        agent.add_unit(UnitId::new(2));
        assert_eq!(agent.units(), &[UnitId::new(1), UnitId::new(2)]);
    }
}
