//! Scripting-surface handles exposed to user STP code through the host.
//!
//! These are plain data the engine hands to [`crate::host::ScriptHost`]
//! calls as named globals; they belong to the core's own state, not to
//! the excluded scripting engine itself (the real JS/host object model
//! these mirror is out of scope here).

use super::ids::{ActivityIndex, AgentId, StandId, StpId, UnitId};

/// `fmengine` global: `verbose`, `standId`, `log`, `abort`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FmEngineHandle {
    pub verbose: bool,
    pub stand_id: Option<StandId>,
    pub aborted: bool,
}

/// `stand` global exposed while an activity runs for a given stand.
#[derive(Debug, Clone, Copy)]
pub struct StandHandle {
    pub id: StandId,
    pub unit: UnitId,
    pub absolute_age: f64,
    pub area_ha: f64,
    pub current_activity: ActivityIndex,
}

/// `unit` global exposed during unit-level plan updates.
#[derive(Debug, Clone, Copy)]
pub struct UnitHandle {
    pub id: UnitId,
    pub agent: AgentId,
}

/// `activity` global exposed while an activity runs.
#[derive(Debug, Clone)]
pub struct ActivityHandle {
    pub name: String,
    pub index: ActivityIndex,
    pub stp: StpId,
}

/// `scheduler` global exposed while the per-unit scheduler runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerHandle {
    pub unit: Option<UnitId>,
}

/// `stp` global exposed during STP setup callbacks (`onInit`/`onExit`).
#[derive(Debug, Clone, Copy)]
pub struct StpHandle {
    pub id: StpId,
}

/// `trees` global exposed to ranking/selection expressions.
#[derive(Debug, Clone, Copy)]
pub struct TreesHandle {
    pub stand: StandId,
}
