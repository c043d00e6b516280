//! CSV configuration loading: `standId -> (unit, agent/agentType, stp, ...)`.
//!
//! The required columns are `id`, `unit`, one of `agent`/`agentType`, and
//! `stp`; the rest are optional with the defaults noted on each field.
//! Agents and units referenced here but not yet registered are created
//! on first mention by the caller (see [`crate::engine::ForestManagementEngine`]).

use serde::Deserialize;

/// One row of the stand configuration table.
#[derive(Debug, Clone, Deserialize)]
pub struct StandRecord {
    pub id: u32,
    pub unit: String,

    #[serde(default)]
    pub agent: Option<String>,
    #[serde(rename = "agentType", default)]
    pub agent_type: Option<String>,

    pub stp: String,

    #[serde(rename = "speciesComposition", default)]
    pub species_composition: Option<String>,

    #[serde(rename = "thinningIntensity", default)]
    pub thinning_intensity: Option<String>,

    /// Rotation length override; defaults to the STP's own `U` when unset.
    #[serde(default)]
    pub u: Option<f64>,

    /// Mean annual increment seed; defaults to `0.0` (computed at runtime
    /// from observed removals) when unset.
    #[serde(default)]
    pub mai: Option<f64>,

    #[serde(rename = "harvestMode", default)]
    pub harvest_mode: Option<String>,
}

impl StandRecord {
    /// The agent reference for this row: either a concrete agent name
    /// or an agent-type name (from which a default agent is derived).
    ///
    /// Returns `None` if neither `agent` nor `agentType` was set, which
    /// the loader should reject.
    pub fn agent_reference(&self) -> Option<AgentReference<'_>> {
        if let Some(agent) = &self.agent {
            Some(AgentReference::Agent(agent))
        } else {
            self.agent_type.as_deref().map(AgentReference::AgentType)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentReference<'a> {
    Agent(&'a str),
    AgentType(&'a str),
}

/// Reads stand configuration rows from a CSV reader (a file, a string
/// buffer, whatever implements `std::io::Read`).
pub fn read_stand_records<R: std::io::Read>(
    reader: R,
) -> Result<Vec<StandRecord>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    rdr.deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_row() {
        let csv = "id,unit,agent,stp\n1,U1,Agent1,StpA\n";
        let records = read_stand_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].unit, "U1");
        assert_eq!(records[0].agent_reference(), Some(AgentReference::Agent("Agent1")));
    }

    #[test]
    fn parses_agent_type_column_when_agent_is_absent() {
        let csv = "id,unit,agentType,stp\n2,U1,TypeA,StpB\n";
        let records = read_stand_records(csv.as_bytes()).unwrap();
        assert_eq!(
            records[0].agent_reference(),
            Some(AgentReference::AgentType("TypeA"))
        );
    }

    #[test]
    fn optional_columns_default_to_none() {
        let csv = "id,unit,agent,stp\n3,U2,Agent2,StpC\n";
        let records = read_stand_records(csv.as_bytes()).unwrap();
        assert!(records[0].species_composition.is_none());
        assert!(records[0].mai.is_none());
    }
}
