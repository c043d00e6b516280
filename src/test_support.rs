//! Test doubles for the host simulator contract ([`crate::host`]).
//!
//! These are not mocks generated by a framework; they are small, explicit
//! fakes in the teacher's own testing style (hand-rolled structs
//! implementing the production trait), enabled under `#[cfg(test)]` for
//! this crate's own suite and under the `test-support` feature for
//! downstream crates that want the same doubles in their integration
//! tests.

use std::collections::HashMap;

use crate::engine::ids::StandId;
use crate::host::{BoundingBox, Point, RemovalReason, SaplingGrid, StandGrid, Tree, TreeProvider};
use crate::host::ScriptHost;
use crate::salvage_split::HeightGrid;

/// A [`ScriptHost`] double that returns a fixed expression value and/or a
/// fixed callable result, recording every call it receives.
#[derive(Debug, Clone, Default)]
pub struct NullScriptHost {
    expression_value: f64,
    call_result: String,
    pub calls: Vec<(String, StandId)>,
    pub evaluations: Vec<String>,
    pub globals: HashMap<String, String>,
    pub fail_next_call: bool,
    pub fail_next_evaluate: bool,
}

impl NullScriptHost {
    pub fn with_expression_value(value: f64) -> Self {
        Self {
            expression_value: value,
            ..Default::default()
        }
    }

    pub fn with_call_result(result: impl Into<String>) -> Self {
        Self {
            call_result: result.into(),
            ..Default::default()
        }
    }
}

impl ScriptHost for NullScriptHost {
    type Handle = String;

    fn call(&mut self, handle: &Self::Handle, stand: StandId) -> Result<String, String> {
        self.calls.push((handle.clone(), stand));
        if self.fail_next_call {
            self.fail_next_call = false;
            return Err(format!("callable '{handle}' failed"));
        }
        Ok(self.call_result.clone())
    }

    fn evaluate(&mut self, source: &str, _variables: &[(String, f64)]) -> Result<f64, String> {
        self.evaluations.push(source.to_string());
        if self.fail_next_evaluate {
            self.fail_next_evaluate = false;
            return Err(format!("expression '{source}' failed"));
        }
        Ok(self.expression_value)
    }

    fn global_set(&mut self, name: &str, value: &str) {
        self.globals.insert(name.to_string(), value.to_string());
    }
}

/// A single fake tree individual, plain data plus the mutable flags the
/// [`Tree`] trait requires.
#[derive(Debug, Clone, Default)]
pub struct FakeTree {
    pub species: String,
    pub position: Point,
    pub dbh_cm: f64,
    pub height_m: f64,
    pub age_years: u32,
    pub basal_area_m2: f64,
    pub volume_m3: f64,
    pub leaf_area_m2: f64,
    pub foliage_biomass_kg: f64,
    pub stem_biomass_kg: f64,
    pub root_biomass_kg: f64,
    pub removed: bool,
    pub marked_for_harvest: bool,
    pub marked_for_cut: bool,
    pub marked_as_crop_tree: bool,
    pub marked_as_crop_competitor: bool,
}

impl FakeTree {
    pub fn with_dbh(dbh_cm: f64) -> Self {
        Self {
            dbh_cm,
            basal_area_m2: std::f64::consts::PI * (dbh_cm / 200.0).powi(2),
            volume_m3: dbh_cm * 0.05,
            height_m: dbh_cm * 0.6,
            ..Default::default()
        }
    }
}

impl Tree for FakeTree {
    fn species(&self) -> &str {
        &self.species
    }
    fn position(&self) -> Point {
        self.position
    }
    fn dbh_cm(&self) -> f64 {
        self.dbh_cm
    }
    fn height_m(&self) -> f64 {
        self.height_m
    }
    fn age_years(&self) -> u32 {
        self.age_years
    }
    fn basal_area_m2(&self) -> f64 {
        self.basal_area_m2
    }
    fn volume_m3(&self) -> f64 {
        self.volume_m3
    }
    fn leaf_area_m2(&self) -> f64 {
        self.leaf_area_m2
    }
    fn foliage_biomass_kg(&self) -> f64 {
        self.foliage_biomass_kg
    }
    fn stem_biomass_kg(&self) -> f64 {
        self.stem_biomass_kg
    }
    fn root_biomass_kg(&self) -> f64 {
        self.root_biomass_kg
    }
    fn is_dead(&self) -> bool {
        self.removed
    }
    fn marked_for_harvest(&self) -> bool {
        self.marked_for_harvest
    }
    fn marked_for_cut(&self) -> bool {
        self.marked_for_cut
    }
    fn marked_as_crop_tree(&self) -> bool {
        self.marked_as_crop_tree
    }
    fn marked_as_crop_competitor(&self) -> bool {
        self.marked_as_crop_competitor
    }
    fn remove(&mut self) {
        self.removed = true;
    }
    fn remove_partial(&mut self, _foliage_frac: f64, _branch_frac: f64, _stem_frac: f64) {
        self.removed = true;
    }
    fn mark_for_harvest(&mut self, value: bool) {
        self.marked_for_harvest = value;
    }
    fn mark_for_cut(&mut self, value: bool) {
        self.marked_for_cut = value;
    }
    fn mark_crop_tree(&mut self, value: bool) {
        self.marked_as_crop_tree = value;
    }
    fn mark_crop_competitor(&mut self, value: bool) {
        self.marked_as_crop_competitor = value;
    }
}

/// A fake tree/sapling/stand-grid host keyed by stand id, sufficient for
/// unit and integration tests without a real forest simulator.
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    pub trees: HashMap<StandId, Vec<FakeTree>>,
    pub removals: Vec<(StandId, RemovalReason)>,
    pub neighbors: HashMap<StandId, Vec<StandId>>,
    pub areas_ha: HashMap<StandId, f64>,
    pub bounding_boxes: HashMap<StandId, BoundingBox>,
    pub height_grids: HashMap<StandId, HeightGrid>,
    pub saplings_added: Vec<(Point, f64, u32, u32)>,
    /// A host needs a scripting engine too ([`Host`](crate::host::Host)
    /// is the union of all four capability traits); this fake delegates
    /// to a plain [`NullScriptHost`] rather than duplicating it.
    pub script: NullScriptHost,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_trees(&mut self, stand: StandId, trees: Vec<FakeTree>) {
        self.trees.insert(stand, trees);
    }

    pub fn set_neighbors(&mut self, stand: StandId, neighbors: Vec<StandId>) {
        self.neighbors.insert(stand, neighbors);
    }

    pub fn set_area_ha(&mut self, stand: StandId, area: f64) {
        self.areas_ha.insert(stand, area);
    }

    /// A rectangular bounding box that this stand's pixels are considered
    /// to fully occupy (the test double has no real polygon, so every
    /// point inside the box resolves back to this stand).
    pub fn set_bounding_box(&mut self, stand: StandId, bbox: BoundingBox) {
        self.bounding_boxes.insert(stand, bbox);
    }

    pub fn set_height_grid(&mut self, stand: StandId, grid: HeightGrid) {
        self.height_grids.insert(stand, grid);
    }
}

impl StandGrid for FakeHost {
    fn stand_id_at(&self, p: Point) -> Option<StandId> {
        self.bounding_boxes.iter().find_map(|(&stand, bbox)| {
            if p.x >= bbox.min.x && p.x < bbox.max.x && p.y >= bbox.min.y && p.y < bbox.max.y {
                Some(stand)
            } else {
                None
            }
        })
    }

    fn bounding_box(&self, stand: StandId) -> Option<BoundingBox> {
        self.bounding_boxes.get(&stand).copied()
    }

    fn neighbors_of(&self, stand: StandId) -> Vec<StandId> {
        self.neighbors.get(&stand).cloned().unwrap_or_default()
    }

    fn area_ha(&self, stand: StandId) -> f64 {
        self.areas_ha.get(&stand).copied().unwrap_or(1.0)
    }

    fn height_grid(&self, stand: StandId) -> Option<HeightGrid> {
        self.height_grids.get(&stand).cloned()
    }
}

impl TreeProvider for FakeHost {
    type Tree = FakeTree;

    fn trees_in_stand(&self, stand: StandId) -> Vec<Self::Tree> {
        self.trees.get(&stand).cloned().unwrap_or_default()
    }

    fn trees_in_stand_mut(&mut self, stand: StandId) -> Vec<&mut Self::Tree> {
        self.trees.get_mut(&stand).map(|v| v.iter_mut().collect()).unwrap_or_default()
    }

    fn on_tree_removal(&mut self, stand: StandId, reason: RemovalReason) {
        self.removals.push((stand, reason));
    }
}

impl ScriptHost for FakeHost {
    type Handle = String;

    fn call(&mut self, handle: &Self::Handle, stand: StandId) -> Result<String, String> {
        self.script.call(handle, stand)
    }

    fn evaluate(&mut self, source: &str, variables: &[(String, f64)]) -> Result<f64, String> {
        self.script.evaluate(source, variables)
    }

    fn global_set(&mut self, name: &str, value: &str) {
        self.script.global_set(name, value)
    }
}

impl SaplingGrid for FakeHost {
    fn add_sapling(&mut self, cell: Point, height_m: f64, age_years: u32, species_index: u32) {
        self.saplings_added.push((cell, height_m, age_years, species_index));
    }

    fn clear_saplings(&mut self, _cell: Point, _full_clear: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_script_host_returns_fixed_expression_value() {
        let mut host = NullScriptHost::with_expression_value(0.42);
        assert_eq!(host.evaluate("x", &[]).unwrap(), 0.42);
        assert_eq!(host.evaluations, vec!["x".to_string()]);
    }

    #[test]
    fn null_script_host_records_calls() {
        let mut host = NullScriptHost::with_call_result("true");
        host.call(&"onExecute".to_string(), StandId::new(3)).unwrap();
        assert_eq!(host.calls, vec![("onExecute".to_string(), StandId::new(3))]);
    }

    #[test]
    fn fake_host_returns_configured_neighbors() {
        let mut host = FakeHost::new();
        host.set_neighbors(StandId::new(1), vec![StandId::new(2), StandId::new(3)]);
        assert_eq!(host.neighbors_of(StandId::new(1)).len(), 2);
    }
}
