//! Host simulator contract (consumed).
//!
//! The core needs a stand grid, tree access, a sapling grid and a
//! scripting engine from its host. These are modeled as traits; a real
//! host (e.g. a stand-level forest landscape simulator) implements them,
//! and this crate supplies test doubles under [`crate::test_support`] for
//! its own test suite.

use crate::engine::ids::StandId;

/// Why a tree was removed from the stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Death,
    Harvest,
    Disturbance,
    Salvaged,
    CutDown,
}

/// A metric 2D point, used for stand grid queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned bounding box in metric coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

/// Maps metric coordinates to stand ids and answers neighbor/area queries.
///
/// 10 m resolution is assumed for neighbor queries, matching the host
/// simulator's light-resolution grid.
pub trait StandGrid {
    fn stand_id_at(&self, p: Point) -> Option<StandId>;
    fn bounding_box(&self, stand: StandId) -> Option<BoundingBox>;
    /// 4-neighbours of `stand`, i.e. stands sharing a grid edge.
    fn neighbors_of(&self, stand: StandId) -> Vec<StandId>;
    fn area_ha(&self, stand: StandId) -> f64;
    /// Disturbance height grid for `stand`, at
    /// [`crate::activity::planting::PIXEL_SIZE_M`] resolution, for the
    /// salvage stand splitter (§4.9). `None` when the host has no height
    /// data for this stand.
    fn height_grid(&self, stand: StandId) -> Option<crate::salvage_split::HeightGrid>;
}

/// A single tree individual, as exposed by the host.
pub trait Tree {
    fn species(&self) -> &str;
    fn position(&self) -> Point;
    fn dbh_cm(&self) -> f64;
    fn height_m(&self) -> f64;
    fn age_years(&self) -> u32;
    fn basal_area_m2(&self) -> f64;
    fn volume_m3(&self) -> f64;
    fn leaf_area_m2(&self) -> f64;
    fn foliage_biomass_kg(&self) -> f64;
    fn stem_biomass_kg(&self) -> f64;
    fn root_biomass_kg(&self) -> f64;

    fn is_dead(&self) -> bool;
    fn marked_for_harvest(&self) -> bool;
    fn marked_for_cut(&self) -> bool;
    fn marked_as_crop_tree(&self) -> bool;
    fn marked_as_crop_competitor(&self) -> bool;

    fn remove(&mut self);
    fn remove_partial(&mut self, foliage_frac: f64, branch_frac: f64, stem_frac: f64);
    fn mark_for_harvest(&mut self, value: bool);
    fn mark_for_cut(&mut self, value: bool);
    fn mark_crop_tree(&mut self, value: bool);
    fn mark_crop_competitor(&mut self, value: bool);
}

/// Lets algorithms written against `T: Tree` run equally over owned trees
/// and over `&mut Tree` borrows returned by [`TreeProvider::trees_in_stand_mut`].
impl<'a, T: Tree> Tree for &'a mut T {
    fn species(&self) -> &str {
        (**self).species()
    }
    fn position(&self) -> Point {
        (**self).position()
    }
    fn dbh_cm(&self) -> f64 {
        (**self).dbh_cm()
    }
    fn height_m(&self) -> f64 {
        (**self).height_m()
    }
    fn age_years(&self) -> u32 {
        (**self).age_years()
    }
    fn basal_area_m2(&self) -> f64 {
        (**self).basal_area_m2()
    }
    fn volume_m3(&self) -> f64 {
        (**self).volume_m3()
    }
    fn leaf_area_m2(&self) -> f64 {
        (**self).leaf_area_m2()
    }
    fn foliage_biomass_kg(&self) -> f64 {
        (**self).foliage_biomass_kg()
    }
    fn stem_biomass_kg(&self) -> f64 {
        (**self).stem_biomass_kg()
    }
    fn root_biomass_kg(&self) -> f64 {
        (**self).root_biomass_kg()
    }
    fn is_dead(&self) -> bool {
        (**self).is_dead()
    }
    fn marked_for_harvest(&self) -> bool {
        (**self).marked_for_harvest()
    }
    fn marked_for_cut(&self) -> bool {
        (**self).marked_for_cut()
    }
    fn marked_as_crop_tree(&self) -> bool {
        (**self).marked_as_crop_tree()
    }
    fn marked_as_crop_competitor(&self) -> bool {
        (**self).marked_as_crop_competitor()
    }
    fn remove(&mut self) {
        (**self).remove()
    }
    fn remove_partial(&mut self, foliage_frac: f64, branch_frac: f64, stem_frac: f64) {
        (**self).remove_partial(foliage_frac, branch_frac, stem_frac)
    }
    fn mark_for_harvest(&mut self, value: bool) {
        (**self).mark_for_harvest(value)
    }
    fn mark_for_cut(&mut self, value: bool) {
        (**self).mark_for_cut(value)
    }
    fn mark_crop_tree(&mut self, value: bool) {
        (**self).mark_crop_tree(value)
    }
    fn mark_crop_competitor(&mut self, value: bool) {
        (**self).mark_crop_competitor(value)
    }
}

/// Access to tree individuals by stand id.
pub trait TreeProvider {
    type Tree: Tree;

    /// All (non-dead) trees currently standing in `stand`.
    fn trees_in_stand(&self, stand: StandId) -> Vec<Self::Tree>;

    /// Mutable access to the trees of `stand`, for activities that mark
    /// or remove individuals in place (thinning, salvage, planting
    /// clears). Returned in the host's own storage order.
    fn trees_in_stand_mut(&mut self, stand: StandId) -> Vec<&mut Self::Tree>;

    /// Notifies the host that a tree was removed, with the reason.
    fn on_tree_removal(&mut self, stand: StandId, reason: RemovalReason);
}

/// High-resolution (2m) sapling cell grid.
pub trait SaplingGrid {
    fn add_sapling(&mut self, cell: Point, height_m: f64, age_years: u32, species_index: u32);
    fn clear_saplings(&mut self, cell: Point, full_clear: bool);
}

/// Capability trait modeling the scripting boundary.
///
/// All activity-variant callbacks (`onExecute`, `action`, `ranking`,
/// `speciesSelectivity`, event hooks) are opaque handles the host
/// resolves; the engine only ever calls through this trait.
pub trait ScriptHost {
    /// Opaque handle to a user callable (function, closure, method).
    type Handle: Clone + std::fmt::Debug;

    /// Calls the callable identified by `handle` with the given
    /// stand as scripting context, returning its string representation.
    fn call(&mut self, handle: &Self::Handle, stand: StandId) -> Result<String, String>;

    /// Evaluates a source expression string against the given context
    /// variables (already dotted-name-folded to underscored keys),
    /// returning a numeric result.
    fn evaluate(&mut self, source: &str, variables: &[(String, f64)]) -> Result<f64, String>;

    /// Sets a named global value visible to subsequently-dispatched
    /// callables (used for `fmengine`, `stand`, `unit`, `activity`, ...).
    fn global_set(&mut self, name: &str, value: &str);
}

/// Everything an activity needs from the host in one bound: scripting,
/// tree access, the sapling grid and the stand grid. A real host
/// implements the four narrower traits on one type and gets this for
/// free.
pub trait Host: ScriptHost + TreeProvider + SaplingGrid + StandGrid {}

impl<T: ScriptHost + TreeProvider + SaplingGrid + StandGrid> Host for T {}
