//! abe - Agent-Based forest management Engine
//!
//! Decides, year by year, which silvicultural activities (thinnings,
//! regeneration plantings, salvage logging, custom scripted operations)
//! are carried out on which forest stand, in which order, and with which
//! intensity, subject to agent-level harvest targets and spatial/temporal
//! constraints.
//!
//! This crate implements the decision machinery only: stand treatment
//! programs, the per-stand activity state machine, the unit-level harvest
//! scheduler, the agent/unit planning loop, and disturbance-triggered
//! stand reshaping. Tree growth, climate, soil, scripting and rendering
//! are supplied by a host simulator through the traits in [`host`].

pub mod activity;
pub mod agent;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod properties;
pub mod salvage_split;
pub mod schedule;
pub mod scheduler;
pub mod stand;
pub mod stp;
pub mod unit;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{AbeError, ScriptError, SetupError};

/// Opaque identifier for scheduler tickets and other debug-facing
/// artifacts that are not part of the engine's dense arenas.
///
/// Stands, units, agents, agent types and STPs are owned in engine
/// arenas and referred to by dense integer indices (see
/// [`engine::ids`]); this string id is reserved for objects whose
/// identity only needs to be unique for logging/equality, not for
/// O(1) arena lookup.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
