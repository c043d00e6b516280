//! Dense integer ids for engine-owned arenas.
//!
//! The engine exclusively owns all agents, agent types, STPs, units and
//! stands for the whole simulation (cyclic references, e.g. stand ↔ unit
//! ↔ agent, are resolved by indexing through these newtypes rather than
//! through reference counting).

use std::fmt;

macro_rules! dense_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self(v as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

dense_id!(StandId, "Unique integer id of a managed stand.");
dense_id!(UnitId, "Dense index of a management unit in the engine arena.");
dense_id!(AgentId, "Dense index of an agent in the engine arena.");
dense_id!(AgentTypeId, "Dense index of an agent type in the engine arena.");
dense_id!(StpId, "Dense index of a stand treatment program in the engine arena.");

/// Index of an activity within its owning STP's activity vector.
///
/// `-1` (represented here as `None`) means "no active activity" per the
/// stand invariant that at most one activity is current.
pub type ActivityIndex = i32;

/// The special "no current activity" sentinel.
pub const NO_ACTIVITY: ActivityIndex = -1;
