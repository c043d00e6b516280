//! Per (stand × activity) flag record.

/// Independent booleans tracked for one activity on one stand.
///
/// Sized in lockstep with the owning STP's activity vector (exactly one
/// record per activity); stored on [`crate::stand::Stand`] as
/// `Vec<ActivityFlags>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActivityFlags {
    /// Configured on; a disabled activity is never chosen as current.
    pub enabled: bool,
    /// Not yet done in the current rotation.
    pub active: bool,
    /// Currently sitting in the unit scheduler as a ticket.
    pub pending: bool,
    pub final_harvest: bool,
    /// Goes through the scheduler (vs. executing immediately).
    pub scheduled: bool,
    /// Mark-only (no actual removal) vs. actual removal.
    pub do_simulate: bool,
    /// Scheduler forced to fire regardless of score.
    pub execute_immediate: bool,
    /// The stand should jump to this activity next, bypassing the
    /// normal earliest-schedule selection.
    pub forced_next: bool,
    pub salvage: bool,
    pub repeating: bool,
}

impl ActivityFlags {
    /// The default flags for a freshly enabled, not-yet-run activity.
    pub fn fresh() -> Self {
        Self {
            enabled: true,
            active: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_flags_are_enabled_and_active_only() {
        let flags = ActivityFlags::fresh();
        assert!(flags.enabled);
        assert!(flags.active);
        assert!(!flags.pending);
        assert!(!flags.final_harvest);
    }
}
