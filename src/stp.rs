//! Stand Treatment Program: an ordered activity vector, per-intensity-class
//! rotation lengths, and top-level `onInit`/`onExit` lifecycle events.
//!
//! Activity objects are supplied already-built (this crate has no script
//! object graph to introspect, see the host simulator contract); setup
//! here is limited to validating, indexing and sorting them by earliest
//! schedule so a stand always meets its activities in chronological
//! order, mirroring the component design's STP setup step.

use crate::activity::{Activity, ActivityFlags};
use crate::error::SetupError;
use crate::events::Events;

/// Rotation length per intensity class, `U` in the component design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationLengths {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RotationLengths {
    fn default() -> Self {
        Self {
            low: 90.0,
            medium: 100.0,
            high: 110.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinningIntensity {
    Low,
    Medium,
    High,
}

impl RotationLengths {
    pub fn for_intensity(&self, intensity: ThinningIntensity) -> f64 {
        match intensity {
            ThinningIntensity::Low => self.low,
            ThinningIntensity::Medium => self.medium,
            ThinningIntensity::High => self.high,
        }
    }
}

/// A stand treatment program: a named, ordered list of activities a
/// stand works through over one rotation.
#[derive(Debug, Clone)]
pub struct Stp<H> {
    pub name: String,
    pub rotation_length: RotationLengths,
    activities: Vec<Activity<H>>,
    events: Events<H>,
    has_repeating_activities: bool,
    salvage_index: Option<usize>,
}

impl<H> Stp<H> {
    /// Builds a program from an already-constructed activity list.
    ///
    /// Sorts activities by earliest schedule (using the medium rotation
    /// length as the representative `U`, since this runs before any
    /// stand exists to supply its own), assigns each activity's index in
    /// the sorted order, and detects whether a salvage activity or any
    /// other repeating activities are present.
    pub fn new(
        name: impl Into<String>,
        rotation_length: RotationLengths,
        mut activities: Vec<Activity<H>>,
    ) -> Result<Self, SetupError> {
        let name = name.into();
        if activities.is_empty() {
            return Err(SetupError::EmptyStp(name));
        }

        activities.sort_by(|a, b| {
            let sa = a.header.schedule.earliest_schedule(0, rotation_length.medium);
            let sb = b.header.schedule.earliest_schedule(0, rotation_length.medium);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut has_repeating_activities = false;
        let mut salvage_index = None;
        for (i, activity) in activities.iter_mut().enumerate() {
            activity.header.index = i as i32;
            if activity.is_salvage() {
                salvage_index = Some(i);
            } else if activity.is_repeating() {
                has_repeating_activities = true;
            }
        }

        Ok(Self {
            name,
            rotation_length,
            activities,
            events: Events::default(),
            has_repeating_activities,
            salvage_index,
        })
    }

    pub fn bind_events(&mut self, events: Events<H>) {
        self.events = events;
    }

    pub fn events(&self) -> &Events<H> {
        &self.events
    }

    pub fn activities(&self) -> &[Activity<H>] {
        &self.activities
    }

    pub fn activity(&self, name: &str) -> Option<&Activity<H>> {
        self.activities.iter().find(|a| a.header.name == name)
    }

    pub fn activity_by_index(&self, index: i32) -> Option<&Activity<H>> {
        if index < 0 {
            return None;
        }
        self.activities.get(index as usize)
    }

    /// A fresh copy of every activity's default flags, one per activity,
    /// index-aligned with [`Stp::activities`]; snapshotted onto a stand
    /// at `initialize`.
    pub fn default_flags(&self) -> Vec<ActivityFlags> {
        self.activities.iter().map(|a| a.header.default_flags).collect()
    }

    pub fn has_repeating_activities(&self) -> bool {
        self.has_repeating_activities
    }

    pub fn salvage_index(&self) -> Option<usize> {
        self.salvage_index
    }

    /// Indices of non-salvage repeating activities; the stand driver
    /// offers these a chance to run every year regardless of the
    /// current-activity pointer. Salvage is handled separately via
    /// [`Stp::salvage_index`] since its trigger condition (disturbed
    /// timber present) differs from an ordinary repeat schedule.
    pub fn repeating_activity_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.activities.iter().enumerate().filter_map(move |(i, a)| {
            if Some(i) == self.salvage_index {
                return None;
            }
            a.header.schedule.is_repeating().then_some(i)
        })
    }

    /// The enabled+active activity with the smallest `earliestSchedule`,
    /// or `None` if every activity is done for this rotation; used by
    /// `afterExecution` to advance the stand's current-activity pointer.
    pub fn next_activity_by_earliest_schedule(
        &self,
        flags: &[ActivityFlags],
        rotation_start_year: i32,
    ) -> Option<usize> {
        flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.enabled && f.active)
            .min_by(|(ia, _), (ib, _)| {
                let sa = self.activities[*ia]
                    .header
                    .schedule
                    .earliest_schedule(rotation_start_year, self.rotation_length.medium);
                let sb = self.activities[*ib]
                    .header
                    .schedule
                    .earliest_schedule(rotation_start_year, self.rotation_length.medium);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    /// Falls back to the last activity configured with `force_execution`
    /// when no activity is otherwise feasible, per the component
    /// design's `initialize` fallback rule.
    pub fn last_force_execution_activity(&self) -> Option<usize> {
        self.activities
            .iter()
            .enumerate()
            .filter(|(_, a)| a.header.schedule.force_execution())
            .map(|(i, _)| i)
            .next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityHeader, ActivityKind, GeneralConfig};
    use crate::schedule::Schedule;

    fn general(name: &str, tmin: f64, topt: f64, tmax: f64) -> Activity<String> {
        let schedule = Schedule::builder().window(tmin, topt, tmax).build().unwrap();
        Activity::new(
            ActivityHeader::new(name, 0, schedule),
            ActivityKind::General(GeneralConfig {
                action: format!("{name}Action"),
            }),
        )
    }

    #[test]
    fn empty_activity_list_is_a_setup_error() {
        let err = Stp::new("p", RotationLengths::default(), vec![]);
        assert!(matches!(err, Err(SetupError::EmptyStp(_))));
    }

    #[test]
    fn activities_are_sorted_by_earliest_schedule_and_reindexed() {
        let activities = vec![general("late", 50.0, 60.0, 70.0), general("early", 10.0, 20.0, 30.0)];
        let stp = Stp::new("p", RotationLengths::default(), activities).unwrap();
        assert_eq!(stp.activities()[0].header.name, "early");
        assert_eq!(stp.activities()[1].header.name, "late");
        assert_eq!(stp.activities()[0].header.index, 0);
        assert_eq!(stp.activities()[1].header.index, 1);
    }

    #[test]
    fn salvage_activity_is_detected_and_excluded_from_has_repeating() {
        let schedule = Schedule::repeating(1);
        let salvage = Activity::new(
            ActivityHeader::new("Salvage", 0, schedule),
            ActivityKind::Salvage(crate::activity::SalvageConfig::default()),
        );
        let stp = Stp::new("p", RotationLengths::default(), vec![salvage]).unwrap();
        assert_eq!(stp.salvage_index(), Some(0));
        assert!(!stp.has_repeating_activities());
    }

    #[test]
    fn next_activity_picks_smallest_earliest_schedule_among_active() {
        let activities = vec![general("a", 10.0, 20.0, 30.0), general("b", 40.0, 50.0, 60.0)];
        let stp = Stp::new("p", RotationLengths::default(), activities).unwrap();
        let flags = stp.default_flags();
        let next = stp.next_activity_by_earliest_schedule(&flags, 0);
        assert_eq!(next, Some(0));
    }
}
