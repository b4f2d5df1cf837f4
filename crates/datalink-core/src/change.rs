//! Tracks which vessel the simulation is flying.
//!
//! The simulation can switch the active vessel, or leave flight entirely,
//! between any two ticks. Streaming connections need to know when that
//! happens so they push a fresh frame instead of waiting out their
//! interval. [`ChangeDetector::update`] runs once per tick on the
//! simulation thread; readers on any thread compare
//! [`generation`](ChangeDetector::generation) values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use datalink_types::{Vessel, VesselId};
use tracing::debug;

/// Detects switches of the active vessel.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    current: Mutex<Option<VesselId>>,
    generation: AtomicU64,
}

impl ChangeDetector {
    /// Create a detector that has seen no vessel yet.
    pub const fn new() -> Self {
        Self {
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Record this tick's active vessel. Returns `true` when it differs
    /// from the previous tick's, including entering or leaving flight.
    pub fn update(&self, subject: Option<&Vessel>) -> bool {
        let next = subject.map(|v| v.id);
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == next {
            return false;
        }

        debug!(from = ?*current, to = ?next, "active vessel changed");
        *current = next;
        let _ = self
            .generation
            .fetch_update(Ordering::Release, Ordering::Relaxed, |g| {
                Some(g.wrapping_add(1))
            });
        true
    }

    /// Counter bumped on every change. Compare two readings for equality.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use datalink_types::Orbit;

    use super::*;

    fn vessel() -> Vessel {
        Vessel {
            id: VesselId::new(),
            name: "Kestrel".to_owned(),
            altitude: 0.0,
            velocity: datalink_types::Vector3::default(),
            mission_time: 0.0,
            throttle: 0.0,
            sas: false,
            rcs: false,
            orbit: Orbit::default(),
            resources: BTreeMap::new(),
            sensors: Vec::new(),
        }
    }

    #[test]
    fn same_vessel_is_not_a_change() {
        let detector = ChangeDetector::new();
        let v = vessel();
        assert!(detector.update(Some(&v)));
        let first = detector.generation();
        assert!(!detector.update(Some(&v)));
        assert_eq!(detector.generation(), first);
    }

    #[test]
    fn switching_and_leaving_flight_are_changes() {
        let detector = ChangeDetector::new();
        assert!(!detector.update(None));

        let a = vessel();
        let b = vessel();
        assert!(detector.update(Some(&a)));
        assert!(detector.update(Some(&b)));
        assert!(detector.update(None));
        assert_eq!(detector.generation(), 3);
    }
}
