//! Telemetry snapshot published by the simulation each tick.
//!
//! The simulation owns the authoritative, mutable flight state. Once per
//! tick it projects that state into an immutable [`Telemetry`] value and
//! publishes it to the data link. Network tasks only ever read these
//! snapshots, so a request never observes a half-updated vessel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::VesselId;

/// A three-component vector in the simulation's world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vector3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vector3 {
    /// Create a vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length of the vector.
    pub fn magnitude(&self) -> f64 {
        self.z.mul_add(self.z, self.x.mul_add(self.x, self.y * self.y)).sqrt()
    }
}

/// Keplerian summary of the active vessel's orbit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Orbit {
    /// Name of the body being orbited.
    pub body: String,
    /// Apoapsis altitude in metres above the body's surface.
    pub apoapsis: f64,
    /// Periapsis altitude in metres above the body's surface.
    pub periapsis: f64,
    /// Inclination in degrees (not normalized).
    pub inclination: f64,
    /// Orbital eccentricity.
    pub eccentricity: f64,
    /// Orbital period in seconds.
    pub period: f64,
}

/// Current and maximum amount of one resource aboard a vessel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceLevel {
    /// Amount currently stored.
    pub amount: f64,
    /// Storage capacity.
    pub max: f64,
}

/// A single reading from an onboard sensor part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SensorReading {
    /// Sensor name, unique within the vessel.
    pub name: String,
    /// Measured quantity (e.g. `temperature`, `pressure`).
    pub kind: String,
    /// The reading.
    pub value: f64,
    /// Unit label for display.
    pub unit: String,
}

/// Read-only projection of the active vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vessel {
    /// Stable vessel identity, used to detect vessel switches.
    pub id: VesselId,
    /// Display name.
    pub name: String,
    /// Altitude above sea level in metres.
    pub altitude: f64,
    /// Orbital velocity vector in metres per second.
    pub velocity: Vector3,
    /// Seconds since launch.
    pub mission_time: f64,
    /// Main throttle setting in `[0, 1]`.
    pub throttle: f64,
    /// Whether stability assist is engaged.
    pub sas: bool,
    /// Whether reaction control is engaged.
    pub rcs: bool,
    /// Current orbit.
    pub orbit: Orbit,
    /// Resources keyed by resource name.
    pub resources: BTreeMap<String, ResourceLevel>,
    /// Sensor readings in part order.
    pub sensors: Vec<SensorReading>,
}

/// Global simulation state that exists with or without a vessel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Universe {
    /// Simulation clock in seconds.
    pub universal_time: f64,
    /// Whether the simulation is paused.
    pub paused: bool,
    /// Current time-warp multiplier.
    pub warp_rate: f64,
}

/// One tick's published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Telemetry {
    /// Global state.
    pub universe: Universe,
    /// The active vessel, absent outside of flight.
    pub vessel: Option<Vessel>,
}

impl Telemetry {
    /// Snapshot with the given universe and no active vessel.
    pub const fn without_vessel(universe: Universe) -> Self {
        Self {
            universe,
            vessel: None,
        }
    }

    /// The active vessel, if any.
    pub const fn subject(&self) -> Option<&Vessel> {
        self.vessel.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_of_axis_vectors() {
        let v = Vector3::new(3.0, 4.0, 0.0);
        assert!((v.magnitude() - 5.0).abs() < 1e-9);
        assert!(Vector3::default().magnitude().abs() < f64::EPSILON);
    }

    #[test]
    fn telemetry_without_vessel_has_no_subject() {
        let t = Telemetry::without_vessel(Universe {
            universal_time: 12.0,
            paused: false,
            warp_rate: 1.0,
        });
        assert!(t.subject().is_none());
    }
}
