//! A small flight simulation that stands in for a real game.
//!
//! One vessel sits on the pad of a Kerbin-sized body. Throttle burns fuel
//! and pushes it up, pitching over as it climbs; the orbit is recomputed
//! from position and velocity with two-body equations every step. Staging
//! refills the tank from the next stage until none are left. Sensor
//! readings carry a little random noise.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use datalink_core::FlightControl;
use datalink_types::{
    Orbit, ResourceLevel, SensorReading, Telemetry, Universe, Vector3, Vessel, VesselId,
};
use rand::Rng;
use tracing::{debug, info};

/// Fuel resource name.
pub const LIQUID_FUEL: &str = "LiquidFuel";

/// Battery resource name.
pub const ELECTRIC_CHARGE: &str = "ElectricCharge";

const BODY: &str = "Kerbin";
const BODY_RADIUS: f64 = 600_000.0;
const BODY_MU: f64 = 3.5316e12;

/// Engine acceleration at full throttle, m/s².
const MAX_THRUST: f64 = 30.0;
/// Fuel units burned per second at full throttle.
const FUEL_BURN: f64 = 4.0;
/// Fuel units in each stage's tank.
const STAGE_FUEL: f64 = 400.0;
/// Charge drained per second while SAS or RCS is engaged.
const CHARGE_DRAIN: f64 = 0.5;
const CHARGE_MAX: f64 = 100.0;
/// Altitude at which the ascent is fully horizontal.
const GRAVITY_TURN_END: f64 = 45_000.0;

/// The demonstration simulation. Implements [`FlightControl`] so the data
/// link's control capabilities act on it.
#[derive(Debug, Clone)]
pub struct FlightSim {
    vessel: Vessel,
    universe: Universe,
    stages_left: u32,
}

impl FlightSim {
    /// A fueled vessel on the pad with `stages` spare tanks.
    pub fn new(name: &str, stages: u32) -> Self {
        let mut resources = BTreeMap::new();
        resources.insert(
            LIQUID_FUEL.to_owned(),
            ResourceLevel {
                amount: STAGE_FUEL,
                max: STAGE_FUEL,
            },
        );
        resources.insert(
            ELECTRIC_CHARGE.to_owned(),
            ResourceLevel {
                amount: CHARGE_MAX,
                max: CHARGE_MAX,
            },
        );

        let mut sim = Self {
            vessel: Vessel {
                id: VesselId::new(),
                name: name.to_owned(),
                altitude: 0.0,
                velocity: Vector3::default(),
                mission_time: 0.0,
                throttle: 0.0,
                sas: false,
                rcs: false,
                orbit: Orbit::default(),
                resources,
                sensors: Vec::new(),
            },
            universe: Universe {
                universal_time: 0.0,
                paused: false,
                warp_rate: 1.0,
            },
            stages_left: stages,
        };
        sim.refresh_orbit();
        sim.read_sensors(&mut rand::rng());
        sim
    }

    /// Advance by `real_seconds` of wall time, scaled by the warp rate.
    pub fn step(&mut self, real_seconds: f64) {
        let dt = real_seconds * self.universe.warp_rate;
        if self.universe.paused || dt <= 0.0 || !dt.is_finite() {
            return;
        }
        self.universe.universal_time += dt;
        self.vessel.mission_time += dt;

        let thrust = self.burn(dt);
        let radius = BODY_RADIUS + self.vessel.altitude;
        let gravity = BODY_MU / (radius * radius);
        let pitch = (self.vessel.altitude / GRAVITY_TURN_END).clamp(0.0, 1.0);

        let velocity = &mut self.vessel.velocity;
        velocity.x = (thrust * pitch).mul_add(dt, velocity.x);
        velocity.z = thrust.mul_add(1.0 - pitch, -gravity).mul_add(dt, velocity.z);
        self.vessel.altitude = velocity.z.mul_add(dt, self.vessel.altitude);
        if self.vessel.altitude <= 0.0 {
            self.vessel.altitude = 0.0;
            velocity.z = velocity.z.max(0.0);
            if velocity.z <= 0.0 {
                velocity.x = 0.0;
            }
        }

        self.drain_charge(dt);
        self.refresh_orbit();
        self.read_sensors(&mut rand::rng());
    }

    /// Snapshot for publishing.
    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            universe: self.universe,
            vessel: Some(self.vessel.clone()),
        }
    }

    /// Spare stages remaining.
    pub const fn stages_left(&self) -> u32 {
        self.stages_left
    }

    /// Burn fuel for `dt` seconds. Returns the resulting acceleration.
    fn burn(&mut self, dt: f64) -> f64 {
        let throttle = self.vessel.throttle;
        let Some(fuel) = self.vessel.resources.get_mut(LIQUID_FUEL) else {
            return 0.0;
        };
        let wanted = FUEL_BURN * throttle * dt;
        if wanted <= 0.0 || fuel.amount <= 0.0 {
            return 0.0;
        }
        let used = wanted.min(fuel.amount);
        fuel.amount -= used;
        MAX_THRUST * throttle * (used / wanted)
    }

    fn drain_charge(&mut self, dt: f64) {
        let consumers = f64::from(u8::from(self.vessel.sas).saturating_add(u8::from(self.vessel.rcs)));
        if let Some(charge) = self.vessel.resources.get_mut(ELECTRIC_CHARGE) {
            charge.amount = (CHARGE_DRAIN * consumers).mul_add(-dt, charge.amount).max(0.0);
        }
    }

    /// Recompute orbital elements from the state vector.
    fn refresh_orbit(&mut self) {
        let radius = BODY_RADIUS + self.vessel.altitude;
        let speed = self.vessel.velocity.magnitude();
        let energy = speed.mul_add(speed / 2.0, -BODY_MU / radius);
        // Horizontal velocity carries all the angular momentum.
        let momentum = radius * self.vessel.velocity.x;
        let eccentricity =
            ((2.0 * energy * momentum * momentum) / (BODY_MU * BODY_MU) + 1.0).max(0.0).sqrt();

        let orbit = &mut self.vessel.orbit;
        orbit.body = BODY.to_owned();
        orbit.inclination = 0.0;
        orbit.eccentricity = eccentricity;
        if energy < 0.0 {
            let semi_major = -BODY_MU / (2.0 * energy);
            orbit.apoapsis = semi_major.mul_add(1.0 + eccentricity, -BODY_RADIUS);
            orbit.periapsis = semi_major.mul_add(1.0 - eccentricity, -BODY_RADIUS);
            orbit.period = TAU * (semi_major.powi(3) / BODY_MU).sqrt();
        } else {
            orbit.apoapsis = f64::INFINITY;
            orbit.periapsis = self.vessel.altitude;
            orbit.period = f64::INFINITY;
        }
    }

    fn read_sensors(&mut self, rng: &mut impl Rng) {
        let altitude = self.vessel.altitude;
        let temperature = altitude.mul_add(-0.0045, 290.0).max(4.0) + rng.random_range(-0.2..=0.2);
        let pressure = 101.325 * (-altitude / 5_600.0).exp() + rng.random_range(0.0..=0.01);
        self.vessel.sensors = vec![
            SensorReading {
                name: "thermo-1".to_owned(),
                kind: "temperature".to_owned(),
                value: temperature,
                unit: "K".to_owned(),
            },
            SensorReading {
                name: "baro-1".to_owned(),
                kind: "pressure".to_owned(),
                value: pressure,
                unit: "kPa".to_owned(),
            },
        ];
    }
}

impl FlightControl for FlightSim {
    fn set_throttle(&mut self, throttle: f64) {
        debug!(throttle, "throttle set");
        self.vessel.throttle = throttle;
    }

    fn set_sas(&mut self, engaged: bool) {
        debug!(engaged, "SAS toggled");
        self.vessel.sas = engaged;
    }

    fn set_rcs(&mut self, engaged: bool) {
        debug!(engaged, "RCS toggled");
        self.vessel.rcs = engaged;
    }

    fn activate_next_stage(&mut self) {
        let Some(left) = self.stages_left.checked_sub(1) else {
            debug!("no stages left");
            return;
        };
        self.stages_left = left;
        if let Some(fuel) = self.vessel.resources.get_mut(LIQUID_FUEL) {
            fuel.amount = fuel.max;
        }
        info!(stages_left = left, "stage separated");
    }

    fn set_warp_rate(&mut self, rate: f64) {
        info!(rate, "time warp changed");
        self.universe.warp_rate = rate;
    }
}
