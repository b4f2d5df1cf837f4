//! Built-in capability handlers.
//!
//! Each handler owns an [`EntryTable`](crate::handler::EntryTable) filled
//! at construction. [`ApiRegistry::standard`](crate::registry::ApiRegistry::standard)
//! chains them in a fixed order.

// Declares a handler struct backed by an `EntryTable` and forwards
// `DataLinkHandler` to it. Must stay above the `mod` items below.
macro_rules! table_handler {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            table: $crate::handler::EntryTable,
        }

        impl $crate::handler::DataLinkHandler for $name {
            fn entry(&self, name: &str) -> Option<&$crate::api::ApiEntry> {
                $crate::handler::DataLinkHandler::entry(&self.table, name)
            }

            fn append_entries<'a>(&'a self, out: &mut Vec<&'a $crate::api::ApiEntry>) {
                $crate::handler::DataLinkHandler::append_entries(&self.table, out);
            }
        }
    };
}

mod api_info;
mod control;
mod orbit;
mod paused;
mod resource;
mod sensor;
mod vessel;
mod warp;

pub use api_info::{ApiHandler, ApiListing};
pub use control::ControlHandler;
pub use orbit::OrbitHandler;
pub use paused::PausedHandler;
pub use resource::ResourceHandler;
pub use sensor::SensorHandler;
pub use vessel::VesselHandler;
pub use warp::TimeWarpHandler;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use datalink_types::{
        Orbit, ResourceLevel, SensorReading, Telemetry, Universe, Vector3, Vessel, VesselId,
    };
    use serde_json::Value;

    use crate::api::{DataSources, parse_call};
    use crate::handler::DataLinkHandler;

    pub fn vessel() -> Vessel {
        let mut resources = BTreeMap::new();
        resources.insert(
            "LiquidFuel".to_owned(),
            ResourceLevel {
                amount: 360.0,
                max: 400.0,
            },
        );
        resources.insert(
            "ElectricCharge".to_owned(),
            ResourceLevel {
                amount: 50.0,
                max: 100.0,
            },
        );
        Vessel {
            id: VesselId::new(),
            name: "Kestrel".to_owned(),
            altitude: 75_000.0,
            velocity: Vector3::new(3.0, 4.0, 0.0),
            mission_time: 120.5,
            throttle: 0.25,
            sas: true,
            rcs: false,
            orbit: Orbit {
                body: "Kerbin".to_owned(),
                apoapsis: 80_000.0,
                periapsis: 70_000.0,
                inclination: -5.0,
                eccentricity: 0.001,
                period: 1_900.0,
            },
            resources,
            sensors: vec![SensorReading {
                name: "thermo-1".to_owned(),
                kind: "temperature".to_owned(),
                value: 291.5,
                unit: "K".to_owned(),
            }],
        }
    }

    pub fn flying() -> Arc<Telemetry> {
        Arc::new(Telemetry {
            universe: Universe {
                universal_time: 1_000.0,
                paused: false,
                warp_rate: 1.0,
            },
            vessel: Some(vessel()),
        })
    }

    pub fn grounded() -> Arc<Telemetry> {
        Arc::new(Telemetry::default())
    }

    /// Resolve and evaluate `api` against one handler.
    pub fn eval(
        handler: &dyn DataLinkHandler,
        telemetry: &Arc<Telemetry>,
        api: &str,
    ) -> Result<Value, crate::error::HandlerError> {
        let call = parse_call(api);
        let entry = handler
            .entry(&call.name)
            .ok_or_else(|| crate::error::HandlerError::NotFound(call.name.clone()))?;
        entry.evaluate(&DataSources::new(Arc::clone(telemetry), call.args))
    }
}
