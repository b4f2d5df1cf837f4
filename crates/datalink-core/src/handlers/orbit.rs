use datalink_types::Orbit;

use crate::api::ApiEntry;
use crate::error::RegistryError;
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;

table_handler! {
    /// Orbital parameters of the active vessel.
    OrbitHandler
}

impl OrbitHandler {
    /// Build the handler.
    pub fn new() -> Result<Self, RegistryError> {
        let mut table = EntryTable::new();
        table.register_all([
            ApiEntry::new(
                "orbit.altitude",
                "Altitude above sea level (m)",
                Formatter::Default,
                |ds| Ok(Native::Float(ds.subject()?.altitude)),
            ),
            orbital("orbit.apoapsis", "Apoapsis altitude (m)", Formatter::Default, |o| {
                o.apoapsis.into()
            }),
            orbital("orbit.periapsis", "Periapsis altitude (m)", Formatter::Default, |o| {
                o.periapsis.into()
            }),
            orbital("orbit.inclination", "Inclination (deg)", Formatter::Angle, |o| {
                o.inclination.into()
            }),
            orbital("orbit.eccentricity", "Eccentricity", Formatter::Rounded(6), |o| {
                o.eccentricity.into()
            }),
            orbital("orbit.period", "Orbital period (s)", Formatter::Default, |o| {
                o.period.into()
            }),
            orbital("orbit.body", "Name of the orbited body", Formatter::Default, |o| {
                o.body.as_str().into()
            }),
        ])?;
        Ok(Self { table })
    }
}

fn orbital(
    name: &str,
    description: &str,
    formatter: Formatter,
    read: fn(&Orbit) -> Native,
) -> ApiEntry {
    ApiEntry::new(name, description, formatter, move |ds| Ok(read(&ds.subject()?.orbit)))
}
