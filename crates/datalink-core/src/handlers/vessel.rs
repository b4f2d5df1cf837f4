use datalink_types::Vessel;

use crate::api::ApiEntry;
use crate::error::RegistryError;
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;

table_handler! {
    /// Flight state of the active vessel.
    VesselHandler
}

impl VesselHandler {
    /// Build the handler.
    pub fn new() -> Result<Self, RegistryError> {
        let mut table = EntryTable::new();
        table.register_all([
            field("vessel.name", "Vessel name", Formatter::Default, |v| {
                v.name.as_str().into()
            }),
            field("vessel.altitude", "Altitude above sea level (m)", Formatter::Rounded(2), |v| {
                v.altitude.into()
            }),
            field("vessel.velocity", "Orbital velocity vector (m/s)", Formatter::Components, |v| {
                v.velocity.into()
            }),
            field("vessel.speed", "Orbital speed (m/s)", Formatter::Rounded(2), |v| {
                v.velocity.magnitude().into()
            }),
            field("vessel.missionTime", "Seconds since launch", Formatter::Default, |v| {
                v.mission_time.into()
            }),
            field("vessel.throttle", "Main throttle in [0, 1]", Formatter::Default, |v| {
                v.throttle.into()
            }),
            field("vessel.sas", "Whether SAS is engaged", Formatter::Default, |v| v.sas.into()),
            field("vessel.rcs", "Whether RCS is engaged", Formatter::Default, |v| v.rcs.into()),
        ])?;
        Ok(Self { table })
    }
}

fn field(name: &str, description: &str, formatter: Formatter, read: fn(&Vessel) -> Native) -> ApiEntry {
    ApiEntry::new(name, description, formatter, move |ds| Ok(read(ds.subject()?)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::HandlerError;
    use crate::handlers::testing::{eval, flying, grounded};

    #[test]
    fn reads_vessel_fields() {
        let handler = VesselHandler::new().unwrap();
        let t = flying();
        assert_eq!(eval(&handler, &t, "vessel.name").unwrap(), json!("Kestrel"));
        assert_eq!(eval(&handler, &t, "vessel.speed").unwrap(), json!(5.0));
        assert_eq!(
            eval(&handler, &t, "vessel.velocity").unwrap(),
            json!({"x": 3.0, "y": 4.0, "z": 0.0})
        );
        assert_eq!(eval(&handler, &t, "vessel.sas").unwrap(), json!(true));
    }

    #[test]
    fn empty_brackets_are_ignored() {
        let handler = VesselHandler::new().unwrap();
        assert_eq!(eval(&handler, &flying(), "vessel.name[]").unwrap(), json!("Kestrel"));
    }

    #[test]
    fn fields_need_a_vessel() {
        let handler = VesselHandler::new().unwrap();
        assert_eq!(
            eval(&handler, &grounded(), "vessel.missionTime"),
            Err(HandlerError::NoSubject)
        );
    }
}
