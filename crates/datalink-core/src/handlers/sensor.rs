use crate::api::ApiEntry;
use crate::error::{HandlerError, RegistryError};
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;

table_handler! {
    /// Readings from onboard sensor parts. Left out of partless setups.
    SensorHandler
}

impl SensorHandler {
    /// Build the handler.
    pub fn new() -> Result<Self, RegistryError> {
        let mut table = EntryTable::new();
        table.register_all([
            ApiEntry::new(
                "sensor.list",
                "Every sensor as {name, kind, value, unit}",
                Formatter::Default,
                |ds| {
                    let sensors = ds
                        .subject()?
                        .sensors
                        .iter()
                        .map(|s| {
                            Native::Record(vec![
                                ("name".to_owned(), s.name.as_str().into()),
                                ("kind".to_owned(), s.kind.as_str().into()),
                                ("value".to_owned(), s.value.into()),
                                ("unit".to_owned(), s.unit.as_str().into()),
                            ])
                        })
                        .collect();
                    Ok(Native::List(sensors))
                },
            ),
            ApiEntry::new(
                "sensor.value",
                "Reading of the named sensor",
                Formatter::Default,
                |ds| {
                    let name = ds.arg(0)?;
                    ds.subject()?
                        .sensors
                        .iter()
                        .find(|s| s.name == name)
                        .map(|s| Native::Float(s.value))
                        .ok_or_else(|| HandlerError::NotFound(name.to_owned()))
                },
            ),
        ])?;
        Ok(Self { table })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handlers::testing::{eval, flying};

    #[test]
    fn lists_and_reads_sensors() {
        let handler = SensorHandler::new().unwrap();
        let t = flying();
        assert_eq!(
            eval(&handler, &t, "sensor.list").unwrap(),
            json!([{"name": "thermo-1", "kind": "temperature", "value": 291.5, "unit": "K"}])
        );
        assert_eq!(eval(&handler, &t, "sensor.value[thermo-1]").unwrap(), json!(291.5));
        assert_eq!(
            eval(&handler, &t, "sensor.value[baro-9]"),
            Err(HandlerError::NotFound("baro-9".to_owned()))
        );
    }
}
