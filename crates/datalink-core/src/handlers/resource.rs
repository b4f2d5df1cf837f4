use datalink_types::ResourceLevel;

use crate::api::ApiEntry;
use crate::error::{HandlerError, RegistryError};
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;

table_handler! {
    /// Resource levels aboard the active vessel. Left out of partless setups.
    ResourceHandler
}

impl ResourceHandler {
    /// Build the handler.
    pub fn new() -> Result<Self, RegistryError> {
        let mut table = EntryTable::new();
        table.register_all([
            ApiEntry::new(
                "resource.names",
                "Names of every resource aboard",
                Formatter::Default,
                |ds| {
                    let names: Vec<Native> = ds
                        .subject()?
                        .resources
                        .keys()
                        .map(|k| k.as_str().into())
                        .collect();
                    Ok(Native::List(names))
                },
            ),
            level("resource.amount", "Amount of the named resource", |r| r.amount),
            level("resource.max", "Capacity for the named resource", |r| r.max),
        ])?;
        Ok(Self { table })
    }
}

fn level(name: &str, description: &str, read: fn(&ResourceLevel) -> f64) -> ApiEntry {
    ApiEntry::new(name, description, Formatter::Rounded(3), move |ds| {
        let resource = ds.arg(0)?;
        ds.subject()?
            .resources
            .get(resource)
            .map(|r| Native::Float(read(r)))
            .ok_or_else(|| HandlerError::NotFound(resource.to_owned()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::handlers::testing::{eval, flying};

    #[test]
    fn names_are_sorted() {
        let handler = ResourceHandler::new().unwrap();
        assert_eq!(
            eval(&handler, &flying(), "resource.names").unwrap(),
            json!(["ElectricCharge", "LiquidFuel"])
        );
    }

    #[test]
    fn amount_and_max_by_name() {
        let handler = ResourceHandler::new().unwrap();
        let t = flying();
        assert_eq!(eval(&handler, &t, "resource.amount[LiquidFuel]").unwrap(), json!(360.0));
        assert_eq!(eval(&handler, &t, "resource.max[LiquidFuel]").unwrap(), json!(400.0));
        assert_eq!(
            eval(&handler, &t, "resource.max[Ore]"),
            Err(HandlerError::NotFound("Ore".to_owned()))
        );
        assert_eq!(
            eval(&handler, &t, "resource.amount"),
            Err(HandlerError::MissingArgument { index: 0 })
        );
    }
}
