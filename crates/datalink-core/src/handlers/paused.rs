use crate::api::ApiEntry;
use crate::error::RegistryError;
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;

/// `game.paused` value while the simulation runs.
pub const RUNNING: i64 = 0;
/// `game.paused` value while the simulation is paused.
pub const PAUSED: i64 = 1;
/// `game.paused` value outside of flight.
pub const NO_VESSEL: i64 = 2;

table_handler! {
    /// Reports whether telemetry is live. First in the chain so dashboards
    /// can always tell stale values from a paused game.
    PausedHandler
}

impl PausedHandler {
    /// Build the handler.
    pub fn new() -> Result<Self, RegistryError> {
        let mut table = EntryTable::new();
        table.register(ApiEntry::new(
            "game.paused",
            "Simulation state: 0 running, 1 paused, 2 no active vessel",
            Formatter::Default,
            |ds| {
                let state = if ds.try_subject().is_none() {
                    NO_VESSEL
                } else if ds.universe().paused {
                    PAUSED
                } else {
                    RUNNING
                };
                Ok(Native::Int(state))
            },
        ))?;
        Ok(Self { table })
    }
}
