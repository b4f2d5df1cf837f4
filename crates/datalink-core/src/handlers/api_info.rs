use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use crate::api::ApiEntry;
use crate::config::{BoundListener, ServerSettings};
use crate::error::RegistryError;
use crate::format::{Formatter, Native};
use crate::handler::EntryTable;
use crate::plugin::PluginRegistry;

/// `(name, description)` of every built-in entry, filled once the chain
/// that contains the [`ApiHandler`] has been assembled.
pub type ApiListing = Arc<OnceLock<Vec<(String, String)>>>;

table_handler! {
    /// Describes the data link itself: its capabilities and where it listens.
    ApiHandler
}

impl ApiHandler {
    /// Build the handler.
    ///
    /// `listing` may be filled after construction; until then `api.list`
    /// only reports plugin capabilities. `api.address` and `api.port` read
    /// `listener` on every call, so they follow restarts.
    pub fn new(
        settings: &ServerSettings,
        listener: &BoundListener,
        listing: ApiListing,
        plugins: Arc<PluginRegistry>,
    ) -> Result<Self, RegistryError> {
        let version = settings.version.clone();
        let configured = SocketAddr::new(settings.primary_address(), settings.port);
        let address = listener.clone();
        let port = listener.clone();

        let mut table = EntryTable::new();
        table.register_all([
            ApiEntry::new(
                "api.list",
                "Every capability as {name, description}",
                Formatter::Default,
                move |_| {
                    let builtin = listing.get().map(Vec::as_slice).unwrap_or_default();
                    let mut out: Vec<Native> = builtin
                        .iter()
                        .map(|(name, description)| describe(name, description))
                        .collect();
                    out.extend(plugins.names().iter().map(|name| describe(name, "plugin")));
                    Ok(Native::List(out))
                },
            ),
            ApiEntry::new(
                "api.version",
                "Data link version",
                Formatter::Default,
                move |_| Ok(Native::Text(version.clone())),
            ),
            ApiEntry::new(
                "api.address",
                "Primary listening address",
                Formatter::Default,
                move |_| {
                    let bound = address.get().unwrap_or(configured);
                    Ok(Native::Text(bound.ip().to_string()))
                },
            ),
            ApiEntry::new("api.port", "Listening port", Formatter::Default, move |_| {
                let bound = port.get().unwrap_or(configured);
                Ok(Native::from(u32::from(bound.port())))
            }),
        ])?;
        Ok(Self { table })
    }
}

fn describe(name: &str, description: &str) -> Native {
    Native::Record(vec![
        ("name".to_owned(), name.into()),
        ("description".to_owned(), description.into()),
    ])
}
