//! The API registry: ordered handler chain plus plugin fallback.
//!
//! Resolution asks each handler in registration order and stops at the
//! first one that claims the name. Names no handler claims are looked up
//! in the [`PluginRegistry`]; a miss there is [`ApiError::UnknownApi`].
//! The chain is fixed once built, so resolution needs no locking.

use std::collections::BTreeSet;
use std::sync::Arc;

use datalink_types::Telemetry;
use serde_json::Value;
use tracing::{debug, trace};

use crate::api::{ApiEntry, DataSources, parse_call};
use crate::config::{BoundListener, ServerSettings};
use crate::error::{ApiError, RegistryError};
use crate::flight::ControlQueue;
use crate::handler::{CompoundHandler, DataLinkHandler};
use crate::handlers::{
    ApiHandler, ApiListing, ControlHandler, OrbitHandler, PausedHandler, ResourceHandler,
    SensorHandler, TimeWarpHandler, VesselHandler,
};
use crate::plugin::PluginRegistry;

/// Ordered handler chain with plugin fallback.
pub struct ApiRegistry {
    handlers: Vec<Box<dyn DataLinkHandler>>,
    plugins: Arc<PluginRegistry>,
}

impl ApiRegistry {
    /// Create a registry with no handlers.
    pub const fn new(plugins: Arc<PluginRegistry>) -> Self {
        Self {
            handlers: Vec::new(),
            plugins,
        }
    }

    /// Append a handler to the end of the chain.
    ///
    /// Names it shares with earlier handlers are shadowed.
    pub fn push(&mut self, handler: impl DataLinkHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, handler: impl DataLinkHandler + 'static) -> Self {
        self.push(handler);
        self
    }

    /// The built-in chain.
    ///
    /// Order: paused state, control, time warp, then one compound group of
    /// orbit, sensors, vessel, resources, and API information. Sensors and
    /// resources are left out when `settings.partless` is set. `api.address`
    /// and `api.port` report `listener` once it is bound.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateEntry`] if a handler table repeats a name.
    pub fn standard(
        settings: &ServerSettings,
        listener: &BoundListener,
        queue: &Arc<ControlQueue>,
        plugins: Arc<PluginRegistry>,
    ) -> Result<Self, RegistryError> {
        let listing = ApiListing::default();

        let mut group = CompoundHandler::new().with(OrbitHandler::new()?);
        if !settings.partless {
            group.push(SensorHandler::new()?);
        }
        group.push(VesselHandler::new()?);
        if !settings.partless {
            group.push(ResourceHandler::new()?);
        }
        group.push(ApiHandler::new(
            settings,
            listener,
            Arc::clone(&listing),
            Arc::clone(&plugins),
        )?);

        let registry = Self::new(plugins)
            .with(PausedHandler::new()?)
            .with(ControlHandler::new(queue)?)
            .with(TimeWarpHandler::new(queue)?)
            .with(group);

        let described = registry
            .entries()
            .iter()
            .map(|e| (e.name().to_owned(), e.description().to_owned()))
            .collect();
        // Only this function holds the listing, so the slot is still empty.
        let _ = listing.set(described);

        debug!(
            entries = registry.entries().len(),
            partless = settings.partless,
            "standard API registry built"
        );
        Ok(registry)
    }

    /// The entry the first claiming handler supplies for `name`.
    ///
    /// `name` is a bare name; arguments must already be stripped.
    pub fn resolve(&self, name: &str) -> Result<&ApiEntry, ApiError> {
        self.handlers
            .iter()
            .find_map(|h| h.entry(name))
            .ok_or_else(|| ApiError::UnknownApi {
                name: name.to_owned(),
            })
    }

    /// Evaluate one API string against a telemetry snapshot.
    ///
    /// Built-in results pass through their entry's formatter. Plugin
    /// results are returned as the plugin produced them.
    pub fn process(&self, api: &str, telemetry: &Arc<Telemetry>) -> Result<Value, ApiError> {
        let call = parse_call(api);
        match self.resolve(&call.name) {
            Ok(entry) => {
                let sources = DataSources::new(Arc::clone(telemetry), call.args);
                entry
                    .evaluate(&sources)
                    .map_err(|source| ApiError::Invocation {
                        name: call.name,
                        source,
                    })
            }
            Err(miss) => {
                trace!(api = %call.name, "no built-in entry, trying plugins");
                self.plugins
                    .invoke(&call.name, telemetry.subject(), &call.args)
                    .ok_or(miss)
            }
        }
    }

    /// Every reachable entry, in resolution order. Shadowed duplicates are
    /// omitted.
    pub fn entries(&self) -> Vec<&ApiEntry> {
        let mut all = Vec::new();
        for handler in &self.handlers {
            handler.append_entries(&mut all);
        }
        let mut seen = BTreeSet::new();
        all.retain(|&e| seen.insert(e.name()));
        all
    }

    /// The plugin fallback.
    pub const fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// Number of top-level handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRegistry")
            .field("handlers", &self.handlers.len())
            .field("plugins", &self.plugins)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::deferred::DeferredQueue;
    use crate::error::HandlerError;
    use crate::format::{Formatter, Native};
    use crate::handler::EntryTable;
    use crate::handlers::testing::{flying, grounded};

    fn table(entries: &[(&str, i64)]) -> EntryTable {
        let mut table = EntryTable::new();
        for (name, value) in entries {
            let value = *value;
            table
                .register(ApiEntry::new(*name, "", Formatter::Default, move |_| {
                    Ok(Native::Int(value))
                }))
                .unwrap();
        }
        table
    }

    fn standard(partless: bool) -> ApiRegistry {
        let settings = ServerSettings {
            partless,
            ..ServerSettings::default()
        };
        let queue: Arc<ControlQueue> = Arc::new(DeferredQueue::new());
        ApiRegistry::standard(
            &settings,
            &BoundListener::new(),
            &queue,
            Arc::new(PluginRegistry::new()),
        )
        .unwrap()
    }

    #[test]
    fn first_claimant_wins_and_shadowed_is_never_reached() {
        let registry = ApiRegistry::new(Arc::new(PluginRegistry::new()))
            .with(table(&[("x", 1)]))
            .with(table(&[("x", 2), ("y", 3)]));
        let t = grounded();

        for _ in 0..3 {
            assert_eq!(registry.process("x", &t).unwrap(), json!(1));
        }
        assert_eq!(registry.process("y", &t).unwrap(), json!(3));

        let names: Vec<&str> = registry.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn plugin_registered_later_fills_the_gap_verbatim() {
        let registry = standard(false);
        let unknown = Err(ApiError::UnknownApi {
            name: "ext.name".to_owned(),
        });
        assert_eq!(registry.process("ext.name[a,b]", &flying()), unknown);

        registry
            .plugins()
            .register("ext.name", |vessel, args| {
                json!({"vessel": vessel.map(|v| v.name.clone()), "args": args})
            })
            .unwrap();

        assert_eq!(
            registry.process("ext.name[a,b]", &flying()).unwrap(),
            json!({"vessel": "Kestrel", "args": ["a", "b"]})
        );
        assert_eq!(
            registry.process("ext.name", &grounded()).unwrap(),
            json!({"vessel": null, "args": []})
        );
        assert!(registry.process("unknown.metric", &flying()).unwrap_err().is_unknown());
    }

    #[test]
    fn plugins_cannot_shadow_builtins() {
        let registry = standard(false);
        registry
            .plugins()
            .register("game.time", |_, _| json!("plugin"))
            .unwrap();
        assert_eq!(registry.process("game.time", &flying()).unwrap(), json!(1000.0));
    }

    #[test]
    fn handler_failures_name_the_api() {
        let registry = standard(false);
        assert_eq!(
            registry.process("orbit.altitude", &grounded()),
            Err(ApiError::Invocation {
                name: "orbit.altitude".to_owned(),
                source: HandlerError::NoSubject,
            })
        );
        assert_eq!(registry.process("orbit.altitude", &flying()).unwrap(), json!(75_000.0));
    }

    #[test]
    fn partless_drops_part_capabilities() {
        let full = standard(false);
        assert!(full.resolve("sensor.list").is_ok());
        assert!(full.resolve("resource.names").is_ok());

        let partless = standard(true);
        assert!(partless.resolve("sensor.list").unwrap_err().is_unknown());
        assert!(partless.resolve("resource.amount").is_err());
        assert!(partless.resolve("vessel.name").is_ok());
    }

    #[test]
    fn api_list_covers_every_builtin() {
        let registry = standard(false);
        let listed = registry.process("api.list", &grounded()).unwrap();
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), registry.entries().len());
        assert!(listed.iter().any(|e| e["name"] == "control.throttle"));
        assert!(listed.iter().any(|e| e["name"] == "api.list"));
    }
}
