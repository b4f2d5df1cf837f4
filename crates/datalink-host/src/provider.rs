//! Extra capabilities the host contributes through the plugin registry.

use datalink_core::{CapabilityProvider, PluginCapability};
use rand::Rng;
use serde_json::{Value, json};

use crate::sim::{ELECTRIC_CHARGE, LIQUID_FUEL};

/// Host-side capabilities under the `host.` prefix.
#[derive(Debug, Default)]
pub struct HostProvider;

impl CapabilityProvider for HostProvider {
    fn provider_name(&self) -> &str {
        "host"
    }

    fn capabilities(&self) -> Vec<PluginCapability> {
        vec![
            PluginCapability::new("host.fuelFraction", |vessel, _| {
                vessel
                    .and_then(|v| v.resources.get(LIQUID_FUEL))
                    .filter(|r| r.max > 0.0)
                    .map_or(Value::Null, |r| json!(r.amount / r.max))
            }),
            PluginCapability::new("host.power", |vessel, _| {
                vessel
                    .and_then(|v| v.resources.get(ELECTRIC_CHARGE))
                    .map_or(Value::Null, |r| {
                        json!({"amount": r.amount, "max": r.max})
                    })
            }),
            PluginCapability::new("host.roll", |_, args| {
                let sides = args
                    .first()
                    .and_then(|a| a.trim().parse::<u32>().ok())
                    .filter(|&n| n > 0)
                    .unwrap_or(6);
                json!(rand::rng().random_range(1..=sides))
            }),
        ]
    }
}
