//! Capabilities registered by cooperating modules at runtime.
//!
//! The built-in handler chain is fixed when the registry is built. Other
//! modules can still add capabilities afterwards through the
//! [`PluginRegistry`]; the registry consults it only when no handler
//! claims a name, so a plugin can never shadow a built-in.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use datalink_types::Vessel;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::PluginError;

/// Signature of a plugin capability: active vessel and arguments in,
/// wire-ready JSON out.
pub type PluginFn = dyn Fn(Option<&Vessel>, &[String]) -> Value + Send + Sync;

/// One capability offered by a [`CapabilityProvider`].
pub struct PluginCapability {
    /// Exact API name, without arguments.
    pub name: String,
    /// The capability.
    pub invoke: Arc<PluginFn>,
}

impl PluginCapability {
    /// Wrap a closure as a named capability.
    pub fn new<F>(name: impl Into<String>, invoke: F) -> Self
    where
        F: Fn(Option<&Vessel>, &[String]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            invoke: Arc::new(invoke),
        }
    }
}

impl fmt::Debug for PluginCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCapability")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A module that contributes a batch of capabilities at startup.
pub trait CapabilityProvider {
    /// Name used in the registration report.
    fn provider_name(&self) -> &str;

    /// Every capability the module offers.
    fn capabilities(&self) -> Vec<PluginCapability>;
}

/// Name-keyed set of plugin capabilities.
///
/// Registration may happen while requests are being served; later
/// resolutions see new names.
#[derive(Default)]
pub struct PluginRegistry {
    capabilities: RwLock<BTreeMap<String, Arc<PluginFn>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under `name`.
    ///
    /// # Errors
    ///
    /// [`PluginError::InvalidName`] for an empty name or one containing
    /// bracket syntax; [`PluginError::AlreadyRegistered`] if taken.
    pub fn register<F>(&self, name: &str, invoke: F) -> Result<(), PluginError>
    where
        F: Fn(Option<&Vessel>, &[String]) -> Value + Send + Sync + 'static,
    {
        self.register_shared(name, Arc::new(invoke))
    }

    fn register_shared(&self, name: &str, invoke: Arc<PluginFn>) -> Result<(), PluginError> {
        if name.trim().is_empty() || name.contains(['[', ']']) {
            return Err(PluginError::InvalidName {
                name: name.to_owned(),
            });
        }

        let mut capabilities = self
            .capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if capabilities.contains_key(name) {
            return Err(PluginError::AlreadyRegistered {
                name: name.to_owned(),
            });
        }
        capabilities.insert(name.to_owned(), invoke);
        Ok(())
    }

    /// Register every capability of `provider`, logging each outcome.
    ///
    /// A rejected name does not stop the rest of the batch. Returns the
    /// number of capabilities registered.
    pub fn register_provider(&self, provider: &dyn CapabilityProvider) -> usize {
        let source = provider.provider_name();
        let mut registered = 0_usize;
        for capability in provider.capabilities() {
            match self.register_shared(&capability.name, capability.invoke) {
                Ok(()) => {
                    registered = registered.saturating_add(1);
                    info!(provider = source, api = %capability.name, "plugin capability registered");
                }
                Err(e) => {
                    warn!(provider = source, api = %capability.name, error = %e, "plugin capability rejected");
                }
            }
        }
        registered
    }

    /// The capability registered under exactly `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<PluginFn>> {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Invoke the capability under `name`, if any.
    ///
    /// The capability runs with the registry lock released.
    pub fn invoke(&self, name: &str, subject: Option<&Vessel>, args: &[String]) -> Option<Value> {
        self.lookup(name).map(|f| f(subject, args))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("names", &self.names())
            .finish()
    }
}
