//! Error types for API resolution and handler invocation.
//!
//! Failures are layered: a [`HandlerError`] describes why one capability
//! could not produce a value, an [`ApiError`] is what callers of
//! [`ApiRegistry::process`](crate::registry::ApiRegistry::process) see,
//! and [`RegistryError`] / [`PluginError`] are startup configuration
//! mistakes.

/// Failure raised by a capability while computing its value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// The capability reads the active vessel but none is present.
    #[error("no active vessel")]
    NoSubject,

    /// A required positional argument was not supplied.
    #[error("missing argument {index}")]
    MissingArgument {
        /// Zero-based position of the missing argument.
        index: usize,
    },

    /// An argument could not be interpreted.
    #[error("invalid argument {value:?}: expected {expected}")]
    InvalidArgument {
        /// The raw argument text.
        value: String,
        /// What the capability expected.
        expected: &'static str,
    },

    /// An argument named something that does not exist on the vessel.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Failure surfaced by the registry when processing an API string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Neither the handler chain nor the plugin source knows the name.
    #[error("unknown API: {name}")]
    UnknownApi {
        /// The bare API name (arguments stripped).
        name: String,
    },

    /// The resolved capability failed while running.
    #[error("API {name} failed: {source}")]
    Invocation {
        /// The bare API name.
        name: String,
        /// The handler's failure.
        source: HandlerError,
    },
}

impl ApiError {
    /// The API name this error refers to.
    pub fn name(&self) -> &str {
        match self {
            Self::UnknownApi { name } | Self::Invocation { name, .. } => name,
        }
    }

    /// Whether the error is a resolution miss rather than a runtime failure.
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::UnknownApi { .. })
    }
}

/// Misconfiguration detected while building a handler table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The same name was registered twice in one handler.
    #[error("duplicate API entry: {name}")]
    DuplicateEntry {
        /// The offending name.
        name: String,
    },
}

/// Misconfiguration detected while registering plugin capabilities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// A plugin capability with this name already exists.
    #[error("plugin capability already registered: {name}")]
    AlreadyRegistered {
        /// The offending name.
        name: String,
    },

    /// The name is empty or contains bracket syntax.
    #[error("invalid plugin capability name: {name:?}")]
    InvalidName {
        /// The offending name.
        name: String,
    },
}
