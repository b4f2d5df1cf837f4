//! API strings, invocation context, and registered entries.
//!
//! An API string names one capability and optionally carries bracketed
//! arguments, e.g. `resource.amount[LiquidFuel]` or
//! `control.throttle[0.5]`. [`parse_call`] splits it into an [`ApiCall`];
//! the registry then builds a fresh [`DataSources`] for the invocation
//! and runs the matching [`ApiEntry`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use datalink_types::{Telemetry, Universe, Vessel};
use serde_json::Value;

use crate::error::HandlerError;
use crate::format::{Formatter, Native};

/// A parsed API string: bare dotted name plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    /// The dotted name, e.g. `orbit.altitude`.
    pub name: String,
    /// Arguments in the order they appeared. Opaque to the parser.
    pub args: Vec<String>,
}

/// Split an API string into its name and arguments.
///
/// The name is everything before the first `[`. The argument list runs
/// from there to the first `]` (or a nested `[`, or the end of the
/// string) and is split on `,`.
///
/// Parsing never fails. A missing `]` is tolerated and anything after a
/// nested `[` is dropped, so a client typo degrades one argument list
/// instead of failing the request. `f[]` has no arguments.
pub fn parse_call(api: &str) -> ApiCall {
    let Some((name, rest)) = api.split_once('[') else {
        return ApiCall {
            name: api.to_owned(),
            args: Vec::new(),
        };
    };

    let interior = rest.split(['[', ']']).next().unwrap_or_default();
    let args = if interior.is_empty() {
        Vec::new()
    } else {
        interior.split(',').map(str::to_owned).collect()
    };

    ApiCall {
        name: name.to_owned(),
        args,
    }
}

/// Per-invocation context handed to a capability.
///
/// Holds the telemetry snapshot current when the request was evaluated
/// and the arguments parsed from the API string. Built fresh for every
/// call and dropped when the call returns.
#[derive(Debug, Clone)]
pub struct DataSources {
    telemetry: Arc<Telemetry>,
    args: Vec<String>,
}

impl DataSources {
    /// Build an invocation context.
    pub const fn new(telemetry: Arc<Telemetry>, args: Vec<String>) -> Self {
        Self { telemetry, args }
    }

    /// The active vessel, or [`HandlerError::NoSubject`].
    pub fn subject(&self) -> Result<&Vessel, HandlerError> {
        self.telemetry.subject().ok_or(HandlerError::NoSubject)
    }

    /// The active vessel, if any.
    pub fn try_subject(&self) -> Option<&Vessel> {
        self.telemetry.subject()
    }

    /// Global simulation state.
    pub fn universe(&self) -> &Universe {
        &self.telemetry.universe
    }

    /// All arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The argument at `index`, or [`HandlerError::MissingArgument`].
    pub fn arg(&self, index: usize) -> Result<&str, HandlerError> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or(HandlerError::MissingArgument { index })
    }

    /// Parse the argument at `index` with [`FromStr`].
    pub fn parse_arg<T: FromStr>(
        &self,
        index: usize,
        expected: &'static str,
    ) -> Result<T, HandlerError> {
        let raw = self.arg(index)?;
        raw.trim().parse().map_err(|_unparsable| HandlerError::InvalidArgument {
            value: raw.to_owned(),
            expected,
        })
    }

    /// Parse the argument at `index` as a boolean switch.
    ///
    /// Accepts `true`/`false`, `on`/`off`, and `1`/`0`, case-insensitively.
    pub fn bool_arg(&self, index: usize) -> Result<bool, HandlerError> {
        let raw = self.arg(index)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => Ok(true),
            "false" | "off" | "0" => Ok(false),
            _ => Err(HandlerError::InvalidArgument {
                value: raw.to_owned(),
                expected: "boolean",
            }),
        }
    }
}

/// Signature of a capability function.
pub type InvokeFn = dyn Fn(&DataSources) -> Result<Native, HandlerError> + Send + Sync;

/// A named capability with the formatter applied to its results.
///
/// Immutable once built. Identity is the name.
pub struct ApiEntry {
    name: String,
    description: String,
    formatter: Formatter,
    invoke: Box<InvokeFn>,
}

impl ApiEntry {
    /// Build an entry.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        formatter: Formatter,
        invoke: F,
    ) -> Self
    where
        F: Fn(&DataSources) -> Result<Native, HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            formatter,
            invoke: Box::new(invoke),
        }
    }

    /// The entry's dotted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description, listed by `api.list`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The formatter applied to results.
    pub const fn formatter(&self) -> Formatter {
        self.formatter
    }

    /// Run the capability and return its native result.
    pub fn invoke(&self, sources: &DataSources) -> Result<Native, HandlerError> {
        (self.invoke)(sources)
    }

    /// Run the capability and format the result for the wire.
    pub fn evaluate(&self, sources: &DataSources) -> Result<Value, HandlerError> {
        self.invoke(sources).map(|native| self.formatter.format(native))
    }
}

impl fmt::Debug for ApiEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiEntry")
            .field("name", &self.name)
            .field("formatter", &self.formatter)
            .finish_non_exhaustive()
    }
}
