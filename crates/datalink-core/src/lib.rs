//! API resolution, handler chain, and cross-thread plumbing for the
//! simulation data link.
//!
//! This crate has no network code. It answers one question, "what is the
//! value of this API string right now?", and provides the pieces the
//! server needs around that: a deferred queue to reach the simulation
//! thread, byte-rate accounting, and vessel change detection.
//!
//! # Modules
//!
//! - [`api`] -- API string parsing, invocation context, entries.
//! - [`change`] -- Active-vessel change detection.
//! - [`config`] -- Configuration loading from `datalink-config.yaml` and
//!   resolved [`ServerSettings`].
//! - [`deferred`] -- [`DeferredQueue`] for work bound to the simulation thread.
//! - [`error`] -- Error types.
//! - [`flight`] -- [`FlightControl`], the host's control surface.
//! - [`format`] -- Wire formatting of native results.
//! - [`handler`] -- The [`DataLinkHandler`] trait and its building blocks.
//! - [`handlers`] -- Built-in capabilities.
//! - [`plugin`] -- Runtime-registered capabilities.
//! - [`rates`] -- Down-link and up-link byte rates.
//! - [`registry`] -- [`ApiRegistry`], the ordered chain with plugin fallback.
//!
//! [`ServerSettings`]: config::ServerSettings
//! [`DeferredQueue`]: deferred::DeferredQueue
//! [`FlightControl`]: flight::FlightControl
//! [`DataLinkHandler`]: handler::DataLinkHandler
//! [`ApiRegistry`]: registry::ApiRegistry

pub mod api;
pub mod change;
pub mod config;
pub mod deferred;
pub mod error;
pub mod flight;
pub mod format;
pub mod handler;
pub mod handlers;
pub mod plugin;
pub mod rates;
pub mod registry;

pub use api::{ApiCall, ApiEntry, DataSources, parse_call};
pub use change::ChangeDetector;
pub use config::{BoundListener, DataLinkConfig, ServerSettings};
pub use deferred::DeferredQueue;
pub use error::{ApiError, HandlerError, PluginError, RegistryError};
pub use flight::{ControlQueue, FlightControl};
pub use format::{Formatter, Native};
pub use handler::{CompoundHandler, DataLinkHandler, EntryTable};
pub use plugin::{CapabilityProvider, PluginCapability, PluginRegistry};
pub use rates::RateTracker;
pub use registry::ApiRegistry;
