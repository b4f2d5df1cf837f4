//! Shared type definitions for the simulation data link.
//!
//! This crate holds the values that cross crate and process boundaries:
//! the per-tick telemetry snapshot the simulation publishes, and the
//! messages streaming clients send. Types are exported to `TypeScript`
//! via `ts-rs` for dashboard authors.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for vessels and connections
//! - [`telemetry`] -- Vessel, orbit, resource, and universe snapshots
//! - [`stream`] -- Streaming protocol client messages

pub mod ids;
pub mod stream;
pub mod telemetry;

// Re-export all public types at crate root for convenience.
pub use ids::{ConnectionId, VesselId};
pub use stream::StreamRequest;
pub use telemetry::{Orbit, ResourceLevel, SensorReading, Telemetry, Universe, Vector3, Vessel};
