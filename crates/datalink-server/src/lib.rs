//! HTTP and `WebSocket` server for the simulation data link.
//!
//! This crate puts the capability registry of `datalink-core` on the
//! network:
//!
//! - **Plain HTTP** on `/datalink`: a query string of `key=api` pairs is
//!   evaluated against one telemetry snapshot and answered as a JSON
//!   object, keys in request order.
//! - **Streaming** on the same path: `WebSocket` upgrades are stolen before
//!   the responsibility chain and served subscription frames every push
//!   interval, or immediately when the active vessel changes.
//! - **Everything else** falls through to a terminal `404` carrying the
//!   server banner.
//!
//! # Architecture
//!
//! The host owns a [`DataLink`] and calls [`DataLink::update`] once per
//! simulation tick. Network tasks never touch simulation state: reads go
//! through a published [`Telemetry`](datalink_types::Telemetry) snapshot,
//! and writes go through the deferred control queue drained by `update`.

pub mod datalink;
pub mod error;
pub mod layers;
pub mod link;
pub mod responsibility;
pub mod router;
pub mod server;
pub mod state;
pub mod stream;

pub use datalink::{DATALINK_PATH, DataLinkResponsibility};
pub use error::{DataLinkError, ServerError};
pub use link::DataLink;
pub use responsibility::{ElseResponsibility, Responsibility, ResponsibilityChain};
pub use router::build_router;
pub use state::{AppState, ServerContext, TickEvent};
pub use stream::ConnectionState;
