//! Shared state for the data-link server.
//!
//! [`ServerContext`] lives as long as the [`DataLink`](crate::link::DataLink)
//! and is shared by every listener and connection task. The simulation
//! publishes telemetry into it through a [`watch`] channel and announces
//! ticks through a [`broadcast`] channel; network tasks only read.
//!
//! [`AppState`] is the per-run Axum state: the context plus the
//! responsibility chain and the shutdown signal of the current run.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use datalink_core::config::StreamConfig;
use datalink_core::{ApiRegistry, ChangeDetector, RateTracker, ServerSettings};
use datalink_types::{ConnectionId, Telemetry};
use tokio::sync::{broadcast, watch};

use crate::responsibility::ResponsibilityChain;

/// Capacity of the tick broadcast channel.
///
/// A connection that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest tick.
const TICK_CAPACITY: usize = 64;

/// Announced to streaming connections after each simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// Tick counter, starting at 0.
    pub tick: u64,
    /// [`ChangeDetector`] generation after this tick.
    pub generation: u64,
}

/// State shared by every task of the server.
pub struct ServerContext {
    settings: ServerSettings,
    stream: StreamConfig,
    registry: ApiRegistry,
    telemetry: watch::Sender<Arc<Telemetry>>,
    ticks: broadcast::Sender<TickEvent>,
    changes: ChangeDetector,
    http_rates: RateTracker,
    stream_rates: RateTracker,
    active_streams: Mutex<BTreeSet<ConnectionId>>,
}

impl ServerContext {
    /// Create a context with an empty telemetry snapshot.
    pub fn new(settings: ServerSettings, stream: StreamConfig, registry: ApiRegistry) -> Self {
        let (ticks, _) = broadcast::channel(TICK_CAPACITY);
        Self {
            settings,
            stream,
            registry,
            telemetry: watch::Sender::new(Arc::new(Telemetry::default())),
            ticks,
            changes: ChangeDetector::new(),
            http_rates: RateTracker::new(),
            stream_rates: RateTracker::new(),
            active_streams: Mutex::new(BTreeSet::new()),
        }
    }

    /// Resolved listener settings.
    pub const fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Streaming push cadence.
    pub const fn stream_config(&self) -> &StreamConfig {
        &self.stream
    }

    /// The capability registry.
    pub const fn registry(&self) -> &ApiRegistry {
        &self.registry
    }

    /// The vessel change detector.
    pub const fn changes(&self) -> &ChangeDetector {
        &self.changes
    }

    /// Byte rates of plain HTTP traffic.
    pub const fn http_rates(&self) -> &RateTracker {
        &self.http_rates
    }

    /// Byte rates of streaming traffic.
    pub const fn stream_rates(&self) -> &RateTracker {
        &self.stream_rates
    }

    /// The most recently published telemetry.
    pub fn snapshot(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry.borrow())
    }

    /// Replace the published telemetry. Works with no readers attached.
    pub fn publish(&self, telemetry: Telemetry) {
        self.telemetry.send_replace(Arc::new(telemetry));
    }

    /// Announce a completed tick. Returns the number of listening connections.
    pub fn announce(&self, event: TickEvent) -> usize {
        // Err only means no connection is listening.
        self.ticks.send(event).unwrap_or(0)
    }

    /// Receive tick announcements.
    pub fn subscribe_ticks(&self) -> broadcast::Receiver<TickEvent> {
        self.ticks.subscribe()
    }

    /// Mark a streaming connection active until the guard is dropped.
    pub fn track_stream(self: &Arc<Self>, id: ConnectionId) -> StreamGuard {
        self.streams().insert(id);
        StreamGuard {
            context: Arc::clone(self),
            id,
        }
    }

    /// Number of open streaming connections.
    pub fn active_streams(&self) -> usize {
        self.streams().len()
    }

    fn streams(&self) -> MutexGuard<'_, BTreeSet<ConnectionId>> {
        self.active_streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("settings", &self.settings)
            .field("active_streams", &self.active_streams())
            .finish_non_exhaustive()
    }
}

/// Removes a streaming connection from the active set when dropped.
#[derive(Debug)]
pub struct StreamGuard {
    context: Arc<ServerContext>,
    id: ConnectionId,
}

impl StreamGuard {
    /// The tracked connection.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.context.streams().remove(&self.id);
    }
}

/// Axum state for one run of the server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Long-lived shared context.
    pub context: Arc<ServerContext>,
    /// Handlers for plain (non-upgrade) requests.
    pub chain: Arc<ResponsibilityChain>,
    /// Flips to `true` when the run is stopping.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Assemble the state for one run.
    pub const fn new(
        context: Arc<ServerContext>,
        chain: Arc<ResponsibilityChain>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            context,
            chain,
            shutdown,
        }
    }
}
