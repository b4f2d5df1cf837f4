//! The data link: one object the host owns for the whole session.
//!
//! [`DataLink`] owns the capability registry, the control queue, and the
//! shared [`ServerContext`]. The host drives it from two places:
//!
//! - its lifecycle, with [`start`](DataLink::start) and
//!   [`stop`](DataLink::stop), which may be repeated;
//! - its simulation loop, calling [`update`](DataLink::update) once per tick.
//!
//! ```text
//! host tick -> update() -> drain control queue -> detect vessel change
//!                       -> publish telemetry   -> announce tick
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Router;
use datalink_core::config::StreamConfig;
use datalink_core::{
    ApiRegistry, BoundListener, ControlQueue, DeferredQueue, FlightControl, PluginRegistry,
    ServerSettings,
};
use datalink_types::Telemetry;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

use crate::datalink::DataLinkResponsibility;
use crate::error::ServerError;
use crate::responsibility::{ElseResponsibility, ResponsibilityChain};
use crate::router::build_router;
use crate::server::{bind_all, serve};
use crate::state::{AppState, ServerContext, TickEvent};

/// Listener tasks of the current run.
#[derive(Debug)]
struct Running {
    tasks: Vec<JoinHandle<()>>,
    addresses: Vec<SocketAddr>,
}

impl Running {
    /// A listener that failed ends its task early; the run is dead once
    /// every task has ended.
    fn is_alive(&self) -> bool {
        self.tasks.iter().any(|task| !task.is_finished())
    }
}

/// The simulation data link.
#[derive(Debug)]
pub struct DataLink {
    context: Arc<ServerContext>,
    queue: Arc<ControlQueue>,
    plugins: Arc<PluginRegistry>,
    listener: BoundListener,
    shutdown: watch::Sender<bool>,
    tick: AtomicU64,
    running: Mutex<Option<Running>>,
}

impl DataLink {
    /// Assemble the data link without binding anything.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Registry`] if the built-in capabilities
    /// cannot be assembled.
    pub fn new(settings: ServerSettings, stream: StreamConfig) -> Result<Self, ServerError> {
        let plugins = Arc::new(PluginRegistry::new());
        let queue: Arc<ControlQueue> = Arc::new(DeferredQueue::new());
        let listener = BoundListener::new();
        let registry = ApiRegistry::standard(&settings, &listener, &queue, Arc::clone(&plugins))?;
        info!(
            apis = registry.entries().len(),
            partless = settings.partless,
            "data link assembled"
        );

        Ok(Self {
            context: Arc::new(ServerContext::new(settings, stream, registry)),
            queue,
            plugins,
            listener,
            shutdown: watch::Sender::new(false),
            tick: AtomicU64::new(0),
            running: Mutex::new(None),
        })
    }

    /// Bind every configured address and start serving.
    ///
    /// All listeners are bound before any is served, so a bind failure
    /// leaves nothing running. Returns the bound addresses. Must be called
    /// from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyRunning`] if already started, or
    /// [`ServerError::Bind`] if an address cannot be bound. A run whose
    /// listeners have all exited does not count as started.
    pub fn start(&self) -> Result<Vec<SocketAddr>, ServerError> {
        let mut running = self.lock_running();
        match running.as_ref() {
            Some(run) if run.is_alive() => return Err(ServerError::AlreadyRunning),
            Some(run) => {
                warn!(addresses = ?run.addresses, "previous listeners exited, starting over");
                *running = None;
                self.listener.set(None);
            }
            None => {}
        }

        let listeners = bind_all(self.context.settings())?;
        self.shutdown.send_replace(false);
        let router = self.router();

        let mut addresses = Vec::with_capacity(listeners.len());
        let mut tasks = Vec::with_capacity(listeners.len());
        for (address, listener) in listeners {
            let router = router.clone();
            let shutdown = self.shutdown.subscribe();
            addresses.push(address);
            tasks.push(tokio::spawn(async move {
                info!(%address, "data link listening");
                if let Err(e) = serve(listener, router, shutdown).await {
                    error!(%address, error = %e, "data link listener failed");
                }
                info!(%address, "data link listener stopped");
            }));
        }

        self.listener.set(addresses.first().copied());
        *running = Some(Running {
            tasks,
            addresses: addresses.clone(),
        });
        Ok(addresses)
    }

    /// Stop serving and wait for every listener to wind down. Open streams
    /// are closed. Does nothing if not running.
    pub async fn stop(&self) {
        let running = self.lock_running().take();
        let Some(running) = running else {
            return;
        };

        self.listener.set(None);
        self.shutdown.send_replace(true);
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "listener task did not finish cleanly");
            }
        }
        info!(addresses = ?running.addresses, "data link stopped");
    }

    /// Advance one simulation tick.
    ///
    /// Runs queued control actions against `control`, then publishes
    /// `telemetry` and wakes streaming connections. Call only from the
    /// thread that owns `control`.
    pub fn update<C: FlightControl + 'static>(&self, control: &mut C, telemetry: Telemetry) -> TickEvent {
        let applied = self.queue.drain(control);
        let changed = self.context.changes().update(telemetry.vessel.as_ref());
        self.context.publish(telemetry);

        let event = TickEvent {
            tick: self.tick.fetch_add(1, Ordering::Relaxed),
            generation: self.context.changes().generation(),
        };
        let listeners = self.context.announce(event);
        trace!(tick = event.tick, applied, changed, listeners, "data link tick");
        event
    }

    /// Queue an action for the next [`update`](Self::update).
    pub fn queue_deferred(
        &self,
        action: impl FnOnce(&mut (dyn FlightControl + 'static)) + Send + 'static,
    ) {
        self.queue.enqueue(action);
    }

    /// Runtime plugin registry. Plugins registered at any time are served
    /// from the next request on.
    pub const fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// The shared server context.
    pub const fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Whether at least one listener of the current run is still serving.
    pub fn is_running(&self) -> bool {
        self.lock_running().as_ref().is_some_and(Running::is_alive)
    }

    /// Addresses bound by the current run. Empty when stopped.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.lock_running()
            .as_ref()
            .map(|r| r.addresses.clone())
            .unwrap_or_default()
    }

    /// The primary listener's bound address while running, else the
    /// configured primary address and port.
    pub fn primary_address(&self) -> SocketAddr {
        self.listener.resolve(self.context.settings())
    }

    /// Port of the primary listener while running, else the configured port.
    pub fn port(&self) -> u16 {
        self.primary_address().port()
    }

    /// Server-to-client bytes per second over the sampling window.
    pub fn down_link_rate(&self) -> f64 {
        self.context.http_rates().down_rate() + self.context.stream_rates().down_rate()
    }

    /// Client-to-server bytes per second over the sampling window.
    pub fn up_link_rate(&self) -> f64 {
        self.context.http_rates().up_rate() + self.context.stream_rates().up_rate()
    }

    /// Number of open streaming connections.
    pub fn active_streams(&self) -> usize {
        self.context.active_streams()
    }

    /// A router over this data link, detached from any listener.
    pub fn router(&self) -> Router {
        let chain = ResponsibilityChain::new(ElseResponsibility::new(self.context.settings().banner()))
            .with(DataLinkResponsibility::new(Arc::clone(&self.context)));
        build_router(AppState::new(
            Arc::clone(&self.context),
            Arc::new(chain),
            self.shutdown.subscribe(),
        ))
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DataLink {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn link() -> DataLink {
        let settings = ServerSettings {
            port: 0,
            ..ServerSettings::default()
        };
        DataLink::new(settings, StreamConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn exited_listeners_do_not_block_a_restart() {
        let link = link();
        let first = link.start().unwrap();
        assert!(link.is_running());
        assert_eq!(link.primary_address(), first[0]);

        // Every listener dies on its own.
        {
            let running = link.lock_running();
            for task in &running.as_ref().unwrap().tasks {
                task.abort();
            }
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            while link.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let second = link.start().unwrap();
        assert!(link.is_running());
        assert_eq!(link.primary_address(), second[0]);
        assert_eq!(link.port(), second[0].port());

        link.stop().await;
        assert!(!link.is_running());
        assert_eq!(link.port(), 0);
    }
}
