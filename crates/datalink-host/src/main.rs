//! Demonstration host for the simulation data link.
//!
//! Runs a small flight simulation and serves it through the data link so
//! clients can be developed without a game running.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `datalink-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Resolve server settings and assemble the data link
//! 4. Register the host's plugin capabilities
//! 5. Start the listeners
//! 6. Tick the simulation until `Ctrl-C`
//! 7. Stop the data link

mod provider;
mod sim;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use datalink_core::config::LoggingConfig;
use datalink_core::{DataLinkConfig, ServerSettings};
use datalink_server::DataLink;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::provider::HostProvider;
use crate::sim::FlightSim;

const CONFIG_PATH: &str = "datalink-config.yaml";

/// Spare stages on the demonstration vessel.
const DEMO_STAGES: u32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging settings live in the config file, so it is read first.
    let (config, load_error) = load_config();
    init_tracing(&config.logging);
    if let Some(e) = load_error {
        warn!(path = CONFIG_PATH, error = %e, "failed to load config, using defaults");
    }
    info!("datalink-host starting");

    let settings = ServerSettings::resolve(
        &config.server,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );
    let link = DataLink::new(settings, config.stream).context("assembling data link")?;
    let registered = link.plugins().register_provider(&HostProvider);
    info!(registered, "host capabilities registered");

    let addresses = link.start().context("starting data link")?;
    info!(?addresses, "data link up");

    let tick = Duration::from_millis(config.simulation.tick_interval_ms.max(1));
    run(&link, tick).await.context("running simulation")?;

    link.stop().await;
    info!("datalink-host shutdown complete");
    Ok(())
}

/// Tick the simulation every `tick` until `Ctrl-C`.
async fn run(link: &DataLink, tick: Duration) -> std::io::Result<()> {
    let mut sim = FlightSim::new("Kestrel", DEMO_STAGES);
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("interrupt received, stopping");
                return Ok(());
            }
            _ = interval.tick() => {
                let now = Instant::now();
                sim.step(now.saturating_duration_since(last).as_secs_f64());
                last = now;
                let telemetry = sim.telemetry();
                link.update(&mut sim, telemetry);
            }
        }
    }
}

/// Load the configuration file, falling back to defaults when it is
/// missing or invalid. The error is returned for logging once tracing is up.
fn load_config() -> (DataLinkConfig, Option<datalink_core::config::ConfigError>) {
    let path = Path::new(CONFIG_PATH);
    if !path.exists() {
        let mut config = DataLinkConfig::default();
        config.server.apply_env_overrides();
        return (config, None);
    }
    match DataLinkConfig::from_file(path) {
        Ok(config) => (config, None),
        Err(e) => (DataLinkConfig::default(), Some(e)),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
