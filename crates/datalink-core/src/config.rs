//! Configuration loading and typed config structures for the data link.
//!
//! The canonical configuration lives in `datalink-config.yaml` at the
//! project root. Every field has a default, so an empty file (or no file
//! at all) is a valid configuration. [`ServerSettings::resolve`] turns the
//! raw server section into the values the server actually runs with,
//! applying the documented fallbacks.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use tracing::{debug, warn};

/// Port used when none (or 0) is configured.
pub const DEFAULT_PORT: u16 = 8085;

/// Request length used when the configured one is too small.
pub const DEFAULT_MAX_REQUEST_LENGTH: usize = 10_000;

/// Smallest accepted maximum request length.
pub const MIN_MAX_REQUEST_LENGTH: usize = 8_000;

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "DATALINK_PORT";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level data-link configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataLinkConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Streaming push cadence.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Host simulation settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl DataLinkConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `DATALINK_PORT` overrides `server.port` when set to a valid port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.server.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.server.apply_env_overrides();
        Ok(config)
    }
}

/// Raw listener settings as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// TCP port. 0 selects the default.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Primary bind address. Unparsable values trigger auto-discovery.
    #[serde(default = "default_ip_address")]
    pub ip_address: String,

    /// Further bind addresses, each served by its own listener.
    #[serde(default)]
    pub additional_addresses: Vec<String>,

    /// Largest accepted request (head plus body) in bytes.
    #[serde(default = "default_max_request_length")]
    pub max_request_length: usize,

    /// Listen backlog per socket.
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Disable part-level capabilities (sensors, resources).
    #[serde(default)]
    pub partless: bool,
}

impl ServerConfig {
    /// Apply `DATALINK_PORT` when it holds a valid port number.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(PORT_ENV) {
            match val.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(e) => warn!(value = %val, error = %e, "ignoring invalid {PORT_ENV}"),
            }
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            ip_address: default_ip_address(),
            additional_addresses: Vec::new(),
            max_request_length: default_max_request_length(),
            backlog: default_backlog(),
            partless: false,
        }
    }
}

/// Streaming push cadence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// Push interval for new connections, in milliseconds.
    #[serde(default = "default_push_interval_ms")]
    pub push_interval_ms: u64,

    /// Floor applied to client-requested intervals, in milliseconds.
    #[serde(default = "default_min_push_interval_ms")]
    pub min_push_interval_ms: u64,
}

impl StreamConfig {
    /// Clamp a client-requested interval to the configured floor.
    pub fn clamp_interval(&self, requested_ms: u64) -> u64 {
        requested_ms.max(self.min_push_interval_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            push_interval_ms: default_push_interval_ms(),
            min_push_interval_ms: default_min_push_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Settings for the host's simulation loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Real-time milliseconds per simulation tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Listener settings after fallbacks, as the server consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Bind addresses, primary first. Never empty.
    pub addresses: Vec<IpAddr>,
    /// TCP port. 0 only when explicitly requested for tests.
    pub port: u16,
    /// Largest accepted request in bytes.
    pub max_request_length: usize,
    /// Listen backlog per socket.
    pub backlog: u32,
    /// Whether part-level capabilities are disabled.
    pub partless: bool,
    /// Server name for the banner.
    pub name: String,
    /// Server version for the banner.
    pub version: String,
}

impl ServerSettings {
    /// Apply fallbacks to a raw server section.
    ///
    /// - port 0 becomes [`DEFAULT_PORT`]
    /// - an unparsable primary address is replaced by the host's
    ///   outward-facing address, or loopback if that cannot be found
    /// - unparsable additional addresses are skipped
    /// - a maximum request length below [`MIN_MAX_REQUEST_LENGTH`]
    ///   becomes [`DEFAULT_MAX_REQUEST_LENGTH`]
    /// - a backlog of 0 becomes the default
    ///
    /// Every fallback is logged at `warn`.
    pub fn resolve(config: &ServerConfig, name: &str, version: &str) -> Self {
        let port = if config.port == 0 {
            warn!(default = DEFAULT_PORT, "port 0 configured, using default");
            DEFAULT_PORT
        } else {
            config.port
        };

        let primary = config.ip_address.trim().parse::<IpAddr>().unwrap_or_else(|e| {
            let discovered = discover_local_address();
            warn!(
                configured = %config.ip_address,
                error = %e,
                using = %discovered,
                "unparsable bind address, using discovered address"
            );
            discovered
        });

        let mut addresses = vec![primary];
        for raw in &config.additional_addresses {
            match raw.trim().parse::<IpAddr>() {
                Ok(addr) if !addresses.contains(&addr) => addresses.push(addr),
                Ok(addr) => debug!(%addr, "duplicate bind address ignored"),
                Err(e) => warn!(configured = %raw, error = %e, "skipping unparsable bind address"),
            }
        }

        let max_request_length = if config.max_request_length < MIN_MAX_REQUEST_LENGTH {
            warn!(
                configured = config.max_request_length,
                minimum = MIN_MAX_REQUEST_LENGTH,
                using = DEFAULT_MAX_REQUEST_LENGTH,
                "max request length too small"
            );
            DEFAULT_MAX_REQUEST_LENGTH
        } else {
            config.max_request_length
        };

        let backlog = if config.backlog == 0 {
            warn!(using = default_backlog(), "backlog 0 configured, using default");
            default_backlog()
        } else {
            config.backlog
        };

        Self {
            addresses,
            port,
            max_request_length,
            backlog,
            partless: config.partless,
            name: name.to_owned(),
            version: version.to_owned(),
        }
    }

    /// The first bind address.
    pub fn primary_address(&self) -> IpAddr {
        self.addresses
            .first()
            .copied()
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// Every address/port pair to listen on.
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        self.addresses
            .iter()
            .map(|ip| SocketAddr::new(*ip, self.port))
            .collect()
    }

    /// `name/version`, sent in the `Server` header.
    pub fn banner(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addresses: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            port: DEFAULT_PORT,
            max_request_length: DEFAULT_MAX_REQUEST_LENGTH,
            backlog: default_backlog(),
            partless: false,
            name: "datalink".to_owned(),
            version: "0.0.0".to_owned(),
        }
    }
}

/// Where the primary listener is actually bound.
///
/// Shared between the running server, which fills it on start and clears
/// it on stop, and the capabilities that report the listening address.
/// While empty, readers fall back to the configured [`ServerSettings`].
#[derive(Debug, Clone, Default)]
pub struct BoundListener {
    slot: Arc<RwLock<Option<SocketAddr>>>,
}

impl BoundListener {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the bound address, or clear it with `None`.
    pub fn set(&self, address: Option<SocketAddr>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = address;
    }

    /// The bound address, if listening.
    pub fn get(&self) -> Option<SocketAddr> {
        *self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The bound address, or the configured primary address and port.
    pub fn resolve(&self, settings: &ServerSettings) -> SocketAddr {
        self.get()
            .unwrap_or_else(|| SocketAddr::new(settings.primary_address(), settings.port))
    }
}

/// The address this host would use to reach the outside world.
///
/// Connecting a UDP socket sends nothing; it only asks the OS to pick a
/// route. Falls back to loopback on hosts without one.
fn discover_local_address() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_ip_address() -> String {
    "127.0.0.1".to_owned()
}

const fn default_max_request_length() -> usize {
    DEFAULT_MAX_REQUEST_LENGTH
}

const fn default_backlog() -> u32 {
    1000
}

const fn default_push_interval_ms() -> u64 {
    500
}

const fn default_min_push_interval_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_tick_interval_ms() -> u64 {
    100
}
