// ── Runtime configuration ──
//
// The shape the core consumes. How it is stored on disk is the
// concern of `tikprobe-config`.

use std::collections::BTreeMap;
use std::time::Duration;

use tikprobe_api::{DEFAULT_API_PORT, TransportConfig};

use crate::model::{Credentials, DeviceDescriptor};
use crate::poller::DEFAULT_MAX_PARALLEL;

/// Default port of the metrics endpoint.
pub const DEFAULT_LISTEN_PORT: u16 = 8000;

/// Polling and reload cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Nominal time from the start of one cycle to the start of the next.
    pub poll_interval: Duration,
    /// Minimum time between configuration reloads.
    pub reload_interval: Duration,
    /// Upper bound on concurrently running device probes.
    pub max_parallel: usize,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(20),
            reload_interval: Duration::from_secs(60),
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }
}

/// Everything one configuration load yields.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub credentials: Credentials,
    pub api_port: u16,
    pub listen_port: u16,
    /// Probe targets, deduplicated.
    pub targets: Vec<String>,
    /// Router name → address.
    pub routers: BTreeMap<String, String>,
    pub schedule: Schedule,
    pub transport: TransportConfig,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::new("admin", ""),
            api_port: DEFAULT_API_PORT,
            listen_port: DEFAULT_LISTEN_PORT,
            targets: Vec::new(),
            routers: BTreeMap::new(),
            schedule: Schedule::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl ExporterConfig {
    /// Descriptors for every configured router, in name order.
    pub fn descriptors(&self) -> impl Iterator<Item = DeviceDescriptor> + '_ {
        self.routers
            .iter()
            .map(|(name, address)| DeviceDescriptor::new(name, address, self.api_port))
    }
}
