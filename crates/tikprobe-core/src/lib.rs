//! Device polling and live reconciliation for the tikprobe exporter.
//!
//! This crate owns everything between the RouterOS API client
//! (`tikprobe-api`) and the metrics endpoint:
//!
//! - **[`DeviceClient`]** — One router's API session plus its retry state
//!   machine. [`probe()`](DeviceClient::probe) pings every target, folding
//!   transport failures into a single reconnect-and-retry per target.
//!
//! - **[`Poller`]** — Runs one polling cycle over a [`RegistrySnapshot`],
//!   one tokio task per device behind a semaphore, with panics isolated to
//!   the device that raised them.
//!
//! - **[`Reconciler`]** — Diffs a freshly loaded [`ExporterConfig`] against
//!   the [`DeviceRegistry`] and applies additions, removals, address
//!   changes, target changes and credential rotation.
//!
//! - **[`Exporter`]** — The run loop tying both cadences to one clock,
//!   with cancellation and an orderly [`shutdown()`](Exporter::shutdown).
//!
//! The seams to the outside are traits: [`Connector`] / [`DeviceSession`]
//! for the device API, [`MetricsSink`] for publishing and
//! [`ConfigSource`] for re-reading configuration.

pub mod config;
pub mod connector;
pub mod device;
pub mod error;
pub mod metrics;
pub mod model;
pub mod parse;
pub mod poller;
pub mod reconcile;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_LISTEN_PORT, ExporterConfig, Schedule};
pub use connector::{Connector, DeviceSession, RouterOsConnector};
pub use device::{DeviceClient, PING_COUNT, PING_INTERVAL};
pub use error::CoreError;
pub use metrics::MetricsSink;
pub use model::{Credentials, DeviceDescriptor, Measurement, parse_target_list};
pub use poller::{CycleReport, DEFAULT_MAX_PARALLEL, Poller};
pub use reconcile::{ConfigSource, Reconciler, ReloadSummary};
pub use scheduler::Exporter;
pub use store::{DeviceRegistry, RegistrySnapshot};
