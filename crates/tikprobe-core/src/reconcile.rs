// ── Live configuration reconciler ──
//
// Diffs a freshly loaded configuration against the registry and applies
// the difference: target list, new / replaced / removed devices and
// credential rotation. The reconciler is the only writer of the registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use crate::config::ExporterConfig;
use crate::connector::Connector;
use crate::device::DeviceClient;
use crate::metrics::MetricsSink;
use crate::model::{Credentials, same_target_set};
use crate::store::DeviceRegistry;

/// Where configuration is re-read from on every reload.
pub trait ConfigSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> Result<ExporterConfig, Self::Error>;
}

/// What one reload changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub targets_changed: bool,
    pub added: Vec<String>,
    /// Same name, new address or port.
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
    pub credentials_rotated: bool,
    /// Devices reconnected because of rotated credentials.
    pub reconnected: Vec<String>,
    /// Subset of `added`, `replaced` and `reconnected` that failed to connect.
    pub connect_failed: Vec<String>,
}

impl ReloadSummary {
    pub fn is_noop(&self) -> bool {
        !self.targets_changed
            && !self.credentials_rotated
            && self.added.is_empty()
            && self.replaced.is_empty()
            && self.removed.is_empty()
    }
}

pub struct Reconciler<C: Connector, M: MetricsSink> {
    registry: Arc<DeviceRegistry<C>>,
    connector: Arc<C>,
    sink: Arc<M>,
    credentials: Credentials,
}

impl<C: Connector, M: MetricsSink> Reconciler<C, M> {
    /// `credentials` are the ones devices will be created with until the
    /// first rotation.
    pub fn new(
        registry: Arc<DeviceRegistry<C>>,
        connector: Arc<C>,
        sink: Arc<M>,
        credentials: Credentials,
    ) -> Self {
        Self {
            registry,
            connector,
            sink,
            credentials,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry<C>> {
        &self.registry
    }

    /// Re-read `source` and apply it. A load failure is logged and leaves
    /// every piece of live state untouched.
    pub async fn reload<S: ConfigSource>(&mut self, source: &S) -> Option<ReloadSummary> {
        match source.load() {
            Ok(config) => Some(self.apply(&config).await),
            Err(e) => {
                error!(error = %e, "configuration reload failed, keeping current state");
                None
            }
        }
    }

    /// Bring the registry in line with `config`.
    ///
    /// Also used for the initial bootstrap against an empty registry.
    pub async fn apply(&mut self, config: &ExporterConfig) -> ReloadSummary {
        let mut summary = ReloadSummary::default();
        let previous_targets = self.registry.targets();

        // ── Targets ──────────────────────────────────────────────
        if !same_target_set(previous_targets.as_slice(), config.targets.as_slice()) {
            self.registry.set_targets(config.targets.clone());
            summary.targets_changed = true;
            info!(targets = ?config.targets, "probe targets updated");
        }

        // ── Credentials ──────────────────────────────────────────
        // Swapped before any client is built so new devices log in with
        // the rotated values.
        if !self.credentials.matches(&config.credentials) {
            self.credentials = config.credentials.clone();
            summary.credentials_rotated = true;
            info!(username = %self.credentials.username, "API credentials changed");
        }

        // ── Added and replaced devices ───────────────────────────
        let existing = self.registry.devices();
        let mut fresh = Vec::new();
        for descriptor in config.descriptors() {
            match existing.get(&descriptor.name) {
                None => summary.added.push(descriptor.name.clone()),
                Some(current) if current.descriptor() != &descriptor => {
                    info!(
                        device = %descriptor.name,
                        from = %current.descriptor().endpoint(),
                        to = %descriptor.endpoint(),
                        "device address changed, replacing client"
                    );
                    summary.replaced.push(descriptor.name.clone());
                }
                Some(_) => continue,
            }
            fresh.push(Arc::new(DeviceClient::new(
                descriptor,
                self.credentials.clone(),
                Arc::clone(&self.connector),
            )));
        }

        let outcomes = join_all(fresh.iter().map(|client| client.connect())).await;
        for (client, outcome) in fresh.into_iter().zip(outcomes) {
            if let Err(e) = outcome {
                warn!(
                    device = %client.name(),
                    error = %e,
                    "device added but not reachable yet; will retry next cycle"
                );
                summary.connect_failed.push(client.name().to_owned());
            } else {
                info!(device = %client.name(), "device added");
            }
            if let Some(displaced) = self.registry.insert(client) {
                displaced.close().await;
            }
        }

        // ── Removed devices ──────────────────────────────────────
        let wanted: BTreeSet<&str> = config.routers.keys().map(String::as_str).collect();
        for name in existing.keys().filter(|name| !wanted.contains(name.as_str())) {
            if let Some(client) = self.registry.remove(name) {
                client.close().await;
            }
            self.sink.mark_device_removed(name, &config.targets);
            info!(device = %name, "device removed");
            summary.removed.push(name.clone());
        }

        // ── Credential rotation ──────────────────────────────────
        if summary.credentials_rotated {
            let survivors: Vec<_> = existing
                .values()
                .filter(|client| {
                    wanted.contains(client.name())
                        && !summary.replaced.iter().any(|n| n == client.name())
                })
                .cloned()
                .collect();

            let credentials = &self.credentials;
            let outcomes = join_all(
                survivors
                    .iter()
                    .map(|client| client.reconnect_with(credentials.clone())),
            )
            .await;
            for (client, outcome) in survivors.iter().zip(outcomes) {
                summary.reconnected.push(client.name().to_owned());
                if let Err(e) = outcome {
                    error!(
                        device = %client.name(),
                        error = %e,
                        "reconnect with new credentials failed"
                    );
                    summary.connect_failed.push(client.name().to_owned());
                }
            }
        }

        if summary.is_noop() {
            debug!("configuration unchanged");
        } else {
            info!(
                added = summary.added.len(),
                replaced = summary.replaced.len(),
                removed = summary.removed.len(),
                reconnected = summary.reconnected.len(),
                failed = summary.connect_failed.len(),
                devices = self.registry.len(),
                "configuration applied"
            );
        }
        summary
    }
}
