// ── Device registry ──

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::connector::Connector;
use crate::device::DeviceClient;

/// Immutable name → client map published by the registry.
pub type DeviceMap<C> = BTreeMap<String, Arc<DeviceClient<C>>>;

/// Point-in-time view handed to one polling cycle.
pub struct RegistrySnapshot<C: Connector> {
    pub devices: Arc<DeviceMap<C>>,
    pub targets: Arc<Vec<String>>,
}

impl<C: Connector> Clone for RegistrySnapshot<C> {
    fn clone(&self) -> Self {
        Self {
            devices: Arc::clone(&self.devices),
            targets: Arc::clone(&self.targets),
        }
    }
}

/// Copy-on-write registry of monitored devices and the active target list.
///
/// Every mutation swaps in a whole new map, so a reader never observes a
/// half-applied insert or removal. Keys always equal the client's
/// `descriptor().name`.
pub struct DeviceRegistry<C: Connector> {
    devices: ArcSwap<DeviceMap<C>>,
    targets: ArcSwap<Vec<String>>,
}

impl<C: Connector> Default for DeviceRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> DeviceRegistry<C> {
    pub fn new() -> Self {
        Self {
            devices: ArcSwap::from_pointee(BTreeMap::new()),
            targets: ArcSwap::from_pointee(Vec::new()),
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn snapshot(&self) -> RegistrySnapshot<C> {
        RegistrySnapshot {
            devices: self.devices.load_full(),
            targets: self.targets.load_full(),
        }
    }

    pub fn devices(&self) -> Arc<DeviceMap<C>> {
        self.devices.load_full()
    }

    pub fn targets(&self) -> Arc<Vec<String>> {
        self.targets.load_full()
    }

    pub fn get(&self, name: &str) -> Option<Arc<DeviceClient<C>>> {
        self.devices.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.load().contains_key(name)
    }

    /// Sorted device names.
    pub fn names(&self) -> Vec<String> {
        self.devices.load().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.load().is_empty()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Insert or replace a client under its descriptor name. Returns the
    /// client it displaced, if any.
    pub fn insert(&self, client: Arc<DeviceClient<C>>) -> Option<Arc<DeviceClient<C>>> {
        let name = client.name().to_owned();
        let previous = self.devices.rcu(|current| {
            let mut next = BTreeMap::clone(current);
            next.insert(name.clone(), Arc::clone(&client));
            next
        });
        previous.get(&name).cloned()
    }

    /// Remove a client. Its session is left for the caller to release.
    pub fn remove(&self, name: &str) -> Option<Arc<DeviceClient<C>>> {
        let previous = self.devices.rcu(|current| {
            let mut next = BTreeMap::clone(current);
            next.remove(name);
            next
        });
        previous.get(name).cloned()
    }

    pub fn set_targets(&self, targets: Vec<String>) {
        self.targets.store(Arc::new(targets));
    }

    /// Empty the registry, returning every client that was in it.
    pub fn drain(&self) -> Vec<Arc<DeviceClient<C>>> {
        let previous = self.devices.swap(Arc::new(BTreeMap::new()));
        previous.values().cloned().collect()
    }
}
