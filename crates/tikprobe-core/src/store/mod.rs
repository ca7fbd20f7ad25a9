// ── Shared device state ──
//
// The registry is the one collection written by the reconciler and read
// by the poller. It is copy-on-write: writers publish a new immutable
// map, readers hold `Arc` snapshots.

mod registry;

pub use registry::{DeviceMap, DeviceRegistry, RegistrySnapshot};
