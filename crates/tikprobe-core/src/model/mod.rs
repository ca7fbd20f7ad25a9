// ── Domain model ──
//
// Canonical types shared by the device client, the poller and the
// reconciler. Nothing here performs I/O.

pub mod device;
pub mod measurement;
pub mod target;

pub use device::{Credentials, DeviceDescriptor};
pub use measurement::Measurement;
pub use target::{parse_target_list, same_target_set};
