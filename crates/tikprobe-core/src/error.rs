// ── Core error types ──
//
// Device-level errors from tikprobe-core. Consumers never see raw socket
// or reply-parsing failures; `DeviceClient` folds `tikprobe_api::Error`
// into the variants below together with the device it came from.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device {device} at {address}: {reason}")]
    DeviceUnreachable {
        device: String,
        address: String,
        reason: String,
    },

    #[error("Authentication failed for device {device}: {message}")]
    AuthenticationFailed { device: String, message: String },
}

impl CoreError {
    /// Classify a failed connect attempt for `device`.
    pub(crate) fn connect_failed(
        device: &crate::model::DeviceDescriptor,
        err: &tikprobe_api::Error,
    ) -> Self {
        if err.is_auth() {
            Self::AuthenticationFailed {
                device: device.name.clone(),
                message: err.to_string(),
            }
        } else {
            Self::DeviceUnreachable {
                device: device.name.clone(),
                address: device.endpoint(),
                reason: err.to_string(),
            }
        }
    }

    /// Returns `true` if the error means the device should read as down.
    pub fn is_device_down(&self) -> bool {
        matches!(
            self,
            Self::DeviceUnreachable { .. } | Self::AuthenticationFailed { .. }
        )
    }
}
