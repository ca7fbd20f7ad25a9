// ── Metrics sink seam ──

use crate::model::Measurement;

/// Destination for per-cycle results.
///
/// The poller and reconciler only ever call these setters; how the values
/// are stored and exposed is up to the implementation. Calls arrive from
/// concurrent probe tasks.
pub trait MetricsSink: Send + Sync + 'static {
    /// Publish the device-up indicator.
    fn set_device_up(&self, device: &str, up: bool);

    /// Publish one target's latency, loss and status series.
    fn record_measurement(&self, device: &str, target: &str, measurement: &Measurement);

    /// Zero out a device that left the configuration so its series read
    /// as down instead of holding their last values.
    fn mark_device_removed(&self, device: &str, targets: &[String]) {
        self.set_device_up(device, false);
        for target in targets {
            self.record_measurement(device, target, &Measurement::FAILED);
        }
    }
}
