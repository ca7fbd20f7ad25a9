// ── Probe measurement ──

/// Normalized result of one ping burst against one target.
///
/// Produced fresh every cycle and handed straight to the metrics sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Average round-trip time in milliseconds, `0.0` when unknown.
    pub average_latency_ms: f64,
    /// Share of lost echo requests, `0.0..=100.0`.
    pub loss_percent: f64,
    pub reachable: bool,
}

impl Measurement {
    /// The value recorded when a target could not be measured at all.
    pub const FAILED: Self = Self {
        average_latency_ms: 0.0,
        loss_percent: 100.0,
        reachable: false,
    };

    pub fn failed() -> Self {
        Self::FAILED
    }

    /// `1.0` / `0.0` for the status gauge.
    pub fn status_value(&self) -> f64 {
        if self.reachable { 1.0 } else { 0.0 }
    }
}
