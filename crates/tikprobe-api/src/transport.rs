// Shared transport configuration for RouterOS API sessions.
//
// Every session opened by the exporter shares the same connect and
// request limits; keeping them in one place avoids threading two
// durations through every constructor.

use std::time::Duration;

/// Default TCP port of the plaintext RouterOS API service.
pub const DEFAULT_API_PORT: u16 = 8728;

/// Shared transport configuration for API sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Limit on TCP connect plus login.
    pub connect_timeout: Duration,
    /// Limit on a single command round-trip (a `/ping` burst included).
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
