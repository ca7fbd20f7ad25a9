// ── Device API seam ──
//
// `DeviceClient` talks to routers only through these two traits, so the
// retry state machine can be exercised without sockets. The production
// implementation wraps `tikprobe_api::Session`.

use std::future::Future;
use std::time::Duration;

use tikprobe_api::{Record, Session, TransportConfig};

use crate::model::{Credentials, DeviceDescriptor};

/// Opens API sessions to devices.
pub trait Connector: Send + Sync + 'static {
    type Session: DeviceSession;

    fn connect(
        &self,
        device: &DeviceDescriptor,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Self::Session, tikprobe_api::Error>> + Send;
}

/// One live, exclusively owned API connection.
pub trait DeviceSession: Send + 'static {
    fn ping(
        &mut self,
        target: &str,
        count: u32,
        interval: Duration,
    ) -> impl Future<Output = Result<Vec<Record>, tikprobe_api::Error>> + Send;

    fn close(self) -> impl Future<Output = Result<(), tikprobe_api::Error>> + Send;
}

/// Connects over the plaintext RouterOS API.
#[derive(Debug, Clone, Default)]
pub struct RouterOsConnector {
    transport: TransportConfig,
}

impl RouterOsConnector {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }
}

impl Connector for RouterOsConnector {
    type Session = Session;

    async fn connect(
        &self,
        device: &DeviceDescriptor,
        credentials: &Credentials,
    ) -> Result<Session, tikprobe_api::Error> {
        Session::connect(
            &device.address,
            device.api_port,
            &credentials.username,
            &credentials.password,
            &self.transport,
        )
        .await
    }
}

impl DeviceSession for Session {
    async fn ping(
        &mut self,
        target: &str,
        count: u32,
        interval: Duration,
    ) -> Result<Vec<Record>, tikprobe_api::Error> {
        Session::ping(self, target, count, interval).await
    }

    async fn close(self) -> Result<(), tikprobe_api::Error> {
        Session::close(self).await
    }
}
