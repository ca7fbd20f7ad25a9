// ── Per-device client ──
//
// Owns one router's API session and the retry state machine around it.
// All access to the session goes through a per-device async mutex, so a
// probe and a credential-driven reconnect for the same device never
// overlap.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::connector::{Connector, DeviceSession};
use crate::error::CoreError;
use crate::model::{Credentials, DeviceDescriptor, Measurement};
use crate::parse::measurement_from_reply;

/// Echo requests per target per cycle.
pub const PING_COUNT: u32 = 3;
/// Spacing between echo requests.
pub const PING_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on releasing a session before reconnecting.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

struct ClientState<S> {
    credentials: Credentials,
    session: Option<S>,
}

/// A monitored router and its (possibly absent) API session.
pub struct DeviceClient<C: Connector> {
    descriptor: DeviceDescriptor,
    connector: Arc<C>,
    state: Mutex<ClientState<C::Session>>,
}

impl<C: Connector> std::fmt::Debug for DeviceClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> DeviceClient<C> {
    /// Create a disconnected client. Call [`connect()`](Self::connect) or
    /// let the first [`probe()`](Self::probe) establish the session.
    pub fn new(descriptor: DeviceDescriptor, credentials: Credentials, connector: Arc<C>) -> Self {
        Self {
            descriptor,
            connector,
            state: Mutex::new(ClientState {
                credentials,
                session: None,
            }),
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Whether a session is currently held. Waits for any in-flight probe.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Drop any existing session and open a fresh one.
    ///
    /// Safe to call repeatedly; never leaves two sessions alive. On
    /// failure the client stays usable and the next probe retries.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await
    }

    /// Swap in new credentials and reconnect with them.
    pub async fn reconnect_with(&self, credentials: Credentials) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        state.credentials = credentials;
        self.connect_locked(&mut state).await
    }

    /// Release the session, if any. Teardown failures are ignored.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        self.release(&mut state).await;
    }

    async fn connect_locked(&self, state: &mut ClientState<C::Session>) -> Result<(), CoreError> {
        self.release(state).await;

        match self
            .connector
            .connect(&self.descriptor, &state.credentials)
            .await
        {
            Ok(session) => {
                state.session = Some(session);
                info!(
                    device = %self.descriptor.name,
                    address = %self.descriptor.address,
                    "connected to device API"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    device = %self.descriptor.name,
                    address = %self.descriptor.address,
                    error = %e,
                    "failed to connect to device API"
                );
                Err(CoreError::connect_failed(&self.descriptor, &e))
            }
        }
    }

    async fn release(&self, state: &mut ClientState<C::Session>) {
        let Some(session) = state.session.take() else {
            return;
        };
        match tokio::time::timeout(TEARDOWN_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(device = %self.descriptor.name, error = %e, "ignoring session teardown failure");
            }
            Err(_) => {
                debug!(device = %self.descriptor.name, "session teardown timed out");
            }
        }
    }

    // ── Probing ──────────────────────────────────────────────────

    /// Ping every target from this device.
    ///
    /// Fails as a whole only when no session exists and one cannot be
    /// opened; the caller reports the device as down. Otherwise the map
    /// holds an entry for every requested target, with failed targets
    /// recorded as [`Measurement::FAILED`].
    pub async fn probe(
        &self,
        targets: &[String],
    ) -> Result<BTreeMap<String, Measurement>, CoreError> {
        let mut state = self.state.lock().await;
        if state.session.is_none() {
            self.connect_locked(&mut state).await?;
        }

        let mut results = BTreeMap::new();
        for target in targets {
            let measurement = self.probe_target(&mut state, target).await;
            results.insert(target.clone(), measurement);
        }
        Ok(results)
    }

    /// Measure one target, reconnecting and retrying once after a
    /// transport failure.
    async fn probe_target(&self, state: &mut ClientState<C::Session>, target: &str) -> Measurement {
        let err = match self.ping_target(state, target, false).await {
            Ok(measurement) => return measurement,
            Err(e) => e,
        };

        if !err.is_connection_lost() {
            // The router answered with an error; the session is fine.
            warn!(device = %self.descriptor.name, target, error = %err, "ping rejected by device");
            return Measurement::failed();
        }

        error!(
            device = %self.descriptor.name,
            address = %self.descriptor.address,
            target,
            error = %err,
            "ping failed, reconnecting"
        );
        if self.connect_locked(state).await.is_err() {
            return Measurement::failed();
        }

        match self.ping_target(state, target, true).await {
            Ok(measurement) => measurement,
            Err(e) => {
                error!(device = %self.descriptor.name, target, error = %e, "ping retry failed");
                if e.is_connection_lost() {
                    self.release(state).await;
                }
                Measurement::failed()
            }
        }
    }

    async fn ping_target(
        &self,
        state: &mut ClientState<C::Session>,
        target: &str,
        retried: bool,
    ) -> Result<Measurement, tikprobe_api::Error> {
        let session = state
            .session
            .as_mut()
            .ok_or(tikprobe_api::Error::NotConnected)?;
        let records = session.ping(target, PING_COUNT, PING_INTERVAL).await?;

        let Some(measurement) = measurement_from_reply(&records) else {
            warn!(device = %self.descriptor.name, target, retried, "empty ping reply");
            return Ok(Measurement::failed());
        };

        if measurement.reachable {
            info!(
                device = %self.descriptor.name,
                address = %self.descriptor.address,
                target,
                avg_rtt_ms = measurement.average_latency_ms,
                loss_pct = measurement.loss_percent,
                retried,
                "ping ok"
            );
        } else {
            warn!(
                device = %self.descriptor.name,
                address = %self.descriptor.address,
                target,
                retried,
                "target not responding (100% loss)"
            );
        }
        Ok(measurement)
    }
}
