// ── Test doubles ──
//
// Scripted connector, recording sink and in-memory config source shared
// by the unit tests in this crate.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tikprobe_api::Record;
use tokio::time::Instant;

use crate::config::ExporterConfig;
use crate::connector::{Connector, DeviceSession};
use crate::metrics::MetricsSink;
use crate::model::{Credentials, DeviceDescriptor, Measurement};
use crate::reconcile::ConfigSource;

// ── Replies ─────────────────────────────────────────────────────────

/// What one scripted `/ping` call does.
pub(crate) enum Outcome {
    Reply(Vec<Record>),
    /// Socket dropped mid-command.
    Reset,
    /// Router rejected the command; session stays up.
    Trap,
    Panic,
    /// Answer successfully after a delay.
    Slow(Duration),
}

/// A `/ping` reply with one echo record and a summary record.
pub(crate) fn ok_reply(sent: u32, received: u32, avg_rtt: &str) -> Vec<Record> {
    let loss = if sent == 0 {
        100
    } else {
        100 * (sent - received.min(sent)) / sent
    };
    vec![
        [("seq", "0"), ("time", avg_rtt), ("sent", "1"), ("received", "1")]
            .into_iter()
            .collect(),
        [
            ("sent", sent.to_string()),
            ("received", received.to_string()),
            ("packet-loss", loss.to_string()),
            ("avg-rtt", avg_rtt.to_owned()),
        ]
        .into_iter()
        .collect(),
    ]
}

// ── Connector ───────────────────────────────────────────────────────

#[derive(Default)]
struct DeviceLog {
    connects: u32,
    successes: u32,
    closes: u32,
    open: i64,
    pings: Vec<String>,
    ping_started: Vec<Instant>,
    last_username: Option<String>,
    last_address: Option<String>,
    fail_next: u32,
    fail_after: Option<u32>,
}

#[derive(Default)]
struct Shared {
    devices: Mutex<HashMap<String, DeviceLog>>,
    scripts: Mutex<HashMap<(String, String), VecDeque<Outcome>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Shared {
    fn with_device<R>(&self, device: &str, f: impl FnOnce(&mut DeviceLog) -> R) -> R {
        let mut devices = self.devices.lock().unwrap();
        f(devices.entry(device.to_owned()).or_default())
    }
}

/// In-memory connector whose sessions follow per-target scripts.
///
/// Unscripted pings answer `3/3` received at `10ms`.
#[derive(Default)]
pub(crate) struct FakeConnector {
    shared: Arc<Shared>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for pings of `target` from `device`.
    pub(crate) fn script(
        &self,
        device: &str,
        target: &str,
        outcomes: impl IntoIterator<Item = Outcome>,
    ) {
        self.shared
            .scripts
            .lock()
            .unwrap()
            .entry((device.to_owned(), target.to_owned()))
            .or_default()
            .extend(outcomes);
    }

    /// Refuse the next `count` connect attempts.
    pub(crate) fn fail_connect(&self, device: &str, count: u32) {
        self.shared.with_device(device, |d| d.fail_next = count);
    }

    /// Refuse every connect once `successes` connects have gone through.
    pub(crate) fn fail_connect_after(&self, device: &str, successes: u32) {
        self.shared
            .with_device(device, |d| d.fail_after = Some(successes));
    }

    pub(crate) fn connect_count(&self, device: &str) -> u32 {
        self.shared.with_device(device, |d| d.connects)
    }

    pub(crate) fn close_count(&self, device: &str) -> u32 {
        self.shared.with_device(device, |d| d.closes)
    }

    pub(crate) fn open_sessions(&self, device: &str) -> i64 {
        self.shared.with_device(device, |d| d.open)
    }

    pub(crate) fn ping_count(&self, device: &str) -> usize {
        self.shared.with_device(device, |d| d.pings.len())
    }

    pub(crate) fn pings(&self, device: &str) -> Vec<String> {
        self.shared.with_device(device, |d| d.pings.clone())
    }

    pub(crate) fn ping_started(&self, device: &str) -> Vec<Instant> {
        self.shared.with_device(device, |d| d.ping_started.clone())
    }

    pub(crate) fn last_username(&self, device: &str) -> Option<String> {
        self.shared.with_device(device, |d| d.last_username.clone())
    }

    pub(crate) fn last_address(&self, device: &str) -> Option<String> {
        self.shared.with_device(device, |d| d.last_address.clone())
    }

    /// Highest number of `Slow` pings observed running at once.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(
        &self,
        device: &DeviceDescriptor,
        credentials: &Credentials,
    ) -> Result<FakeSession, tikprobe_api::Error> {
        let refused = self.shared.with_device(&device.name, |d| {
            d.connects += 1;
            d.last_username = Some(credentials.username.clone());
            d.last_address = Some(device.address.clone());
            if d.fail_next > 0 {
                d.fail_next -= 1;
                return true;
            }
            if d.fail_after.is_some_and(|n| d.successes >= n) {
                return true;
            }
            d.successes += 1;
            d.open += 1;
            false
        });

        if refused {
            return Err(tikprobe_api::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(FakeSession {
            device: device.name.clone(),
            shared: Arc::clone(&self.shared),
        })
    }
}

pub(crate) struct FakeSession {
    device: String,
    shared: Arc<Shared>,
}

impl DeviceSession for FakeSession {
    async fn ping(
        &mut self,
        target: &str,
        _count: u32,
        _interval: Duration,
    ) -> Result<Vec<Record>, tikprobe_api::Error> {
        self.shared.with_device(&self.device, |d| {
            d.pings.push(target.to_owned());
            d.ping_started.push(Instant::now());
        });
        let outcome = self
            .shared
            .scripts
            .lock()
            .unwrap()
            .get_mut(&(self.device.clone(), target.to_owned()))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Outcome::Reply(ok_reply(3, 3, "10ms")));

        match outcome {
            Outcome::Reply(records) => Ok(records),
            Outcome::Reset => Err(tikprobe_api::Error::ConnectionClosed),
            Outcome::Trap => Err(tikprobe_api::Error::Trap {
                command: "/ping".into(),
                message: "invalid value for argument address".into(),
            }),
            Outcome::Panic => panic!("scripted panic pinging {target}"),
            Outcome::Slow(delay) => {
                let now = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.shared.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(ok_reply(3, 3, "10ms"))
            }
        }
    }

    async fn close(self) -> Result<(), tikprobe_api::Error> {
        self.shared.with_device(&self.device, |d| {
            d.closes += 1;
            d.open -= 1;
        });
        Ok(())
    }
}

// ── Sink ────────────────────────────────────────────────────────────

/// Keeps the last value written for every series.
#[derive(Default)]
pub(crate) struct RecordingSink {
    up: Mutex<BTreeMap<String, bool>>,
    measurements: Mutex<BTreeMap<(String, String), Measurement>>,
}

impl RecordingSink {
    pub(crate) fn up(&self, device: &str) -> Option<bool> {
        self.up.lock().unwrap().get(device).copied()
    }

    pub(crate) fn measurement(&self, device: &str, target: &str) -> Option<Measurement> {
        self.measurements
            .lock()
            .unwrap()
            .get(&(device.to_owned(), target.to_owned()))
            .copied()
    }

    /// Targets with a series for `device`.
    pub(crate) fn targets_of(&self, device: &str) -> Vec<String> {
        self.measurements
            .lock()
            .unwrap()
            .keys()
            .filter(|(d, _)| d == device)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn set_device_up(&self, device: &str, up: bool) {
        self.up.lock().unwrap().insert(device.to_owned(), up);
    }

    fn record_measurement(&self, device: &str, target: &str, measurement: &Measurement) {
        self.measurements
            .lock()
            .unwrap()
            .insert((device.to_owned(), target.to_owned()), *measurement);
    }
}

// ── Config source ───────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct SourceError(String);

/// Config source serving whatever was last `set`.
pub(crate) struct StaticSource {
    current: Mutex<Result<ExporterConfig, String>>,
    loads: AtomicUsize,
}

impl StaticSource {
    pub(crate) fn new(config: ExporterConfig) -> Self {
        Self {
            current: Mutex::new(Ok(config)),
            loads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set(&self, config: ExporterConfig) {
        *self.current.lock().unwrap() = Ok(config);
    }

    pub(crate) fn break_with(&self, message: &str) {
        *self.current.lock().unwrap() = Err(message.to_owned());
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigSource for StaticSource {
    type Error = SourceError;

    fn load(&self) -> Result<ExporterConfig, SourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().clone().map_err(SourceError)
    }
}

/// Config with the given routers (`name=address`) and targets.
pub(crate) fn config(routers: &[(&str, &str)], targets: &[&str]) -> ExporterConfig {
    ExporterConfig {
        routers: routers
            .iter()
            .map(|(n, a)| ((*n).to_owned(), (*a).to_owned()))
            .collect(),
        targets: targets.iter().map(|t| (*t).to_owned()).collect(),
        ..ExporterConfig::default()
    }
}
