#![allow(clippy::unwrap_used)]
// Reloads driven through `FileConfigSource` into a live `Reconciler`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use tikprobe_api::Record;
use tikprobe_config::FileConfigSource;
use tikprobe_core::{
    Connector, Credentials, DeviceDescriptor, DeviceRegistry, DeviceSession, Measurement,
    MetricsSink, Reconciler,
};

// ── Doubles ─────────────────────────────────────────────────────────

/// Every router is offline; devices stay registered but disconnected.
struct OfflineConnector;

struct NoSession;

impl DeviceSession for NoSession {
    async fn ping(
        &mut self,
        _target: &str,
        _count: u32,
        _interval: Duration,
    ) -> Result<Vec<Record>, tikprobe_api::Error> {
        Err(tikprobe_api::Error::NotConnected)
    }

    async fn close(self) -> Result<(), tikprobe_api::Error> {
        Ok(())
    }
}

impl Connector for OfflineConnector {
    type Session = NoSession;

    async fn connect(
        &self,
        _device: &DeviceDescriptor,
        _credentials: &Credentials,
    ) -> Result<NoSession, tikprobe_api::Error> {
        Err(tikprobe_api::Error::ConnectionClosed)
    }
}

#[derive(Default)]
struct UpSink {
    up: Mutex<BTreeMap<String, bool>>,
}

impl MetricsSink for UpSink {
    fn set_device_up(&self, device: &str, up: bool) {
        self.up.lock().unwrap().insert(device.to_owned(), up);
    }

    fn record_measurement(&self, _device: &str, _target: &str, _measurement: &Measurement) {}
}

// ── Tests ───────────────────────────────────────────────────────────

const GOOD: &str = "username: monitor\n\
                    password: s3cret\n\
                    ping_addresses: 8.8.8.8,1.1.1.1\n\
                    routers:\n  a: 10.0.0.1\n  b: 10.0.0.2\n";

fn write(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
}

#[tokio::test]
async fn unreadable_file_keeps_live_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    write(&path, GOOD);

    let registry = Arc::new(DeviceRegistry::new());
    let sink = Arc::new(UpSink::default());
    let mut reconciler = Reconciler::new(
        Arc::clone(&registry),
        Arc::new(OfflineConnector),
        Arc::clone(&sink),
        Credentials::new("admin", ""),
    );
    let source = FileConfigSource::new(&path);

    let summary = reconciler.reload(&source).await.unwrap();
    assert_eq!(summary.added, vec!["a", "b"]);
    let expected_credentials = Credentials::new("monitor", "s3cret");

    for body in [
        "",
        "{}\n",
        "# being rewritten\n",
        "routers: [unterminated\n",
    ] {
        write(&path, body);

        assert!(reconciler.reload(&source).await.is_none(), "{body:?}");
        assert_eq!(registry.names(), vec!["a", "b"], "{body:?}");
        assert_eq!(
            *registry.targets(),
            vec!["8.8.8.8".to_owned(), "1.1.1.1".to_owned()]
        );
        assert!(reconciler.credentials().matches(&expected_credentials));
    }

    fs::remove_file(&path).unwrap();
    assert!(reconciler.reload(&source).await.is_none());
    assert_eq!(registry.names(), vec!["a", "b"]);

    // Nothing was published down along the way.
    assert!(sink.up.lock().unwrap().is_empty());
}
