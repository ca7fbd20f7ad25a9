// ── Polling orchestrator ──
//
// One cycle probes every device in a registry snapshot on its own tokio
// task. A semaphore bounds how many probes run at once; the cycle joins
// every task before returning, so it is synchronous from the caller's
// point of view.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::connector::Connector;
use crate::device::DeviceClient;
use crate::metrics::MetricsSink;
use crate::store::RegistrySnapshot;

/// Default upper bound on concurrently probed devices.
pub const DEFAULT_MAX_PARALLEL: usize = 32;

/// Number of probe permits for `devices` devices under `cap`.
///
/// Always at least one, never more than there are devices.
pub fn concurrency_limit(devices: usize, cap: usize) -> usize {
    cap.max(1).min(devices.max(1))
}

/// How each device fared in one cycle. Names are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Probed successfully.
    pub up: Vec<String>,
    /// Could not be connected; published as down.
    pub down: Vec<String>,
    /// Probe task panicked or was aborted.
    pub failed: Vec<String>,
}

impl CycleReport {
    pub fn total(&self) -> usize {
        self.up.len() + self.down.len() + self.failed.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceOutcome {
    Up,
    Down,
    Failed,
}

/// Fans probes out across devices and forwards results to a sink.
pub struct Poller<M: MetricsSink> {
    sink: Arc<M>,
    max_parallel: usize,
}

impl<M: MetricsSink> Poller<M> {
    pub fn new(sink: Arc<M>, max_parallel: usize) -> Self {
        Self { sink, max_parallel }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Probe every device in `snapshot` against the snapshot's targets.
    ///
    /// Per-device failures, panics included, are logged and reported but
    /// never cut the cycle short.
    pub async fn run_cycle<C: Connector>(&self, snapshot: &RegistrySnapshot<C>) -> CycleReport {
        let permits = concurrency_limit(snapshot.devices.len(), self.max_parallel);
        let semaphore = Arc::new(Semaphore::new(permits));
        debug!(
            devices = snapshot.devices.len(),
            targets = snapshot.targets.len(),
            permits,
            "starting polling cycle"
        );

        let mut tasks = JoinSet::new();
        for (name, device) in snapshot.devices.iter() {
            let name = name.clone();
            let device = Arc::clone(device);
            let targets = Arc::clone(&snapshot.targets);
            let sink = Arc::clone(&self.sink);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, DeviceOutcome::Failed);
                };
                let outcome = AssertUnwindSafe(poll_device(&device, &targets, sink.as_ref()))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(outcome) => (name, outcome),
                    Err(panic) => {
                        error!(
                            device = %name,
                            panic = panic_message(panic.as_ref()),
                            "probe task panicked"
                        );
                        sink.set_device_up(&name, false);
                        (name, DeviceOutcome::Failed)
                    }
                }
            });
        }

        let mut report = CycleReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, DeviceOutcome::Up)) => report.up.push(name),
                Ok((name, DeviceOutcome::Down)) => report.down.push(name),
                Ok((name, DeviceOutcome::Failed)) => report.failed.push(name),
                Err(e) => error!(error = %e, "probe task aborted"),
            }
        }
        report.up.sort();
        report.down.sort();
        report.failed.sort();
        report
    }
}

async fn poll_device<C: Connector, M: MetricsSink>(
    device: &DeviceClient<C>,
    targets: &[String],
    sink: &M,
) -> DeviceOutcome {
    let name = device.name();
    match device.probe(targets).await {
        Ok(results) => {
            sink.set_device_up(name, true);
            for (target, measurement) in &results {
                sink.record_measurement(name, target, measurement);
            }
            DeviceOutcome::Up
        }
        Err(e) => {
            error!(
                device = %name,
                address = %device.descriptor().address,
                error = %e,
                "device unreachable, marking down"
            );
            sink.set_device_up(name, false);
            DeviceOutcome::Down
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Credentials, DeviceDescriptor, Measurement};
    use crate::store::DeviceRegistry;
    use crate::testing::{FakeConnector, Outcome, RecordingSink};

    fn registry(
        connector: &Arc<FakeConnector>,
        names: &[&str],
        targets: &[&str],
    ) -> DeviceRegistry<FakeConnector> {
        let registry = DeviceRegistry::new();
        for name in names {
            registry.insert(Arc::new(DeviceClient::new(
                DeviceDescriptor::new(*name, format!("{name}.lan"), 8728),
                Credentials::new("admin", ""),
                Arc::clone(connector),
            )));
        }
        registry.set_targets(targets.iter().map(|t| (*t).to_owned()).collect());
        registry
    }

    #[test]
    fn limit_is_bounded_by_devices_and_cap() {
        assert_eq!(concurrency_limit(0, 32), 1);
        assert_eq!(concurrency_limit(5, 32), 5);
        assert_eq!(concurrency_limit(100, 32), 32);
        assert_eq!(concurrency_limit(10, 0), 1);
    }

    #[tokio::test]
    async fn publishes_up_and_measurements() {
        let connector = Arc::new(FakeConnector::new());
        let sink = Arc::new(RecordingSink::default());
        let registry = registry(&connector, &["r1", "r2"], &["8.8.8.8", "1.1.1.1"]);

        let report = Poller::new(Arc::clone(&sink), 32)
            .run_cycle(&registry.snapshot())
            .await;

        assert_eq!(report.up, vec!["r1", "r2"]);
        assert_eq!(sink.up("r1"), Some(true));
        let m = sink.measurement("r2", "1.1.1.1").unwrap();
        assert_eq!(m.average_latency_ms, 10.0);
        assert_eq!(m.loss_percent, 0.0);
    }

    #[tokio::test]
    async fn unreachable_device_is_down_without_series() {
        let connector = Arc::new(FakeConnector::new());
        connector.fail_connect("r2", u32::MAX);
        let sink = Arc::new(RecordingSink::default());
        let registry = registry(&connector, &["r1", "r2", "r3"], &["8.8.8.8"]);

        let report = Poller::new(Arc::clone(&sink), 32)
            .run_cycle(&registry.snapshot())
            .await;

        assert_eq!(report.up, vec!["r1", "r3"]);
        assert_eq!(report.down, vec!["r2"]);
        assert_eq!(sink.up("r2"), Some(false));
        assert!(sink.targets_of("r2").is_empty());
        assert_eq!(sink.up("r3"), Some(true));
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_the_cycle() {
        let connector = Arc::new(FakeConnector::new());
        connector.script("r2", "8.8.8.8", [Outcome::Panic]);
        let sink = Arc::new(RecordingSink::default());
        let registry = registry(&connector, &["r1", "r2", "r3"], &["8.8.8.8"]);

        let report = Poller::new(Arc::clone(&sink), 32)
            .run_cycle(&registry.snapshot())
            .await;

        assert_eq!(report.up, vec!["r1", "r3"]);
        assert_eq!(report.failed, vec!["r2"]);
        assert_eq!(report.total(), 3);
        assert!(sink.measurement("r1", "8.8.8.8").unwrap().reachable);
        assert_eq!(sink.up("r2"), Some(false));

        // the device stays usable on the next cycle
        let report = Poller::new(Arc::clone(&sink), 32)
            .run_cycle(&registry.snapshot())
            .await;
        assert_eq!(report.up, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn failed_target_is_published_as_failure() {
        let connector = Arc::new(FakeConnector::new());
        connector.script("r1", "b", [Outcome::Reset, Outcome::Reset]);
        let sink = Arc::new(RecordingSink::default());
        let registry = registry(&connector, &["r1"], &["a", "b", "c"]);

        let report = Poller::new(Arc::clone(&sink), 32)
            .run_cycle(&registry.snapshot())
            .await;

        assert_eq!(report.up, vec!["r1"]);
        assert_eq!(sink.measurement("r1", "b"), Some(Measurement::FAILED));
        assert!(sink.measurement("r1", "a").unwrap().reachable);
        assert!(sink.measurement("r1", "c").unwrap().reachable);
    }

    #[tokio::test(start_paused = true)]
    async fn parallelism_is_capped() {
        let connector = Arc::new(FakeConnector::new());
        let names: Vec<String> = (0..40).map(|i| format!("r{i:02}")).collect();
        for name in &names {
            connector.script(name, "8.8.8.8", [Outcome::Slow(Duration::from_secs(1))]);
        }
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let sink = Arc::new(RecordingSink::default());
        let registry = registry(&connector, &names, &["8.8.8.8"]);

        let report = Poller::new(sink, 32).run_cycle(&registry.snapshot()).await;

        assert_eq!(report.up.len(), 40);
        assert_eq!(connector.max_in_flight(), 32);
    }

    #[tokio::test]
    async fn empty_registry_completes() {
        let connector = Arc::new(FakeConnector::new());
        let sink = Arc::new(RecordingSink::default());
        let registry = registry(&connector, &[], &["8.8.8.8"]);

        let report = Poller::new(sink, 32).run_cycle(&registry.snapshot()).await;

        assert_eq!(report, CycleReport::default());
    }
}
