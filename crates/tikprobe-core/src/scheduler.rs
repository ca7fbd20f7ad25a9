// ── Exporter run loop ──
//
// One control task: poll every device, reload configuration when the
// reload interval has elapsed, then sleep whatever is left of the poll
// interval. Both cadences share this single clock check.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ExporterConfig, Schedule};
use crate::connector::Connector;
use crate::metrics::MetricsSink;
use crate::poller::{CycleReport, Poller};
use crate::reconcile::{ConfigSource, Reconciler, ReloadSummary};
use crate::store::DeviceRegistry;

/// Time to wait before the next cycle. Zero once a cycle overruns.
pub fn cycle_delay(cadence: Duration, elapsed: Duration) -> Duration {
    cadence.saturating_sub(elapsed)
}

/// Owns the registry and drives polling and reconciliation.
pub struct Exporter<C: Connector, M: MetricsSink, S: ConfigSource> {
    registry: Arc<DeviceRegistry<C>>,
    poller: Poller<M>,
    reconciler: Reconciler<C, M>,
    source: S,
    schedule: Schedule,
    last_reload: Instant,
}

impl<C: Connector, M: MetricsSink, S: ConfigSource> Exporter<C, M, S> {
    /// Build the exporter from an already loaded `config` and connect
    /// every configured router. Unreachable routers are kept and retried
    /// by the polling cycle.
    pub async fn start(
        config: &ExporterConfig,
        source: S,
        connector: Arc<C>,
        sink: Arc<M>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let mut reconciler = Reconciler::new(
            Arc::clone(&registry),
            connector,
            Arc::clone(&sink),
            config.credentials.clone(),
        );
        let bootstrap = reconciler.apply(config).await;

        for descriptor in config.descriptors() {
            info!(
                device = %descriptor.name,
                address = %descriptor.endpoint(),
                "monitoring router"
            );
        }
        if config.targets.is_empty() {
            warn!("no ping targets configured; only router availability will be reported");
        } else {
            info!(targets = ?config.targets, "ping targets");
        }
        if !bootstrap.connect_failed.is_empty() {
            warn!(
                devices = ?bootstrap.connect_failed,
                "some routers are unreachable at startup; they will be retried every cycle"
            );
        }

        Self {
            registry,
            poller: Poller::new(sink, config.schedule.max_parallel),
            reconciler,
            source,
            schedule: config.schedule,
            last_reload: Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry<C>> {
        &self.registry
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Run cycles until `cancel` fires. Cancellation is observed between
    /// cycles and during the inter-cycle sleep; a running cycle finishes.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        info!(
            poll_interval_secs = self.schedule.poll_interval.as_secs(),
            reload_interval_secs = self.schedule.reload_interval.as_secs(),
            "exporter started"
        );
        while !cancel.is_cancelled() {
            let started = Instant::now();
            self.run_once().await;

            let elapsed = started.elapsed();
            let delay = cycle_delay(self.schedule.poll_interval, elapsed);
            if delay.is_zero() {
                warn!(
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "cycle took longer than the poll interval; starting the next one now"
                );
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        info!("exporter loop stopped");
    }

    /// One poll cycle followed by a reload if one is due.
    pub async fn run_once(&mut self) -> CycleReport {
        let snapshot = self.registry.snapshot();
        let report = self.poller.run_cycle(&snapshot).await;
        debug!(
            up = report.up.len(),
            down = report.down.len(),
            failed = report.failed.len(),
            "polling cycle finished"
        );

        if self.last_reload.elapsed() >= self.schedule.reload_interval {
            self.reload().await;
        }
        report
    }

    /// Reload configuration now, regardless of the reload interval.
    pub async fn reload(&mut self) -> Option<ReloadSummary> {
        let summary = self.reconciler.reload(&self.source).await;
        self.last_reload = Instant::now();
        summary
    }

    /// Close every device session.
    pub async fn shutdown(self) {
        let devices = self.registry.drain();
        let count = devices.len();
        join_all(devices.iter().map(|device| device.close())).await;
        info!(devices = count, "closed all device sessions");
    }
}
