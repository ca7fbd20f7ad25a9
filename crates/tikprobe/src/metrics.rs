// ── Prometheus metrics sink ──
//
// Gauges live on a private registry so the scrape output holds exactly
// the exporter's series.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use tikprobe_core::{Measurement, MetricsSink};

const DEVICE_LABEL: &str = "routerboard_name";
const TARGET_LABEL: &str = "target";

pub struct PrometheusSink {
    registry: Registry,
    router_up: GaugeVec,
    rtt_avg: GaugeVec,
    packet_loss: GaugeVec,
    status: GaugeVec,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let router_up = register(
            &registry,
            "mikrotik_router_up",
            "Router API reachable in the last cycle (1 = up, 0 = down)",
            &[DEVICE_LABEL],
        )?;
        let rtt_avg = register(
            &registry,
            "mikrotik_ping_rtt_avg",
            "Average ping round-trip time in milliseconds",
            &[DEVICE_LABEL, TARGET_LABEL],
        )?;
        let packet_loss = register(
            &registry,
            "mikrotik_ping_packet_loss",
            "Ping packet loss in percent",
            &[DEVICE_LABEL, TARGET_LABEL],
        )?;
        let status = register(
            &registry,
            "mikrotik_ping_status",
            "Target answered at least one ping (1 = reachable, 0 = unreachable)",
            &[DEVICE_LABEL, TARGET_LABEL],
        )?;

        Ok(Self {
            registry,
            router_up,
            rtt_avg,
            packet_loss,
            status,
        })
    }

    /// Text exposition of every series.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn register(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl MetricsSink for PrometheusSink {
    fn set_device_up(&self, device: &str, up: bool) {
        self.router_up
            .with_label_values(&[device])
            .set(if up { 1.0 } else { 0.0 });
    }

    fn record_measurement(&self, device: &str, target: &str, measurement: &Measurement) {
        let labels = [device, target];
        self.rtt_avg
            .with_label_values(&labels)
            .set(measurement.average_latency_ms);
        self.packet_loss
            .with_label_values(&labels)
            .set(measurement.loss_percent);
        self.status
            .with_label_values(&labels)
            .set(measurement.status_value());
    }
}
