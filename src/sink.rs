// Metric sink: turns snapshots and removals into Prometheus gauges

use crate::models::{Snapshot, short_id};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

const NAMESPACE: &str = "docker_stats";
const SUBSYSTEM: &str = "container";

/// Consumer of monitor events. Called concurrently from every monitor task.
pub trait MetricSink: Send + Sync {
    /// Live container count after each discovery pass.
    fn set_container_count(&self, count: usize);

    fn on_snapshot(&self, snapshot: &Snapshot);

    /// Release all per-container state for `id`.
    fn on_removed(&self, id: &str);
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
pub fn normalize_label_name(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

struct ContainerGauges {
    memory_usage: GaugeVec,
    memory_limit: GaugeVec,
    cpu_total: GaugeVec,
    cpu_percent: GaugeVec,
    running_state: GaugeVec,
    network_rx_bytes: GaugeVec,
    network_tx_bytes: GaugeVec,
    blkio_read_bytes: GaugeVec,
    blkio_write_bytes: GaugeVec,
    pids_current: GaugeVec,
}

impl ContainerGauges {
    fn new(label_names: &[&str]) -> prometheus::Result<Self> {
        let gauge = |name: &str, help: &str| {
            GaugeVec::new(
                Opts::new(name, help)
                    .namespace(NAMESPACE)
                    .subsystem(SUBSYSTEM),
                label_names,
            )
        };
        Ok(Self {
            memory_usage: gauge("memory_usage", "Actual value of memory usage by container")?,
            memory_limit: gauge("memory_limit", "The limit of memory container can use")?,
            cpu_total: gauge("cpu_total", "CPU Usage Total")?,
            cpu_percent: gauge("cpu_pcnt", "CPU Usage percentage")?,
            running_state: gauge(
                "running_stats",
                "Numeric representation of container state: 0=created, 1=running, 2=paused, 3=restarting, 4=removing, 5=exited, 6=dead, -1=unknown",
            )?,
            network_rx_bytes: gauge("network_rx_bytes", "Bytes received over all interfaces")?,
            network_tx_bytes: gauge("network_tx_bytes", "Bytes sent over all interfaces")?,
            blkio_read_bytes: gauge("blkio_read_bytes", "Bytes read from block devices")?,
            blkio_write_bytes: gauge("blkio_write_bytes", "Bytes written to block devices")?,
            pids_current: gauge("pids_current", "Number of processes in the container")?,
        })
    }

    fn all(&self) -> [&GaugeVec; 10] {
        [
            &self.memory_usage,
            &self.memory_limit,
            &self.cpu_total,
            &self.cpu_percent,
            &self.running_state,
            &self.network_rx_bytes,
            &self.network_tx_bytes,
            &self.blkio_read_bytes,
            &self.blkio_write_bytes,
            &self.pids_current,
        ]
    }
}

pub struct PrometheusSink {
    registry: Registry,
    container_count: GaugeVec,
    gauges: ContainerGauges,
    /// Container label keys exported after `id` and `name`, as configured.
    scrape_labels: Vec<String>,
    /// Label values last written per container id.
    series: Mutex<HashMap<String, Vec<String>>>,
}

impl PrometheusSink {
    pub fn new(scrape_labels: Vec<String>) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let container_count = GaugeVec::new(
            Opts::new("count", "Count of running containers")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM),
            &[],
        )?;
        registry.register(Box::new(container_count.clone()))?;

        let mut label_names = vec!["id".to_string(), "name".to_string()];
        label_names.extend(scrape_labels.iter().map(|l| normalize_label_name(l)));
        let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();

        let gauges = ContainerGauges::new(&label_refs)?;
        for gauge in gauges.all() {
            registry.register(Box::new(gauge.clone()))?;
        }

        Ok(Self {
            registry,
            container_count,
            gauges,
            scrape_labels,
            series: Mutex::new(HashMap::new()),
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn label_values(&self, snapshot: &Snapshot) -> Vec<String> {
        let mut values = Vec::with_capacity(2 + self.scrape_labels.len());
        values.push(short_id(&snapshot.id).to_string());
        values.push(snapshot.display_name().to_string());
        for label in &self.scrape_labels {
            values.push(snapshot.labels.get(label).cloned().unwrap_or_default());
        }
        values
    }
}

impl MetricSink for PrometheusSink {
    fn set_container_count(&self, count: usize) {
        self.container_count
            .with_label_values(&[] as &[&str])
            .set(count as f64);
    }

    fn on_snapshot(&self, snapshot: &Snapshot) {
        let values = self.label_values(snapshot);
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let g = &self.gauges;
        let (rx, tx) = snapshot.network_totals();

        g.memory_usage
            .with_label_values(&refs)
            .set(snapshot.memory_stats.usage as f64);
        g.memory_limit
            .with_label_values(&refs)
            .set(snapshot.memory_stats.limit as f64);
        g.cpu_total
            .with_label_values(&refs)
            .set(snapshot.cpu_stats.cpu_usage.total_usage as f64);
        g.cpu_percent
            .with_label_values(&refs)
            .set(snapshot.cpu_percent());
        g.running_state
            .with_label_values(&refs)
            .set(snapshot.state().metric_value());
        g.network_rx_bytes.with_label_values(&refs).set(rx as f64);
        g.network_tx_bytes.with_label_values(&refs).set(tx as f64);
        g.blkio_read_bytes
            .with_label_values(&refs)
            .set(snapshot.blkio_stats.bytes_for("read") as f64);
        g.blkio_write_bytes
            .with_label_values(&refs)
            .set(snapshot.blkio_stats.bytes_for("write") as f64);
        g.pids_current
            .with_label_values(&refs)
            .set(snapshot.pids_stats.current as f64);

        let previous = self
            .series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.id.clone(), values.clone());
        // Name or labels changed: drop the stale series.
        if let Some(previous) = previous.filter(|p| *p != values) {
            self.remove_series(&previous);
        }
    }

    fn on_removed(&self, id: &str) {
        let values = self
            .series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match values {
            Some(values) => self.remove_series(&values),
            None => warn!(
                container_id = %short_id(id),
                "No metrics recorded for container; nothing deleted"
            ),
        }
    }
}

impl PrometheusSink {
    fn remove_series(&self, values: &[String]) {
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        for gauge in self.gauges.all() {
            if let Err(e) = gauge.remove_label_values(&refs) {
                warn!(labels = ?refs, error = %e, "Metric with labels hasn't been deleted");
            }
        }
    }
}
