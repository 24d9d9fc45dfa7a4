// Discovery loop: keeps the monitor registry in step with the live container set.
// Monitors for vanished containers are only asked to stop here; their registry
// entry goes away when the monitor reports its own termination.

use crate::config::AppConfig;
use crate::error::SourceError;
use crate::models::short_id;
use crate::monitor::{ContainerMonitor, Monitor, MonitorCallbacks, MonitorOption};
use crate::registry::MonitorRegistry;
use crate::sink::MetricSink;
use crate::source::{ContainerFilter, SnapshotSource};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub filter: ContainerFilter,
    /// Minimum time between two discovery passes.
    pub refresh_interval: Duration,
    /// Wake-up period of the loop; bounds shutdown latency.
    pub refresh_tick: Duration,
    /// Read loop pacing handed to every new monitor.
    pub read_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            filter: ContainerFilter::default(),
            refresh_interval: Duration::from_secs(2),
            refresh_tick: Duration::from_secs(1),
            read_interval: crate::monitor::DEFAULT_READ_INTERVAL,
        }
    }
}

impl From<&AppConfig> for ReconcilerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            filter: ContainerFilter::with_labels(config.labels.filter.clone()),
            refresh_interval: Duration::from_millis(config.monitoring.refresh_interval_ms),
            refresh_tick: Duration::from_millis(config.monitoring.refresh_tick_ms),
            read_interval: Duration::from_millis(config.monitoring.read_interval_ms),
        }
    }
}

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub live: usize,
    pub started: Vec<String>,
    pub failed: Vec<String>,
    pub stop_requested: Vec<String>,
}

pub struct Reconciler {
    source: Arc<dyn SnapshotSource>,
    registry: Arc<MonitorRegistry>,
    sink: Arc<dyn MetricSink>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        registry: Arc<MonitorRegistry>,
        sink: Arc<dyn MetricSink>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            source,
            registry,
            sink,
            config,
        }
    }

    fn callbacks(&self) -> MonitorCallbacks {
        let sink = Arc::clone(&self.sink);
        let removal_sink = Arc::clone(&self.sink);
        let registry = Arc::clone(&self.registry);
        MonitorCallbacks::new(
            move |snapshot| sink.on_snapshot(&snapshot),
            move |id| {
                match registry.remove_stopped(id) {
                    Some(handle) => info!(
                        container_id = %short_id(id),
                        name = %handle.name(),
                        "Stop container monitoring"
                    ),
                    None if registry.exists(id) => {
                        // The registered monitor is someone else's; its series stay.
                        debug!(container_id = %short_id(id), "Rejected duplicate monitor exited");
                        return;
                    }
                    None => debug!(container_id = %short_id(id), "Container with ID is not monitored"),
                }
                removal_sink.on_removed(id);
            },
        )
    }

    /// One discovery pass. Fails only when the live container set cannot be listed;
    /// per-container failures are logged and retried on the next pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, SourceError> {
        let containers = self.source.list_containers(&self.config.filter).await?;
        self.sink.set_container_count(containers.len());

        let mut report = CycleReport {
            live: containers.len(),
            ..Default::default()
        };

        for container in &containers {
            if self.registry.exists(&container.id) {
                continue;
            }

            let monitor = ContainerMonitor::new(
                container.id.clone(),
                Arc::clone(&self.source),
                self.callbacks(),
                self.config.read_interval,
            );
            if let Some(name) = container.primary_name()
                && let Err(e) = monitor.set_option(MonitorOption::Name(name.to_string()))
            {
                debug!(container_id = %short_id(&container.id), error = %e, "Could not seed monitor name");
            }
            let handle = Arc::new(Monitor::from(monitor));

            if let Err(e) = handle.start().await {
                warn!(container_id = %short_id(&container.id), error = %e, "Error executing container monitor");
                report.failed.push(container.id.clone());
                continue;
            }
            if let Err(e) = self.registry.put(&container.id, Arc::clone(&handle)) {
                warn!(container_id = %short_id(&container.id), error = %e, "Error adding monitor to registry");
                if let Err(e) = handle.stop() {
                    warn!(container_id = %short_id(&container.id), error = %e, "Error stopping container monitor");
                }
                continue;
            }
            // The loop may already have ended before the entry existed.
            self.registry.remove_stopped(&container.id);

            info!(container_id = %short_id(&container.id), "Start monitoring for container");
            report.started.push(container.id.clone());
        }

        let live: HashSet<&str> = containers.iter().map(|c| c.id.as_str()).collect();
        for id in self.registry.keys() {
            if live.contains(id.as_str()) {
                continue;
            }
            if let Some(handle) = self.registry.get(&id) {
                debug!(container_id = %short_id(&id), "Container vanished; requesting stop");
                if let Err(e) = handle.stop() {
                    warn!(container_id = %short_id(&id), error = %e, "Error stopping container monitor");
                }
                report.stop_requested.push(id);
            }
        }

        Ok(report)
    }

    /// Run passes until `shutdown_rx` fires. Monitors are left running; the
    /// shutdown path stops them through the registry.
    pub fn spawn(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.config.refresh_tick);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_cycle: Option<Instant> = None;

            loop {
                tokio::select! {
                    now = tick.tick() => {
                        // Compare scheduled tick deadlines, not wake-up times.
                        if last_cycle.is_some_and(|t| now.duration_since(t) < self.config.refresh_interval) {
                            continue;
                        }
                        last_cycle = Some(now);
                        match self.run_cycle().await {
                            Ok(report) => debug!(
                                live = report.live,
                                started = report.started.len(),
                                failed = report.failed.len(),
                                stop_requested = report.stop_requested.len(),
                                "Reconciliation cycle"
                            ),
                            Err(e) => warn!(error = %e, operation = "list_containers", "Error getting container list"),
                        }
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Reconciler shutting down");
                        break;
                    }
                }
            }
        })
    }
}
