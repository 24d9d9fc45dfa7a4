// Per-tick resource usage sample for one container

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::container::ContainerState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuUsage {
    pub total_usage: u64,
    /// Per logical core usage; empty on cgroup v2 hosts.
    pub percpu_usage: Vec<u64>,
    pub usage_in_kernelmode: u64,
    pub usage_in_usermode: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuStats {
    pub cpu_usage: CpuUsage,
    pub system_usage: u64,
    pub online_cpus: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub usage: u64,
    pub limit: u64,
    pub max_usage: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlkioEntry {
    pub major: u64,
    pub minor: u64,
    pub op: String,
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlkioStats {
    pub io_service_bytes_recursive: Vec<BlkioEntry>,
}

impl BlkioStats {
    /// Sum of bytes for entries whose op matches (case-insensitive).
    pub fn bytes_for(&self, op: &str) -> u64 {
        self.io_service_bytes_recursive
            .iter()
            .filter(|e| e.op.eq_ignore_ascii_case(op))
            .map(|e| e.value)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidsStats {
    pub current: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub cpu_stats: CpuStats,
    pub precpu_stats: CpuStats,
    pub memory_stats: MemoryStats,
    pub blkio_stats: BlkioStats,
    pub pids_stats: PidsStats,
    pub networks: HashMap<String, InterfaceStats>,
    /// Lifecycle status merged in by the monitor after each read.
    pub running_state: String,
    pub read: DateTime<Utc>,
}

impl Snapshot {
    /// Empty sample for `id`, timestamped now.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            labels: HashMap::new(),
            cpu_stats: CpuStats::default(),
            precpu_stats: CpuStats::default(),
            memory_stats: MemoryStats::default(),
            blkio_stats: BlkioStats::default(),
            pids_stats: PidsStats::default(),
            networks: HashMap::new(),
            running_state: String::new(),
            read: Utc::now(),
        }
    }

    /// CPU usage percentage between the previous and current reading.
    /// Scaled by the per-core count when Docker reports per-core usage.
    pub fn cpu_percent(&self) -> f64 {
        let cpu_delta = self.cpu_stats.cpu_usage.total_usage as f64
            - self.precpu_stats.cpu_usage.total_usage as f64;
        let system_delta = self.cpu_stats.system_usage as f64 - self.precpu_stats.system_usage as f64;

        if system_delta <= 0.0 || cpu_delta <= 0.0 {
            return 0.0;
        }
        let mut percent = (cpu_delta / system_delta) * 100.0;
        let cores = self.cpu_stats.cpu_usage.percpu_usage.len();
        if cores > 0 {
            percent *= cores as f64;
        }
        percent
    }

    pub fn state(&self) -> ContainerState {
        ContainerState::from_docker(&self.running_state)
    }

    /// Total (rx, tx) bytes over all interfaces.
    pub fn network_totals(&self) -> (u64, u64) {
        self.networks
            .values()
            .fold((0, 0), |(rx, tx), n| (rx + n.rx_bytes, tx + n.tx_bytes))
    }

    /// Display name without Docker's leading slash.
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }
}
