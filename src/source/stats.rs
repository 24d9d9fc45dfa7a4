// Convert raw Docker stats API responses into Snapshot.

use crate::models::{
    BlkioEntry, BlkioStats, CpuStats, CpuUsage, InterfaceStats, MemoryStats, PidsStats, Snapshot,
};
use bollard::models::{ContainerCpuStats, ContainerStatsResponse};
use chrono::Utc;

fn cpu_stats(s: Option<&ContainerCpuStats>) -> CpuStats {
    let Some(s) = s else {
        return CpuStats::default();
    };
    let usage = s
        .cpu_usage
        .as_ref()
        .map(|u| CpuUsage {
            total_usage: u.total_usage.unwrap_or(0),
            percpu_usage: u.percpu_usage.clone().unwrap_or_default(),
            usage_in_kernelmode: u.usage_in_kernelmode.unwrap_or(0),
            usage_in_usermode: u.usage_in_usermode.unwrap_or(0),
        })
        .unwrap_or_default();
    CpuStats {
        cpu_usage: usage,
        system_usage: s.system_cpu_usage.unwrap_or(0),
        online_cpus: s.online_cpus.unwrap_or(0),
    }
}

/// Build a Snapshot from one decoded stats record. Missing sections default to zero.
/// `running_state` and `labels` are left for the monitor to fill.
pub(crate) fn snapshot_from_response(s: &ContainerStatsResponse, id: &str) -> Snapshot {
    let memory_stats = s
        .memory_stats
        .as_ref()
        .map(|m| MemoryStats {
            usage: m.usage.unwrap_or(0),
            limit: m.limit.unwrap_or(0),
            max_usage: m.max_usage.unwrap_or(0),
        })
        .unwrap_or_default();

    let blkio_stats = BlkioStats {
        io_service_bytes_recursive: s
            .blkio_stats
            .as_ref()
            .and_then(|b| b.io_service_bytes_recursive.as_ref())
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| BlkioEntry {
                        major: e.major.unwrap_or(0),
                        minor: e.minor.unwrap_or(0),
                        op: e.op.clone().unwrap_or_default(),
                        value: e.value.unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    };

    let pids_stats = s
        .pids_stats
        .as_ref()
        .map(|p| PidsStats {
            current: p.current.unwrap_or(0),
            limit: p.limit.unwrap_or(0),
        })
        .unwrap_or_default();

    let networks = s
        .networks
        .as_ref()
        .map(|n| {
            n.iter()
                .map(|(iface, v)| {
                    (
                        iface.clone(),
                        InterfaceStats {
                            rx_bytes: v.rx_bytes.unwrap_or(0),
                            tx_bytes: v.tx_bytes.unwrap_or(0),
                            rx_packets: v.rx_packets.unwrap_or(0),
                            tx_packets: v.tx_packets.unwrap_or(0),
                            rx_errors: v.rx_errors.unwrap_or(0),
                            tx_errors: v.tx_errors.unwrap_or(0),
                            rx_dropped: v.rx_dropped.unwrap_or(0),
                            tx_dropped: v.tx_dropped.unwrap_or(0),
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let mut snapshot = Snapshot::new(id);
    snapshot.name = s.name.clone().unwrap_or_default();
    snapshot.cpu_stats = cpu_stats(s.cpu_stats.as_ref());
    snapshot.precpu_stats = cpu_stats(s.precpu_stats.as_ref());
    snapshot.memory_stats = memory_stats;
    snapshot.blkio_stats = blkio_stats;
    snapshot.pids_stats = pids_stats;
    snapshot.networks = networks;
    snapshot.read = Utc::now();
    snapshot
}
