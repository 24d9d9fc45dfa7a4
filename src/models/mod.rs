// Domain models: container listing/inspect results and stats snapshots

mod container;
mod snapshot;

pub use container::{
    ContainerDetails, ContainerState, ContainerSummary, SHORT_ID_LEN, short_id,
};
pub use snapshot::{
    BlkioEntry, BlkioStats, CpuStats, CpuUsage, InterfaceStats, MemoryStats, PidsStats, Snapshot,
};
