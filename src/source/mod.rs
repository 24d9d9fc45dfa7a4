// Container runtime collaborator: discovery, inspect and the per-container stats stream

mod docker;
mod stats;

pub use docker::{DockerSession, DockerSource};

use crate::error::SourceError;
use crate::models::{ContainerDetails, ContainerSummary, Snapshot};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::sync::Arc;

/// Ordered sequence of decoded stats records for one container.
/// `None` from the stream means the runtime closed it.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, SourceError>>;

/// Discovery filter. Each entry is a Docker `label` filter (`key` or `key=value`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    pub labels: Vec<String>,
}

impl ContainerFilter {
    pub fn with_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Running containers matching `filter`.
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, SourceError>;

    /// Acquire a session owned by a single monitor.
    async fn connect(&self) -> Result<Arc<dyn RuntimeSession>, SourceError>;
}

/// Runtime session held by one monitor between `start` and termination.
#[async_trait]
pub trait RuntimeSession: Send + Sync {
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, SourceError>;

    fn stats_stream(&self, id: &str) -> Result<SnapshotStream, SourceError>;

    /// Release the session. Idempotent; later calls fail with `SessionClosed`.
    fn close(&self);
}
