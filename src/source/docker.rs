// Docker collaborator via bollard

use super::{ContainerFilter, RuntimeSession, SnapshotSource, SnapshotStream, stats};
use crate::error::SourceError;
use crate::models::{ContainerDetails, ContainerSummary};
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions, StatsOptions};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

pub struct DockerSource {
    docker: Docker,
}

impl DockerSource {
    pub fn connect() -> Result<Self, SourceError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub async fn log_server_version(&self) {
        match self.docker.version().await {
            Ok(v) => info!(
                server_version = v.version.as_deref().unwrap_or("unknown"),
                api_version = v.api_version.as_deref().unwrap_or("unknown"),
                "Docker server"
            ),
            Err(e) => warn!(error = %e, operation = "version", "Error getting server version"),
        }
    }
}

#[async_trait]
impl SnapshotSource for DockerSource {
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, SourceError> {
        let mut filters = HashMap::new();
        if !filter.labels.is_empty() {
            filters.insert("label".to_string(), filter.labels.clone());
        }
        let options = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(ContainerSummary {
                    id,
                    names: c.names.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn connect(&self) -> Result<Arc<dyn RuntimeSession>, SourceError> {
        self.docker.ping().await?;
        Ok(Arc::new(DockerSession::new(self.docker.clone())))
    }
}

/// Client handle owned by one monitor. `close` drops the handle.
pub struct DockerSession {
    docker: Mutex<Option<Docker>>,
}

impl DockerSession {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker: Mutex::new(Some(docker)),
        }
    }

    fn client(&self) -> Result<Docker, SourceError> {
        self.docker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(SourceError::SessionClosed)
    }
}

#[async_trait]
impl RuntimeSession for DockerSession {
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, SourceError> {
        let docker = self.client()?;
        let info = docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        let labels = info
            .config
            .and_then(|c| c.labels)
            .unwrap_or_default();
        let status = info
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_default();
        Ok(ContainerDetails { labels, status })
    }

    fn stats_stream(&self, id: &str) -> Result<SnapshotStream, SourceError> {
        let docker = self.client()?;
        let options = StatsOptions {
            stream: true,
            ..Default::default()
        };
        let owned_id = id.to_string();
        let stream = docker.stats(id, Some(options)).map(move |result| {
            result
                .map(|s| stats::snapshot_from_response(&s, &owned_id))
                .map_err(SourceError::from)
        });
        Ok(stream.boxed())
    }

    fn close(&self) {
        self.docker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
