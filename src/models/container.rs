// Docker container models

use std::collections::HashMap;

/// Length of the short container id used in logs and metric labels.
pub const SHORT_ID_LEN: usize = 12;

/// First 12 characters of a container id (the whole id when shorter).
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Docker container lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    /// Parse from Docker API state string (e.g. "running", "exited").
    pub fn from_docker(s: &str) -> Self {
        match s {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    /// Numeric gauge value: 0=created, 1=running, 2=paused, 3=restarting,
    /// 4=removing, 5=exited, 6=dead, -1=unknown.
    pub fn metric_value(self) -> f64 {
        match self {
            ContainerState::Created => 0.0,
            ContainerState::Running => 1.0,
            ContainerState::Paused => 2.0,
            ContainerState::Restarting => 3.0,
            ContainerState::Removing => 4.0,
            ContainerState::Exited => 5.0,
            ContainerState::Dead => 6.0,
            ContainerState::Unknown => -1.0,
        }
    }
}

/// One entry of the live container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// Docker reports names with a leading slash, e.g. "/web".
    pub names: Vec<String>,
}

impl ContainerSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            names: Vec::new(),
        }
    }

    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

/// Result of an on-demand container inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub labels: HashMap<String, String>,
    /// Lifecycle status string as reported by the runtime.
    pub status: String,
}
