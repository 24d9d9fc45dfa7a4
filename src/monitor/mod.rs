// Monitors: one long-lived task per watched resource.
//
// Callbacks run synchronously on the monitor's own task. They are invoked
// concurrently from many monitors and gate the monitor's pacing, so they must
// be cheap and must not block.

mod container;

pub use container::{ContainerMonitor, DEFAULT_READ_INTERVAL};

use crate::error::MonitorError;
use crate::models::Snapshot;
use std::collections::HashMap;
use std::sync::Arc;

pub type OnSnapshot = Arc<dyn Fn(Snapshot) + Send + Sync>;
pub type OnRemoved = Arc<dyn Fn(&str) + Send + Sync>;

/// Event hooks wired by the owner of a monitor.
#[derive(Clone, Default)]
pub struct MonitorCallbacks {
    /// Once per successfully decoded tick.
    pub on_snapshot: Option<OnSnapshot>,
    /// Exactly once, after the read loop of a started monitor has exited.
    pub on_removed: Option<OnRemoved>,
}

impl MonitorCallbacks {
    pub fn new(
        on_snapshot: impl Fn(Snapshot) + Send + Sync + 'static,
        on_removed: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_snapshot: Some(Arc::new(on_snapshot)),
            on_removed: Some(Arc::new(on_removed)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Initializing,
    Streaming,
    /// Terminal.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOption {
    Name(String),
    Labels(HashMap<String, String>),
}

impl MonitorOption {
    pub const NAME: &'static str = "name";
    pub const LABELS: &'static str = "labels";

    pub fn key(&self) -> &'static str {
        match self {
            MonitorOption::Name(_) => Self::NAME,
            MonitorOption::Labels(_) => Self::LABELS,
        }
    }
}

/// Every monitor variant the registry can hold.
pub enum Monitor {
    Container(ContainerMonitor),
}

impl Monitor {
    pub fn id(&self) -> &str {
        match self {
            Monitor::Container(m) => m.id(),
        }
    }

    pub fn state(&self) -> MonitorState {
        match self {
            Monitor::Container(m) => m.state(),
        }
    }

    pub async fn start(&self) -> Result<(), MonitorError> {
        match self {
            Monitor::Container(m) => m.start().await,
        }
    }

    pub fn stop(&self) -> Result<(), MonitorError> {
        match self {
            Monitor::Container(m) => m.stop(),
        }
    }

    pub fn get_option(&self, name: &str) -> Option<MonitorOption> {
        match self {
            Monitor::Container(m) => m.get_option(name),
        }
    }

    pub fn set_option(&self, option: MonitorOption) -> Result<(), MonitorError> {
        match self {
            Monitor::Container(m) => m.set_option(option),
        }
    }

    /// Current display name, empty while unknown.
    pub fn name(&self) -> String {
        match self.get_option(MonitorOption::NAME) {
            Some(MonitorOption::Name(name)) => name,
            _ => String::new(),
        }
    }
}

impl From<ContainerMonitor> for Monitor {
    fn from(m: ContainerMonitor) -> Self {
        Monitor::Container(m)
    }
}
