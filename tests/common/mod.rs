// Shared test helpers: scripted container runtime and recording metric sink

#![allow(dead_code)]

use async_trait::async_trait;
use docker_stats_exporter::error::SourceError;
use docker_stats_exporter::models::{ContainerDetails, ContainerSummary, Snapshot};
use docker_stats_exporter::sink::MetricSink;
use docker_stats_exporter::source::{
    ContainerFilter, RuntimeSession, SnapshotSource, SnapshotStream,
};
use futures_util::StreamExt;
use futures_util::stream;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

pub type Feed = mpsc::UnboundedSender<Result<Snapshot, SourceError>>;

#[derive(Default)]
struct RuntimeState {
    live: Mutex<Vec<ContainerSummary>>,
    labels: Mutex<HashMap<String, HashMap<String, String>>>,
    statuses: Mutex<HashMap<String, String>>,
    streams: Mutex<HashMap<String, mpsc::UnboundedReceiver<Result<Snapshot, SourceError>>>>,
    inspect_failures: Mutex<HashSet<String>>,
    fail_connect: AtomicBool,
    fail_list: AtomicBool,
    connects: AtomicUsize,
    closed_sessions: AtomicUsize,
}

/// In-memory runtime. Streams without a feed stay open and silent.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<RuntimeState>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_live(&self, ids: &[&str]) {
        *self.state.live.lock().unwrap() = ids.iter().map(|id| ContainerSummary::new(*id)).collect();
    }

    pub fn set_live_named(&self, containers: &[(&str, &str)]) {
        *self.state.live.lock().unwrap() = containers
            .iter()
            .map(|(id, name)| ContainerSummary {
                id: id.to_string(),
                names: vec![name.to_string()],
            })
            .collect();
    }

    /// Sender side of the stats stream the next monitor of `id` will read.
    pub fn feed(&self, id: &str) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.streams.lock().unwrap().insert(id.to_string(), rx);
        tx
    }

    pub fn set_labels(&self, id: &str, labels: &[(&str, &str)]) {
        self.state.labels.lock().unwrap().insert(
            id.to_string(),
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn set_status(&self, id: &str, status: &str) {
        self.state
            .statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), status.to_string());
    }

    pub fn fail_inspect(&self, id: &str) {
        self.state
            .inspect_failures
            .lock()
            .unwrap()
            .insert(id.to_string());
    }

    pub fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.state.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn closed_sessions(&self) -> usize {
        self.state.closed_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn list_containers(
        &self,
        _filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, SourceError> {
        if self.state.fail_list.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("list failed".into()));
        }
        Ok(self.state.live.lock().unwrap().clone())
    }

    async fn connect(&self) -> Result<Arc<dyn RuntimeSession>, SourceError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("connection refused".into()));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeSession {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeSession {
    state: Arc<RuntimeState>,
    closed: AtomicBool,
}

#[async_trait]
impl RuntimeSession for FakeSession {
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails, SourceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SourceError::SessionClosed);
        }
        if self.state.inspect_failures.lock().unwrap().contains(id) {
            return Err(SourceError::Unavailable(format!("no such container: {id}")));
        }
        Ok(ContainerDetails {
            labels: self
                .state
                .labels
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or_default(),
            status: self
                .state
                .statuses
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or_else(|| "running".to_string()),
        })
    }

    fn stats_stream(&self, id: &str) -> Result<SnapshotStream, SourceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SourceError::SessionClosed);
        }
        match self.state.streams.lock().unwrap().remove(id) {
            Some(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closed_sessions.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Sink that records every call.
#[derive(Default)]
pub struct RecordingSink {
    pub snapshots: Mutex<Vec<Snapshot>>,
    pub removed: Mutex<Vec<String>>,
    pub counts: Mutex<Vec<usize>>,
}

impl RecordingSink {
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn removed_count(&self, id: &str) -> usize {
        self.removed.lock().unwrap().iter().filter(|r| *r == id).count()
    }

    pub fn last_count(&self) -> Option<usize> {
        self.counts.lock().unwrap().last().copied()
    }
}

impl MetricSink for RecordingSink {
    fn set_container_count(&self, count: usize) {
        self.counts.lock().unwrap().push(count);
    }

    fn on_snapshot(&self, snapshot: &Snapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn on_removed(&self, id: &str) {
        self.removed.lock().unwrap().push(id.to_string());
    }
}

pub fn sample(id: &str, name: &str) -> Snapshot {
    let mut s = Snapshot::new(id);
    s.name = name.to_string();
    s.memory_stats.usage = 1024;
    s.memory_stats.limit = 2048;
    s
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
