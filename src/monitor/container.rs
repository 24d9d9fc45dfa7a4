// Per-container monitor: Idle -> Initializing -> Streaming -> Stopped.
// The read loop runs on its own task. Stop is cooperative: the flag is observed
// at the top of each tick, so stop latency is up to one read interval. Releasing
// the session also abandons a pull that is waiting on the stream.

use super::{MonitorCallbacks, MonitorOption, MonitorState};
use crate::error::{MonitorError, SourceError};
use crate::models::{Snapshot, short_id};
use crate::source::{RuntimeSession, SnapshotSource, SnapshotStream};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::Notify;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};

/// Default pacing of the read loop.
pub const DEFAULT_READ_INTERVAL: Duration = Duration::from_secs(1);

pub struct ContainerMonitor {
    shared: Arc<Shared>,
}

struct Shared {
    id: String,
    source: Arc<dyn SnapshotSource>,
    callbacks: MonitorCallbacks,
    read_interval: Duration,
    name: RwLock<String>,
    labels: RwLock<HashMap<String, String>>,
    state: Mutex<MonitorState>,
    stop: AtomicBool,
    /// Wakes a read loop blocked on the stream after `stop`.
    stop_wake: Notify,
    session: Mutex<Option<Arc<dyn RuntimeSession>>>,
}

impl ContainerMonitor {
    pub fn new(
        id: impl Into<String>,
        source: Arc<dyn SnapshotSource>,
        callbacks: MonitorCallbacks,
        read_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: id.into(),
                source,
                callbacks,
                read_interval,
                name: RwLock::new(String::new()),
                labels: RwLock::new(HashMap::new()),
                state: Mutex::new(MonitorState::Idle),
                stop: AtomicBool::new(false),
                stop_wake: Notify::new(),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn state(&self) -> MonitorState {
        *self.shared.lock_state()
    }

    /// Acquire a runtime session, fetch labels and open the stats stream, then
    /// spawn the read loop. Returns once the loop is running.
    ///
    /// On failure the session is released, the monitor goes back to `Idle`
    /// and `on_removed` will never fire for this attempt.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let shared = &self.shared;
        if shared.id.is_empty() {
            return Err(MonitorError::Configuration);
        }
        {
            let mut state = shared.lock_state();
            if *state != MonitorState::Idle {
                return Err(MonitorError::AlreadyStarted(shared.id.clone()));
            }
            *state = MonitorState::Initializing;
            shared.stop.store(false, Ordering::Release);
        }

        let stream = match shared.init().await {
            Ok(stream) => stream,
            Err(e) => {
                *shared.lock_state() = MonitorState::Idle;
                return Err(e);
            }
        };

        *shared.lock_state() = MonitorState::Streaming;
        tokio::spawn(read_loop(Arc::clone(shared), stream));
        Ok(())
    }

    /// Request the read loop to exit and release the session. Idempotent.
    /// `on_removed` fires later from the loop's own task.
    pub fn stop(&self) -> Result<(), MonitorError> {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.release_session();
        self.shared.stop_wake.notify_one();
        Ok(())
    }

    pub fn get_option(&self, name: &str) -> Option<MonitorOption> {
        match name {
            MonitorOption::NAME => Some(MonitorOption::Name(self.shared.name())),
            MonitorOption::LABELS => Some(MonitorOption::Labels(
                self.shared
                    .labels
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            )),
            _ => None,
        }
    }

    /// Seed the display name before start. Labels come from the runtime only.
    pub fn set_option(&self, option: MonitorOption) -> Result<(), MonitorError> {
        match option {
            MonitorOption::Name(name) => {
                if self.state() != MonitorState::Idle {
                    return Err(MonitorError::AlreadyStarted(self.shared.id.clone()));
                }
                *self
                    .shared
                    .name
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = name;
                Ok(())
            }
            read_only @ MonitorOption::Labels(_) => {
                Err(MonitorError::ReadOnlyOption(read_only.key()))
            }
        }
    }
}

impl Shared {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_session(&self) -> Option<Arc<dyn RuntimeSession>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn release_session(&self) {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.close();
        }
    }

    async fn init(&self) -> Result<SnapshotStream, MonitorError> {
        let session = self
            .source
            .connect()
            .await
            .map_err(|source| MonitorError::Connection {
                id: self.id.clone(),
                source,
            })?;

        let details = match session.inspect_container(&self.id).await {
            Ok(details) => details,
            Err(source) => {
                session.close();
                return Err(MonitorError::Inspect {
                    id: self.id.clone(),
                    source,
                });
            }
        };
        let stream = match session.stats_stream(&self.id) {
            Ok(stream) => stream,
            Err(source) => {
                session.close();
                return Err(MonitorError::Connection {
                    id: self.id.clone(),
                    source,
                });
            }
        };

        *self.labels.write().unwrap_or_else(PoisonError::into_inner) = details.labels;
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(stream)
    }

    /// Runs once per monitor that reached Streaming.
    fn terminate(&self) {
        self.release_session();
        let was_streaming = {
            let mut state = self.lock_state();
            let prev = *state;
            *state = MonitorState::Stopped;
            prev == MonitorState::Streaming
        };
        if !was_streaming {
            return;
        }
        debug!(container_id = %short_id(&self.id), "Monitor terminated");
        if let Some(on_removed) = &self.callbacks.on_removed {
            on_removed(&self.id);
        }
    }
}

enum Pull {
    Record(Snapshot),
    Failed(SourceError),
    Closed,
    Stopped,
}

/// Pull one record, giving up only once a stop has been requested.
async fn next_record(shared: &Shared, stream: &mut SnapshotStream) -> Pull {
    loop {
        tokio::select! {
            next = stream.next() => {
                return match next {
                    Some(Ok(snapshot)) => Pull::Record(snapshot),
                    Some(Err(e)) => Pull::Failed(e),
                    None => Pull::Closed,
                };
            }
            _ = shared.stop_wake.notified() => {
                if shared.stop.load(Ordering::Acquire) {
                    return Pull::Stopped;
                }
            }
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut stream: SnapshotStream) {
    let id = short_id(&shared.id).to_string();
    let mut tick = interval(shared.read_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately; the first read happens one interval after start.
    tick.tick().await;

    loop {
        tick.tick().await;
        if shared.stop.load(Ordering::Acquire) {
            debug!(container_id = %id, "Stop requested");
            break;
        }

        let mut snapshot = match next_record(&shared, &mut stream).await {
            Pull::Record(snapshot) => snapshot,
            Pull::Failed(source) => {
                let e = MonitorError::StreamDecode {
                    id: shared.id.clone(),
                    source,
                };
                warn!(container_id = %id, error = %e, operation = "decode_stats", "Error reading stats stream");
                break;
            }
            Pull::Closed => {
                debug!(container_id = %id, "Stats stream closed");
                break;
            }
            Pull::Stopped => {
                debug!(container_id = %id, "Stop requested during read");
                break;
            }
        };

        let Some(session) = shared.current_session() else {
            debug!(container_id = %id, "Session released during read");
            break;
        };
        match session.inspect_container(&shared.id).await {
            Ok(details) => snapshot.running_state = details.status,
            Err(e) if shared.stop.load(Ordering::Acquire) => {
                debug!(container_id = %id, error = %e, "Inspect interrupted by stop");
                break;
            }
            Err(e) => {
                warn!(container_id = %id, error = %e, operation = "inspect_container", "Error inspecting container");
                break;
            }
        }

        {
            let mut name = shared.name.write().unwrap_or_else(PoisonError::into_inner);
            if name.is_empty() {
                name.clone_from(&snapshot.name);
            } else if snapshot.name.is_empty() {
                snapshot.name.clone_from(&name);
            }
        }
        snapshot.labels.clone_from(
            &*shared
                .labels
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        );

        trace!(container_id = %id, state = %snapshot.running_state, "Snapshot read");
        if let Some(on_snapshot) = &shared.callbacks.on_snapshot {
            on_snapshot(snapshot);
        }
    }

    shared.terminate();
    info!(container_id = %id, "Container monitor exited");
}
