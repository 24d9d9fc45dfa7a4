// Registry of active monitors keyed by container id.
//
// Lock discipline: one RwLock guards the whole map. Every operation takes it
// once and never across an await. Only `remove_stopped` looks into a monitor
// while holding it (its state, nothing else), so monitor callbacks may
// re-enter the registry from their own task.

use crate::error::MonitorError;
use crate::monitor::{Monitor, MonitorState};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

pub type MonitorHandle = Arc<Monitor>;

#[derive(Default)]
pub struct MonitorRegistry {
    monitors: RwLock<HashMap<String, MonitorHandle>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, MonitorHandle>> {
        self.monitors.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, MonitorHandle>> {
        self.monitors.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `handle` under `id`. An existing entry wins.
    pub fn put(&self, id: &str, handle: MonitorHandle) -> Result<(), MonitorError> {
        match self.write().entry(id.to_string()) {
            Entry::Occupied(_) => Err(MonitorError::AlreadyMonitored(id.to_string())),
            Entry::Vacant(e) => {
                e.insert(handle);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<MonitorHandle> {
        self.read().get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Remove and return the entry for `id`, if any.
    pub fn del(&self, id: &str) -> Option<MonitorHandle> {
        self.write().remove(id)
    }

    /// Remove the entry for `id` only if its monitor has reached `Stopped`.
    /// Takes the monitor's state lock while holding the registry lock; monitors
    /// never take the registry lock while holding their own state lock.
    pub fn remove_stopped(&self, id: &str) -> Option<MonitorHandle> {
        let mut monitors = self.write();
        let stopped = monitors
            .get(id)
            .is_some_and(|h| h.state() == MonitorState::Stopped);
        if stopped { monitors.remove(id) } else { None }
    }

    /// Copy of the current ids.
    pub fn keys(&self) -> HashSet<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ask every registered monitor to stop. Entries are removed by each
    /// monitor's own `on_removed`; this does not wait for them.
    pub fn stop_all(&self) {
        let handles: Vec<MonitorHandle> = self.read().values().cloned().collect();
        for handle in handles {
            if let Err(e) = handle.stop() {
                warn!(container_id = %handle.id(), error = %e, "Error stopping container monitor");
            }
        }
    }
}
