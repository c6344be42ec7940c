//! Registry access guarded by a single mutex
//!
//! [`SharedRegistry`] pairs the persisted [`Registry`] with every
//! runtime-only piece of per-watch state (task handles, in-flight manual
//! passes, compiled ignore rules, pass gates). The registry itself is
//! re-read from the store each time the lock is taken, so a mutation is
//! always load, change and save inside one critical section. Changes made
//! by another process in between are picked up rather than overwritten.
//! A save that fails leaves the change in memory only until the next
//! lock, which reloads what the store actually holds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uplink_core::domain::{Registry, WatchId};
use uplink_core::ports::IStateStore;

use crate::patterns::IgnoreRules;
use crate::SyncError;

/// Handles of a running watch task
#[derive(Debug)]
pub struct WatchRuntime {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<()>,
}

/// Everything behind the registry mutex
#[derive(Debug, Default)]
pub struct RegistryState {
    registry: Registry,
    loaded: bool,
    /// Scheduled tasks, keyed by watch
    pub runtimes: HashMap<WatchId, WatchRuntime>,
    /// Cancelled tasks that may still be finishing a file
    pub stopping: HashMap<WatchId, JoinHandle<()>>,
    /// Watches with a one-off pass in progress
    pub manual_passes: HashSet<WatchId>,
    /// Compiled ignore rules, kept for the process lifetime
    pub ignore_cache: HashMap<WatchId, Arc<IgnoreRules>>,
    /// Held for the whole of a pass; never removed
    pass_gates: HashMap<WatchId, Arc<Mutex<()>>>,
}

impl RegistryState {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Whether the watch has a task (running or winding down) or a one-off
    /// pass in flight
    pub fn is_busy(&self, id: &WatchId) -> bool {
        self.runtimes.contains_key(id)
            || self.manual_passes.contains(id)
            || self.stopping.get(id).is_some_and(|h| !h.is_finished())
    }

    /// Cancel the watch's task and move it to `stopping`
    ///
    /// Returns `false` if the watch had no task.
    pub fn retire(&mut self, id: &WatchId) -> bool {
        match self.runtimes.remove(id) {
            Some(runtime) => {
                runtime.cancel.cancel();
                self.stopping.insert(id.clone(), runtime.handle);
                true
            }
            None => false,
        }
    }

    /// Lock that serializes the passes of one watch
    pub fn pass_gate(&mut self, id: &WatchId) -> Arc<Mutex<()>> {
        self.pass_gates.entry(id.clone()).or_default().clone()
    }

    /// Forget tasks that have already exited
    fn prune_finished(&mut self) {
        self.runtimes.retain(|id, runtime| {
            let alive = !runtime.handle.is_finished();
            if !alive {
                debug!(watch = %id.short(), "Watch task exited on its own");
            }
            alive
        });
        self.stopping.retain(|_, handle| !handle.is_finished());
    }
}

/// The registry shared by the public API and every watch task
pub struct SharedRegistry {
    store: Arc<dyn IStateStore>,
    state: Mutex<RegistryState>,
}

/// Exclusive access to the registry, freshly loaded
pub struct RegistryGuard<'a> {
    store: &'a dyn IStateStore,
    state: MutexGuard<'a, RegistryState>,
}

impl SharedRegistry {
    pub fn new(store: Arc<dyn IStateStore>) -> Self {
        Self {
            store,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Acquire the registry lock and reload the persisted registry
    ///
    /// # Errors
    /// Returns `SyncError::StateCorrupt` if the store cannot be read or
    /// holds an invalid registry
    pub async fn lock(&self) -> Result<RegistryGuard<'_>, SyncError> {
        let mut state = self.state.lock().await;
        let registry = self.store.load().await.map_err(SyncError::StateCorrupt)?;
        if !state.loaded {
            info!(watches = registry.len(), "Loaded watch registry");
            state.loaded = true;
        }
        state.registry = registry;
        state.prune_finished();
        Ok(RegistryGuard {
            store: self.store.as_ref(),
            state,
        })
    }
}

impl RegistryGuard<'_> {
    /// Write the current registry to the store
    ///
    /// # Errors
    /// Returns `SyncError::Persistence` if the store rejects the write; the
    /// change is then not durable and is dropped on the next lock
    pub async fn persist(&self) -> Result<(), SyncError> {
        self.store
            .save(&self.state.registry)
            .await
            .map_err(SyncError::Persistence)?;
        debug!(watches = self.state.registry.len(), "Registry saved");
        Ok(())
    }
}

impl std::ops::Deref for RegistryGuard<'_> {
    type Target = RegistryState;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl std::ops::DerefMut for RegistryGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}
