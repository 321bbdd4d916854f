//! Weak-reference registry for post-stop leak checks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::manager::{Manager, ManagerPlugin};
use crate::memory::sample::request_compaction;
use crate::module::ModuleHandle;

static GLOBAL: OnceLock<LeakTracker> = OnceLock::new();

/// Process-global registry of weak module handles.
///
/// The manager owns modules; this tracker only observes. A handle that can
/// still be upgraded after the manager released it is a potential leak.
#[derive(Debug, Default)]
pub struct LeakTracker {
    tracked: Mutex<HashMap<String, Weak<ModuleHandle>>>,
}

impl LeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single process-wide instance.
    pub fn global() -> &'static LeakTracker {
        GLOBAL.get_or_init(LeakTracker::new)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Weak<ModuleHandle>>> {
        match self.tracked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Begin observing a module handle.
    pub fn track_module(&self, handle: &Arc<ModuleHandle>) {
        self.lock()
            .insert(handle.name().to_string(), Arc::downgrade(handle));
        log::debug!("leak tracker: observing module '{}'", handle.name());
    }

    /// Drop entries whose handles have been released, logging each one.
    fn prune(&self) {
        self.lock().retain(|name, weak| {
            let alive = weak.strong_count() > 0;
            if !alive {
                log::debug!("leak tracker: module '{}' was reclaimed", name);
            }
            alive
        });
    }

    /// Whether the named module's handle is still alive somewhere.
    pub fn is_module_in_memory(&self, name: &str) -> bool {
        self.prune();
        self.lock()
            .get(name)
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Names of all modules whose handles are currently alive.
    pub fn tracked_modules(&self) -> Vec<String> {
        self.prune();
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names still alive after a compaction-bracketed wait.
    ///
    /// Call after the manager has released its modules; survivors are
    /// potential leaks held by stray references.
    pub async fn check_for_leaks(&self, wait: Duration) -> Vec<String> {
        request_compaction();
        tokio::time::sleep(wait).await;
        request_compaction();
        let leaked = self.tracked_modules();
        if !leaked.is_empty() {
            log::warn!("leak tracker: {} module handle(s) still alive: {}", leaked.len(), leaked.join(", "));
        }
        leaked
    }
}

/// Manager plugin wiring every loaded module into the global tracker.
///
/// Expressed as an `after_module_load` hook rather than any interception of
/// module construction.
#[derive(Debug, Default)]
pub struct LeakTrackerPlugin;

#[async_trait]
impl ManagerPlugin for LeakTrackerPlugin {
    fn name(&self) -> &str {
        "leak-tracker"
    }

    async fn initialize(&self, _manager: &Manager) -> Result<()> {
        log::debug!("leak tracker plugin initialized");
        Ok(())
    }

    async fn after_module_load(&self, module: &Arc<ModuleHandle>) -> Result<()> {
        LeakTracker::global().track_module(module);
        Ok(())
    }
}
