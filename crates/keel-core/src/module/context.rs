use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::Value;

use crate::kernel::constants;
use crate::manager::ManagerInner;
use crate::module::Module;
use crate::update::compare_versions;

/// Per-module runtime companion handed to every lifecycle hook.
///
/// Carries the module's exports and permission map, plus a weak back
/// reference to the manager for peer queries. The manager exclusively owns
/// modules; if it has been torn down, every helper here degrades to a
/// warning and a benign default instead of failing.
pub struct ModuleContext {
    module: String,
    manager: RwLock<Weak<ManagerInner>>,
    exports: RwLock<HashMap<String, Value>>,
    permissions: RwLock<HashMap<String, HashSet<String>>>,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ModuleContext {
    pub(crate) fn new(module: String) -> Self {
        Self {
            module,
            manager: RwLock::new(Weak::new()),
            exports: RwLock::new(HashMap::new()),
            permissions: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the module this context belongs to.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// Install the manager back-reference. Called at registration.
    pub(crate) fn attach_manager(&self, manager: Weak<ManagerInner>) {
        *write_lock(&self.manager) = manager;
    }

    fn manager(&self) -> Option<std::sync::Arc<ManagerInner>> {
        let upgraded = read_lock(&self.manager).upgrade();
        if upgraded.is_none() {
            log::warn!(
                "module '{}' attempted a manager call but the manager is gone",
                self.module
            );
        }
        upgraded
    }

    // --- Exports ---

    /// Publish a value for peer modules to read.
    pub fn set_export(&self, key: impl Into<String>, value: Value) {
        write_lock(&self.exports).insert(key.into(), value);
    }

    /// Remove a published value.
    pub fn remove_export(&self, key: &str) -> Option<Value> {
        write_lock(&self.exports).remove(key)
    }

    /// Read one of this module's own exports.
    pub fn export(&self, key: &str) -> Option<Value> {
        read_lock(&self.exports).get(key).cloned()
    }

    /// Copy of the whole export map.
    pub fn exports(&self) -> HashMap<String, Value> {
        read_lock(&self.exports).clone()
    }

    // --- Peer access (delegated to the manager) ---

    /// Look up a peer module by name.
    pub async fn module_instance(&self, name: &str) -> Option<std::sync::Arc<dyn Module>> {
        let manager = self.manager()?;
        manager.module_handle(name).await.map(|handle| handle.instance())
    }

    /// Read a peer module's exports; with `key` set, a single entry, else
    /// the whole map as a JSON object.
    pub async fn exports_from(&self, name: &str, key: Option<&str>) -> Option<Value> {
        let manager = self.manager()?;
        let handle = manager.module_handle(name).await?;
        match key {
            Some(key) => handle.context().export(key),
            None => {
                let map = handle.context().exports();
                Some(Value::Object(map.into_iter().collect()))
            }
        }
    }

    /// Broadcast an event to every running peer. This module is the source
    /// and is skipped during delivery.
    pub async fn broadcast(&self, name: &str, payload: Value) {
        if let Some(manager) = self.manager() {
            manager
                .broadcast_event(name, payload, Some(self.module.clone()))
                .await;
        }
    }

    /// Whether a peer's API version satisfies `min_version`.
    pub async fn is_module_api_compatible(&self, name: &str, min_version: &str) -> bool {
        let Some(manager) = self.manager() else {
            return false;
        };
        match manager.module_handle(name).await {
            Some(handle) => {
                compare_versions(&handle.api_version(), min_version) != std::cmp::Ordering::Less
            }
            None => false,
        }
    }

    // --- Permissions ---

    /// Whether this module may perform `action` on `resource`.
    ///
    /// Local permission entries take precedence; without one the `auth`
    /// module is consulted if registered, and in the absence of any opinion
    /// the action is allowed.
    pub async fn check_permission(&self, action: &str, resource: &str) -> bool {
        if let Some(actions) = read_lock(&self.permissions).get(resource) {
            return actions.contains(action);
        }

        if let Some(manager) = self.manager() {
            if let Some(auth) = manager.module_handle(constants::AUTH_MODULE_NAME).await {
                if let Some(verdict) =
                    auth.instance().check_module_permission(&self.module, action, resource)
                {
                    return verdict;
                }
            }
        }

        true
    }

    /// Add `action` to the local permission set for `resource`.
    pub fn grant_permission(&self, resource: impl Into<String>, action: impl Into<String>) {
        write_lock(&self.permissions)
            .entry(resource.into())
            .or_default()
            .insert(action.into());
    }

    /// Remove `action` from the local permission set for `resource`.
    pub fn revoke_permission(&self, resource: &str, action: &str) {
        let mut permissions = write_lock(&self.permissions);
        if let Some(actions) = permissions.get_mut(resource) {
            actions.remove(action);
        }
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module", &self.module)
            .field("exports", &read_lock(&self.exports).len())
            .finish_non_exhaustive()
    }
}
