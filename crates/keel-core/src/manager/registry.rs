use std::collections::HashMap;
use std::sync::Arc;

use crate::kernel::error::{KernelError, Result};
use crate::module::ModuleHandle;

/// Name-keyed store of module handles, exclusively owned by the manager.
///
/// Registration order is preserved because the event bus and status
/// snapshots walk modules in the order they arrived.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<ModuleHandle>>,
    order: Vec<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle. Duplicate names are refused.
    pub fn insert(&mut self, handle: Arc<ModuleHandle>) -> Result<()> {
        let name = handle.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(KernelError::DuplicateModule(name));
        }
        self.order.push(name.clone());
        self.modules.insert(name, handle);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModuleHandle>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Module names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Handles in registration order.
    pub fn handles(&self) -> Vec<Arc<ModuleHandle>> {
        self.order
            .iter()
            .filter_map(|name| self.modules.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
