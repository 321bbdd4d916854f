use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::health::Operation;
use crate::kernel::error::Result;
use crate::manager::Manager;
use crate::module::ModuleHandle;

/// Cross-cutting hooks invoked by the manager at named lifecycle phases.
///
/// Every hook defaults to a no-op, so a plugin implements only the phases it
/// cares about. Hooks are advisory: a failing hook is logged and the phase
/// continues. Plugins are invoked in registration order and each hook is
/// awaited to completion before the manager proceeds.
#[async_trait]
pub trait ManagerPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called once when the plugin is registered.
    async fn initialize(&self, _manager: &Manager) -> Result<()> {
        Ok(())
    }

    async fn before_module_load(&self, _module_dir: &Path) -> Result<()> {
        Ok(())
    }

    async fn after_module_load(&self, _module: &Arc<ModuleHandle>) -> Result<()> {
        Ok(())
    }

    async fn before_module_initialize(&self, _module: &Arc<ModuleHandle>) -> Result<()> {
        Ok(())
    }

    async fn after_module_initialize(&self, _module: &Arc<ModuleHandle>) -> Result<()> {
        Ok(())
    }

    async fn before_module_start(&self, _module: &Arc<ModuleHandle>) -> Result<()> {
        Ok(())
    }

    async fn after_module_start(&self, _module: &Arc<ModuleHandle>) -> Result<()> {
        Ok(())
    }

    async fn before_module_stop(&self, _module: &Arc<ModuleHandle>) -> Result<()> {
        Ok(())
    }

    async fn after_module_stop(&self, _module: &Arc<ModuleHandle>) -> Result<()> {
        Ok(())
    }

    /// Called after a module lifecycle operation failed.
    async fn on_error(&self, _module: &str, _operation: Operation, _message: &str) -> Result<()> {
        Ok(())
    }
}
