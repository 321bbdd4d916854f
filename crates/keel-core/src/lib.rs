pub mod config;
pub mod event;
pub mod health;
pub mod kernel;
pub mod manager;
pub mod memory;
pub mod module;
pub mod update;

// Re-export the types hosts and modules touch most often.
pub use kernel::error::{KernelError, Result};
pub use kernel::settings::KernelSettings;
pub use manager::{Manager, ManagerOptions, ManagerPlugin, MetricsExporter};
pub use module::{BusEvent, Module, ModuleContext, ModuleHandle, ModuleMetadata, ModuleState};
