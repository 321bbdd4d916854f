use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

/// Central error type for the kernel.
///
/// The variants mirror how failures propagate: registry and cycle errors are
/// fatal and returned to the caller, per-module lifecycle failures are caught
/// at the manager's phase loops and surfaced as events, and dependency or
/// plugin problems are downgraded to warnings at the call site.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A module configuration document could not be read or parsed.
    #[error("Configuration error for module '{module}': {message}")]
    Configuration { module: String, message: String },

    /// A module bundle could not be loaded from disk.
    #[error("Failed to load module from {path}: {message}")]
    Load { path: PathBuf, message: String },

    /// A second module attempted to register under an existing name.
    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    /// The requested module is not present in the registry.
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// The dependency graph contains a cycle; ordering cannot proceed.
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A module's `on_initialize`/`on_start`/`on_stop` hook failed.
    #[error("Module '{module}' failed during {operation}: {message}")]
    Lifecycle {
        module: String,
        operation: String,
        message: String,
    },

    /// A manager plugin hook failed. Hooks are advisory; this is logged, not propagated.
    #[error("Plugin '{plugin}' hook '{hook}' failed: {message}")]
    Plugin {
        plugin: String,
        hook: String,
        message: String,
    },

    /// A lifecycle pass was requested before the manager was initialized.
    #[error("Manager is not initialized: {0}")]
    NotInitialized(String),

    /// A lock guarding shared kernel state was poisoned by a panicking
    /// holder.
    #[error("Poisoned lock in {component}")]
    Poisoned { component: String },

    /// I/O failure with the operation and path that produced it.
    #[error("I/O error during '{operation}' at '{}': {source}", .path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Shorthand for Result with the kernel error type.
pub type Result<T> = StdResult<T, KernelError>;

impl KernelError {
    /// Attach operation and path context to an I/O error.
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        KernelError::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Poisoned-lock error naming the component whose lock was poisoned.
    pub fn poisoned(component: impl Into<String>) -> Self {
        KernelError::Poisoned {
            component: component.into(),
        }
    }
}

impl From<&str> for KernelError {
    fn from(msg: &str) -> Self {
        KernelError::Other(msg.to_string())
    }
}

impl From<String> for KernelError {
    fn from(msg: String) -> Self {
        KernelError::Other(msg)
    }
}
